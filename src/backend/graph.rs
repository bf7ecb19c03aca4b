// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graph adapter: typed nodes plus an explicit edge table.
//!
//! Similarity is computed inside SQLite by a registered `cosine_similarity`
//! scalar function, so filtering, thresholding, ordering and limiting all
//! happen in one query. The threshold applies to the raw cosine; scores are
//! clamped to `[0, 1]` only when rows are read back. The embedding width is
//! recorded on the first embedded node and every query must match it.

use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use super::store::{
    blob_to_embedding, check_query_dimension, claim_dimension, clamp_score, cosine_similarity,
    embedding_to_blob, node_from_row, open_memory, open_store,
};
use super::{Backend, IndexStats, TaxonomyWriter};
use crate::errors::{EngineError, QueryContext, Result};
use crate::model::{
    Direction, Node, NodeType, RelatedGraph, Relation, SearchResult, TypeFilter,
};

const NAME: &str = "graph";

const SIMILARITY_SQL: &str = r#"
    SELECT uri, node_type, label, description, score FROM (
        SELECT uri, node_type, label, description,
               cosine_similarity(embedding, ?1) AS score
        FROM nodes
        WHERE embedding IS NOT NULL AND node_type IN (?2, ?3)
    )
    WHERE score >= ?4
    ORDER BY score DESC, label ASC
    LIMIT ?5
"#;

// ?3 selects edges leaving the root, ?4 edges arriving at it.
const NEIGHBOURS_SQL: &str = r#"
    SELECT n.uri, n.node_type, n.label, n.description
    FROM relations r
    JOIN nodes n
      ON n.uri = CASE WHEN r.source_uri = ?1 THEN r.target_uri ELSE r.source_uri END
    WHERE r.relation = ?2
      AND ((?3 AND r.source_uri = ?1) OR (?4 AND r.target_uri = ?1))
    ORDER BY r.id
"#;

/// Store holding nodes and typed, directed relations.
pub struct GraphBackend {
    conn: Option<Connection>,
}

impl GraphBackend {
    /// Opens an existing graph database.
    pub fn open(path: &Path) -> Result<Self> {
        Self::with_connection(open_store(path, NAME, false)?)
    }

    /// Opens or creates a graph database for ingestion.
    pub fn create(path: &Path) -> Result<Self> {
        Self::with_connection(open_store(path, NAME, true)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(open_memory(NAME)?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS nodes (
                uri TEXT PRIMARY KEY,
                node_type TEXT NOT NULL,
                label TEXT NOT NULL,
                description TEXT,
                embedding BLOB
            );

            CREATE INDEX IF NOT EXISTS idx_nodes_type ON nodes(node_type);

            CREATE TABLE IF NOT EXISTS relations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_uri TEXT NOT NULL,
                relation TEXT NOT NULL,
                target_uri TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_relations_source ON relations(source_uri, relation);
            CREATE INDEX IF NOT EXISTS idx_relations_target ON relations(target_uri, relation);
            "#,
        )
        .during(NAME, "open")?;
        register_cosine(&conn).during(NAME, "open")?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| EngineError::connection(NAME, "session is closed"))
    }

    fn exists(&self, uri: &str) -> Result<bool> {
        let found = self
            .conn()?
            .query_row("SELECT 1 FROM nodes WHERE uri = ?1", params![uri], |_| Ok(()))
            .optional()
            .during(NAME, "put_relation")?;
        Ok(found.is_some())
    }
}

fn register_cosine(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "cosine_similarity",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let stored = ctx
                .get_raw(0)
                .as_blob()
                .map_err(|err| rusqlite::Error::UserFunctionError(Box::new(err)))?;
            let query = ctx
                .get_raw(1)
                .as_blob()
                .map_err(|err| rusqlite::Error::UserFunctionError(Box::new(err)))?;
            let (stored, query) = (blob_to_embedding(stored), blob_to_embedding(query));
            let cosine = cosine_similarity(&stored, &query).ok_or_else(|| {
                rusqlite::Error::UserFunctionError(
                    format!(
                        "stored embedding has {} dimensions, query has {}",
                        stored.len(),
                        query.len()
                    )
                    .into(),
                )
            })?;
            Ok(f64::from(cosine))
        },
    )
}

impl Backend for GraphBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn similarity_search(
        &self,
        vector: &[f32],
        filter: TypeFilter,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchResult>> {
        let conn = self.conn()?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        check_query_dimension(conn, NAME, vector)?;

        let types = filter.node_types();
        let first = types[0].as_str();
        let last = types[types.len() - 1].as_str();

        let mut stmt = conn
            .prepare_cached(SIMILARITY_SQL)
            .during(NAME, "similarity_search")?;
        let rows = stmt
            .query_map(
                params![
                    embedding_to_blob(vector),
                    first,
                    last,
                    f64::from(threshold),
                    limit as i64
                ],
                |row| {
                    let node = node_from_row(row)?;
                    let cosine: f64 = row.get(4)?;
                    Ok(SearchResult::new(node, clamp_score(cosine as f32)))
                },
            )
            .during(NAME, "similarity_search")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .during(NAME, "similarity_search")
    }

    fn fetch_related(&self, uri: &str, node_type: NodeType) -> Result<RelatedGraph> {
        let root = self.fetch_node(uri)?;
        if root.node_type != node_type {
            return Err(EngineError::invalid_argument(
                "type",
                format!("{} is a {}, not a {}", uri, root.node_type, node_type),
            ));
        }

        let conn = self.conn()?;
        let mut stmt = conn
            .prepare_cached(NEIGHBOURS_SQL)
            .during(NAME, "fetch_related")?;
        let mut graph = RelatedGraph::empty(root);

        for group in node_type.relation_groups() {
            let (relation, direction) = group.edge();
            let (outgoing, incoming) = match direction {
                Direction::Outgoing => (true, false),
                Direction::Incoming => (false, true),
                Direction::Any => (true, true),
            };
            let nodes = stmt
                .query_map(
                    params![uri, relation.as_str(), outgoing, incoming],
                    node_from_row,
                )
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .during(NAME, "fetch_related")?;
            graph.related.insert(*group, nodes);
        }

        Ok(graph)
    }

    fn fetch_node(&self, uri: &str) -> Result<Node> {
        self.conn()?
            .query_row(
                "SELECT uri, node_type, label, description FROM nodes WHERE uri = ?1",
                params![uri],
                node_from_row,
            )
            .optional()
            .during(NAME, "fetch_node")?
            .ok_or_else(|| EngineError::node_not_found(uri))
    }

    fn index_stats(&self) -> Result<IndexStats> {
        let conn = self.conn()?;
        let mut stats = IndexStats::new(NAME);

        let mut stmt = conn
            .prepare("SELECT node_type, COUNT(*), COUNT(embedding) FROM nodes GROUP BY node_type")
            .during(NAME, "index_stats")?;
        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
            })
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .during(NAME, "index_stats")?;

        for (raw_type, total, embedded) in counts {
            match raw_type.parse::<NodeType>() {
                Ok(node_type) => {
                    stats.nodes.insert(node_type, total as usize);
                    stats.embedded.insert(node_type, embedded as usize);
                }
                Err(_) => tracing::warn!(node_type = %raw_type, "ignoring unknown node type"),
            }
        }

        let relations: i64 = conn
            .query_row("SELECT COUNT(*) FROM relations", [], |row| row.get(0))
            .during(NAME, "index_stats")?;
        stats.relations = relations as usize;

        Ok(stats)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, err)| err).during(NAME, "close")?;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.conn.is_none()
    }
}

impl TaxonomyWriter for GraphBackend {
    fn put_node(&mut self, node: &Node) -> Result<()> {
        if node.uri.trim().is_empty() {
            return Err(EngineError::invalid_argument("uri", "must not be empty"));
        }
        if node.label.trim().is_empty() {
            return Err(EngineError::invalid_argument("label", "must not be empty"));
        }
        let conn = self.conn()?;
        if let Some(embedding) = &node.embedding {
            claim_dimension(conn, NAME, embedding)?;
        }

        conn.execute(
            r#"
            INSERT INTO nodes (uri, node_type, label, description, embedding)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(uri) DO UPDATE SET
                node_type = excluded.node_type,
                label = excluded.label,
                description = excluded.description,
                embedding = excluded.embedding
            "#,
            params![
                node.uri,
                node.node_type.as_str(),
                node.label,
                node.description,
                node.embedding.as_deref().map(embedding_to_blob),
            ],
        )
        .during(NAME, "put_node")?;
        Ok(())
    }

    fn put_relation(&mut self, relation: &Relation) -> Result<()> {
        for uri in [&relation.source_uri, &relation.target_uri] {
            if !self.exists(uri)? {
                return Err(EngineError::node_not_found(uri.as_str()));
            }
        }

        self.conn()?
            .execute(
                "INSERT INTO relations (source_uri, relation, target_uri) VALUES (?1, ?2, ?3)",
                params![
                    relation.source_uri,
                    relation.relation.as_str(),
                    relation.target_uri
                ],
            )
            .during(NAME, "put_relation")?;
        Ok(())
    }
}
