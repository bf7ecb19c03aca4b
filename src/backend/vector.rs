// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector adapter: per-class objects with reference properties.
//!
//! Objects live in SQLite with their references stored as JSON lists of URIs.
//! Nearest-neighbour queries run against a flat in-memory index loaded at open
//! time. The index measures similarity as certainty, `(1 + cos) / 2`; results
//! are reported back on the cosine scale so both adapters agree on scores.
//! Queries must match the embedding width recorded at ingestion.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::store::{
    blob_to_embedding, check_query_dimension, claim_dimension, clamp_score, cosine_similarity,
    dimension_mismatch, embedding_to_blob, node_from_row, open_memory, open_store,
};
use super::{Backend, IndexStats, TaxonomyWriter};
use crate::errors::{EngineError, QueryContext, Result};
use crate::model::{
    Direction, Node, NodeType, RelatedGraph, Relation, RelationType, SearchResult, TypeFilter,
};

const NAME: &str = "vector";

/// Reference lists keyed by property name.
type Properties = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Source,
    Target,
}

/// Property holding an edge type and which endpoint stores it.
fn property(relation: RelationType) -> (&'static str, Owner) {
    match relation {
        RelationType::EssentialFor => ("hasEssentialSkill", Owner::Target),
        RelationType::OptionalFor => ("hasOptionalSkill", Owner::Target),
        RelationType::RelatedSkill => ("relatedSkill", Owner::Source),
        RelationType::BroaderThan => ("broader", Owner::Target),
        RelationType::PartOfIscoGroup => ("partOfIscoGroup", Owner::Source),
    }
}

fn certainty(cosine: f32) -> f32 {
    (1.0 + cosine) / 2.0
}

struct IndexEntry {
    uri: String,
    label: String,
    vector: Vec<f32>,
}

struct Hit<'a> {
    entry: &'a IndexEntry,
    cosine: f32,
}

/// Brute-force nearest-neighbour index, one list per class.
#[derive(Default)]
struct FlatIndex {
    classes: HashMap<NodeType, Vec<IndexEntry>>,
}

impl FlatIndex {
    fn upsert(&mut self, class: NodeType, uri: &str, label: &str, vector: Option<&[f32]>) {
        for entries in self.classes.values_mut() {
            entries.retain(|entry| entry.uri != uri);
        }
        if let Some(vector) = vector {
            self.classes.entry(class).or_default().push(IndexEntry {
                uri: uri.to_string(),
                label: label.to_string(),
                vector: vector.to_vec(),
            });
        }
    }

    /// Entries of `class` with certainty at least `min_certainty`, best first.
    fn near_vector(
        &self,
        class: NodeType,
        query: &[f32],
        min_certainty: f32,
        limit: usize,
    ) -> Result<Vec<Hit<'_>>> {
        let Some(entries) = self.classes.get(&class) else {
            return Ok(Vec::new());
        };

        let mut hits = Vec::new();
        for entry in entries {
            let cosine = cosine_similarity(&entry.vector, query)
                .ok_or_else(|| dimension_mismatch(query.len(), entry.vector.len()))?;
            if !cosine.is_nan() && certainty(cosine) >= min_certainty {
                hits.push(Hit { entry, cosine });
            }
        }
        sort_hits(&mut hits);
        hits.truncate(limit);
        Ok(hits)
    }

    fn clear(&mut self) {
        self.classes.clear();
    }
}

fn sort_hits(hits: &mut [Hit<'_>]) {
    hits.sort_by(|a, b| {
        b.cosine
            .partial_cmp(&a.cosine)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.entry.label.cmp(&b.entry.label))
    });
}

/// Store holding per-class objects and a nearest-neighbour index over them.
pub struct VectorBackend {
    conn: Option<Connection>,
    index: FlatIndex,
}

impl VectorBackend {
    /// Opens an existing vector database and loads its index.
    pub fn open(path: &Path) -> Result<Self> {
        Self::with_connection(open_store(path, NAME, false)?)
    }

    /// Opens or creates a vector database for ingestion.
    pub fn create(path: &Path) -> Result<Self> {
        Self::with_connection(open_store(path, NAME, true)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(open_memory(NAME)?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS objects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                class TEXT NOT NULL,
                uri TEXT NOT NULL UNIQUE,
                label TEXT NOT NULL,
                description TEXT,
                properties TEXT NOT NULL DEFAULT '{}',
                vector BLOB
            );

            CREATE INDEX IF NOT EXISTS idx_objects_class ON objects(class);
            "#,
        )
        .during(NAME, "open")?;

        let mut backend = Self {
            conn: Some(conn),
            index: FlatIndex::default(),
        };
        backend.load_index()?;
        Ok(backend)
    }

    fn load_index(&mut self) -> Result<()> {
        let conn = self
            .conn
            .as_ref()
            .ok_or_else(|| EngineError::connection(NAME, "session is closed"))?;
        let mut stmt = conn
            .prepare(
                "SELECT class, uri, label, vector FROM objects WHERE vector IS NOT NULL ORDER BY id",
            )
            .during(NAME, "load_index")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                ))
            })
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .during(NAME, "load_index")?;

        for (class, uri, label, blob) in rows {
            match class.parse::<NodeType>() {
                Ok(class) => {
                    let vector = blob_to_embedding(&blob);
                    self.index.upsert(class, &uri, &label, Some(&vector));
                }
                Err(_) => tracing::warn!(%class, %uri, "skipping object of unknown class"),
            }
        }
        tracing::debug!(
            objects = self.index.classes.values().map(Vec::len).sum::<usize>(),
            "vector index loaded"
        );
        Ok(())
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| EngineError::connection(NAME, "session is closed"))
    }

    fn object(&self, uri: &str, operation: &'static str) -> Result<Option<Node>> {
        self.conn()?
            .prepare_cached("SELECT uri, class, label, description FROM objects WHERE uri = ?1")
            .and_then(|mut stmt| stmt.query_row(params![uri], node_from_row).optional())
            .during(NAME, operation)
    }

    fn properties(&self, uri: &str, operation: &'static str) -> Result<Properties> {
        let raw: Option<String> = self
            .conn()?
            .query_row(
                "SELECT properties FROM objects WHERE uri = ?1",
                params![uri],
                |row| row.get(0),
            )
            .optional()
            .during(NAME, operation)?;
        let raw = raw.ok_or_else(|| EngineError::node_not_found(uri))?;
        serde_json::from_str(&raw).during(NAME, operation)
    }

    /// Nodes across one edge type, seen from `uri` as source or target.
    fn neighbours(
        &self,
        uri: &str,
        properties: &Properties,
        relation: RelationType,
        root_is_source: bool,
    ) -> Result<Vec<Node>> {
        let (key, owner) = property(relation);
        let root_owns = (owner == Owner::Source) == root_is_source;

        if root_owns {
            let mut nodes = Vec::new();
            for target in properties.get(key).map(Vec::as_slice).unwrap_or(&[]) {
                match self.object(target, "fetch_related")? {
                    Some(node) => nodes.push(node),
                    None => tracing::debug!(%uri, reference = %target, "dangling reference"),
                }
            }
            return Ok(nodes);
        }

        let mut stmt = self
            .conn()?
            .prepare_cached(
                r#"
                SELECT o.uri, o.class, o.label, o.description
                FROM objects o, json_each(o.properties, ?2) j
                WHERE j.value = ?1
                ORDER BY o.id, j.key
                "#,
            )
            .during(NAME, "fetch_related")?;
        let path = format!("$.{}", key);
        let nodes = stmt
            .query_map(params![uri, path], node_from_row)
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .during(NAME, "fetch_related")?;
        Ok(nodes)
    }
}

impl Backend for VectorBackend {
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

        let min_certainty = certainty(threshold);
        let mut hits: Vec<Hit<'_>> = Vec::new();
        for class in filter.node_types() {
            hits.extend(self.index.near_vector(*class, vector, min_certainty, limit)?);
        }
        sort_hits(&mut hits);
        hits.truncate(limit);

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            match self.object(&hit.entry.uri, "similarity_search")? {
                Some(node) => results.push(SearchResult::new(node, clamp_score(hit.cosine))),
                None => tracing::debug!(uri = %hit.entry.uri, "indexed object vanished"),
            }
        }
        Ok(results)
    }

    fn fetch_related(&self, uri: &str, node_type: NodeType) -> Result<RelatedGraph> {
        let root = self.fetch_node(uri)?;
        if root.node_type != node_type {
            return Err(EngineError::invalid_argument(
                "type",
                format!("{} is a {}, not a {}", uri, root.node_type, node_type),
            ));
        }

        let properties = self.properties(uri, "fetch_related")?;
        let mut graph = RelatedGraph::empty(root);

        for group in node_type.relation_groups() {
            let (relation, direction) = group.edge();
            let nodes = match direction {
                Direction::Outgoing => self.neighbours(uri, &properties, relation, true)?,
                Direction::Incoming => self.neighbours(uri, &properties, relation, false)?,
                Direction::Any => {
                    let mut nodes = self.neighbours(uri, &properties, relation, true)?;
                    nodes.extend(self.neighbours(uri, &properties, relation, false)?);
                    nodes
                }
            };
            graph.related.insert(*group, nodes);
        }

        Ok(graph)
    }

    fn fetch_node(&self, uri: &str) -> Result<Node> {
        self.object(uri, "fetch_node")?
            .ok_or_else(|| EngineError::node_not_found(uri))
    }

    fn index_stats(&self) -> Result<IndexStats> {
        let conn = self.conn()?;
        let mut stats = IndexStats::new(NAME);

        let mut stmt = conn
            .prepare("SELECT class, COUNT(*), COUNT(vector) FROM objects GROUP BY class")
            .during(NAME, "index_stats")?;
        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
            })
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .during(NAME, "index_stats")?;
        for (class, total, embedded) in counts {
            if let Ok(node_type) = class.parse::<NodeType>() {
                stats.nodes.insert(node_type, total as usize);
                stats.embedded.insert(node_type, embedded as usize);
            }
        }

        let mut stmt = conn
            .prepare("SELECT properties FROM objects")
            .during(NAME, "index_stats")?;
        let all = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .during(NAME, "index_stats")?;
        for raw in all {
            let properties: Properties = serde_json::from_str(&raw).during(NAME, "index_stats")?;
            stats.relations += properties.values().map(Vec::len).sum::<usize>();
        }

        Ok(stats)
    }

    fn close(&mut self) -> Result<()> {
        self.index.clear();
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, err)| err).during(NAME, "close")?;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.conn.is_none()
    }
}

impl TaxonomyWriter for VectorBackend {
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
            INSERT INTO objects (class, uri, label, description, vector)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(uri) DO UPDATE SET
                class = excluded.class,
                label = excluded.label,
                description = excluded.description,
                vector = excluded.vector
            "#,
            params![
                node.node_type.as_str(),
                node.uri,
                node.label,
                node.description,
                node.embedding.as_deref().map(embedding_to_blob),
            ],
        )
        .during(NAME, "put_node")?;

        self.index.upsert(
            node.node_type,
            &node.uri,
            &node.label,
            node.embedding.as_deref(),
        );
        Ok(())
    }

    fn put_relation(&mut self, relation: &Relation) -> Result<()> {
        for uri in [&relation.source_uri, &relation.target_uri] {
            if self.object(uri, "put_relation")?.is_none() {
                return Err(EngineError::node_not_found(uri.as_str()));
            }
        }

        let (key, owner) = property(relation.relation);
        let (holder, member) = match owner {
            Owner::Source => (&relation.source_uri, &relation.target_uri),
            Owner::Target => (&relation.target_uri, &relation.source_uri),
        };

        let mut properties = self.properties(holder, "put_relation")?;
        properties
            .entry(key.to_string())
            .or_default()
            .push(member.clone());
        let raw = serde_json::to_string(&properties).during(NAME, "put_relation")?;

        self.conn()?
            .execute(
                "UPDATE objects SET properties = ?2 WHERE uri = ?1",
                params![holder, raw],
            )
            .during(NAME, "put_relation")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RelationGroup;

    fn fixture() -> VectorBackend {
        let mut backend = VectorBackend::in_memory().unwrap();
        let nodes = [
            Node::new("s:python", NodeType::Skill, "Python").with_embedding(vec![1.0, 0.0]),
            Node::new("s:java", NodeType::Skill, "Java").with_embedding(vec![0.6, 0.8]),
            Node::new("s:knit", NodeType::Skill, "knitting").with_embedding(vec![0.0, 1.0]),
            Node::new("o:dev", NodeType::Occupation, "developer")
                .with_description("writes software")
                .with_embedding(vec![0.8, 0.6]),
            Node::new("g:prog", NodeType::SkillGroup, "programming"),
            Node::new("i:25", NodeType::IscoGroup, "ICT professionals"),
        ];
        for node in &nodes {
            backend.put_node(node).unwrap();
        }
        let relations = [
            ("s:python", RelationType::EssentialFor, "o:dev"),
            ("s:java", RelationType::EssentialFor, "o:dev"),
            ("s:java", RelationType::RelatedSkill, "s:python"),
            ("g:prog", RelationType::BroaderThan, "s:python"),
            ("o:dev", RelationType::PartOfIscoGroup, "i:25"),
        ];
        for (source, relation, target) in relations {
            backend
                .put_relation(&Relation::new(source, relation, target))
                .unwrap();
        }
        backend
    }

    #[test]
    fn test_threshold_maps_onto_certainty() {
        let backend = fixture();
        // knitting is orthogonal: cosine 0, certainty 0.5
        let at_half = backend
            .similarity_search(&[1.0, 0.0], TypeFilter::Skill, 10, 0.5)
            .unwrap();
        assert!(at_half.iter().all(|r| r.uri() != "s:knit"));

        let at_zero = backend
            .similarity_search(&[1.0, 0.0], TypeFilter::Skill, 10, 0.0)
            .unwrap();
        let labels: Vec<&str> = at_zero.iter().map(|r| r.label()).collect();
        assert_eq!(labels, vec!["Python", "Java", "knitting"]);
        assert!((at_zero[1].score - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_query_of_another_width_is_an_error() {
        let backend = fixture();
        assert!(matches!(
            backend.similarity_search(&[1.0, 0.0, 0.0], TypeFilter::Skill, 5, 0.0),
            Err(EngineError::InvalidArgument { name: "vector", .. })
        ));
    }

    #[test]
    fn test_embeddings_of_another_width_are_refused() {
        let mut backend = fixture();
        let err = backend
            .put_node(
                &Node::new("s:rust", NodeType::Skill, "Rust").with_embedding(vec![1.0, 0.0, 0.0]),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument { name: "embedding", .. }));
        let results = backend
            .similarity_search(&[1.0, 0.0], TypeFilter::Skill, 10, 0.0)
            .unwrap();
        assert!(results.iter().all(|r| r.uri() != "s:rust"));
    }

    #[test]
    fn test_unrecorded_width_fails_per_entry() {
        let backend = fixture();
        backend
            .conn()
            .unwrap()
            .execute("DELETE FROM meta WHERE key = 'embedding_dimension'", [])
            .unwrap();
        assert!(matches!(
            backend.similarity_search(&[1.0, 0.0, 0.0], TypeFilter::Skill, 5, 0.0),
            Err(EngineError::InvalidArgument { name: "vector", .. })
        ));
    }

    #[test]
    fn test_search_merges_classes_and_hydrates() {
        let backend = fixture();
        let results = backend
            .similarity_search(&[1.0, 0.0], TypeFilter::Both, 2, 0.5)
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].uri(), "s:python");
        assert_eq!(results[1].uri(), "o:dev");
        assert_eq!(results[1].node.description.as_deref(), Some("writes software"));
    }

    #[test]
    fn test_fetch_related_follows_and_reverses_references() {
        let backend = fixture();

        let dev = backend.fetch_related("o:dev", NodeType::Occupation).unwrap();
        let essential: Vec<&str> = dev
            .group(RelationGroup::EssentialSkills)
            .iter()
            .map(|n| n.uri.as_str())
            .collect();
        assert_eq!(essential, vec!["s:python", "s:java"]);
        assert_eq!(dev.group(RelationGroup::IscoGroups)[0].uri, "i:25");
        assert!(dev.group(RelationGroup::OptionalSkills).is_empty());

        let python = backend.fetch_related("s:python", NodeType::Skill).unwrap();
        assert_eq!(python.group(RelationGroup::EssentialOccupations)[0].uri, "o:dev");
        assert_eq!(python.group(RelationGroup::RelatedSkills)[0].uri, "s:java");
        assert_eq!(python.group(RelationGroup::BroaderSkills)[0].uri, "g:prog");

        let java = backend.fetch_related("s:java", NodeType::Skill).unwrap();
        assert_eq!(java.group(RelationGroup::RelatedSkills)[0].uri, "s:python");

        let isco = backend.fetch_related("i:25", NodeType::IscoGroup).unwrap();
        assert_eq!(isco.group(RelationGroup::MemberOccupations)[0].uri, "o:dev");
    }

    #[test]
    fn test_reindexing_replaces_vector() {
        let mut backend = fixture();
        backend
            .put_node(&Node::new("s:knit", NodeType::Skill, "knitting").with_embedding(vec![1.0, 0.0]))
            .unwrap();
        let results = backend
            .similarity_search(&[1.0, 0.0], TypeFilter::Skill, 10, 0.99)
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].label(), "Python");
        assert_eq!(results[1].label(), "knitting");
    }

    #[test]
    fn test_index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vector.sqlite");
        {
            let mut backend = VectorBackend::create(&path).unwrap();
            backend
                .put_node(&Node::new("s:a", NodeType::Skill, "a").with_embedding(vec![1.0, 0.0]))
                .unwrap();
            backend.close().unwrap();
        }
        let backend = VectorBackend::open(&path).unwrap();
        let results = backend
            .similarity_search(&[1.0, 0.0], TypeFilter::Skill, 5, 0.5)
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_index_stats_counts_references() {
        let backend = fixture();
        let stats = backend.index_stats().unwrap();
        assert_eq!(stats.relations, 5);
        assert_eq!(stats.node_count(NodeType::Skill), 3);
        assert_eq!(stats.embedded_count(NodeType::SkillGroup), 0);
    }

    #[test]
    fn test_put_relation_requires_endpoints() {
        let mut backend = fixture();
        let err = backend
            .put_relation(&Relation::new("s:ghost", RelationType::EssentialFor, "o:dev"))
            .unwrap_err();
        assert!(matches!(err, EngineError::NodeNotFound { .. }));
    }

    #[test]
    fn test_closed_backend_rejects_queries() {
        let mut backend = fixture();
        backend.close().unwrap();
        assert!(matches!(
            backend.similarity_search(&[1.0, 0.0], TypeFilter::Both, 1, 0.0),
            Err(EngineError::Connection { .. })
        ));
        backend.close().unwrap();
    }
}
