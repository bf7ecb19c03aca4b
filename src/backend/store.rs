// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite plumbing shared by both adapters.

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use crate::errors::{EngineError, QueryContext, Result};
use crate::model::{Node, NodeType};

const SCHEMA_VERSION: &str = "1";
const DIMENSION_KEY: &str = "embedding_dimension";

/// Opens the database file and claims it for `backend`.
///
/// Without `create` the file must already exist. A file written by the
/// other adapter is refused.
pub(crate) fn open_store(path: &Path, backend: &'static str, create: bool) -> Result<Connection> {
    if create {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| {
                EngineError::connection(
                    backend,
                    format!("cannot create directory {}: {}", parent.display(), err),
                )
            })?;
        }
    } else if !path.exists() {
        return Err(EngineError::connection(
            backend,
            format!("no database at {}", path.display()),
        ));
    }

    let conn = Connection::open(path).map_err(|err| {
        EngineError::connection(backend, format!("cannot open {}: {}", path.display(), err))
    })?;
    claim(&conn, backend)?;
    Ok(conn)
}

/// In-memory database, used by tests and throwaway indexes.
pub(crate) fn open_memory(backend: &'static str) -> Result<Connection> {
    let conn = Connection::open_in_memory()
        .map_err(|err| EngineError::connection(backend, err.to_string()))?;
    claim(&conn, backend)?;
    Ok(conn)
}

fn claim(conn: &Connection, backend: &'static str) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
    )
    .during(backend, "open")?;

    match get_meta(conn, "backend").during(backend, "open")? {
        Some(owner) if owner != backend => Err(EngineError::connection(
            backend,
            format!("database was written by the {} backend", owner),
        )),
        Some(_) => Ok(()),
        None => {
            set_meta(conn, "backend", backend).during(backend, "open")?;
            set_meta(conn, "schema_version", SCHEMA_VERSION).during(backend, "open")?;
            Ok(())
        }
    }
}

pub(crate) fn get_meta(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM meta WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub(crate) fn set_meta(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        INSERT INTO meta (key, value)
        VALUES (?1, ?2)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
        params![key, value],
    )?;
    Ok(())
}

/// Reads `(uri, type, label, description)` from the first four columns.
pub(crate) fn node_from_row(row: &Row<'_>) -> rusqlite::Result<Node> {
    let raw_type: String = row.get(1)?;
    let node_type = raw_type
        .parse::<NodeType>()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(err)))?;
    Ok(Node {
        uri: row.get(0)?,
        node_type,
        label: row.get(2)?,
        description: row.get(3)?,
        embedding: None,
    })
}

pub(crate) fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub(crate) fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Width of the stored embeddings, once any node carries one.
pub(crate) fn stored_dimension(conn: &Connection, backend: &'static str) -> Result<Option<usize>> {
    match get_meta(conn, DIMENSION_KEY).during(backend, "dimension")? {
        Some(raw) => raw.parse::<usize>().map(Some).during(backend, "dimension"),
        None => Ok(None),
    }
}

/// Records the embedding width on first use and rejects any other width.
pub(crate) fn claim_dimension(
    conn: &Connection,
    backend: &'static str,
    embedding: &[f32],
) -> Result<()> {
    if embedding.is_empty() {
        return Err(EngineError::invalid_argument("embedding", "must not be empty"));
    }
    match stored_dimension(conn, backend)? {
        Some(stored) if stored != embedding.len() => Err(EngineError::invalid_argument(
            "embedding",
            format!(
                "has {} dimensions but the store holds {}-dimensional embeddings",
                embedding.len(),
                stored
            ),
        )),
        Some(_) => Ok(()),
        None => set_meta(conn, DIMENSION_KEY, &embedding.len().to_string())
            .during(backend, "put_node"),
    }
}

/// Rejects a query vector whose width differs from the stored embeddings.
pub(crate) fn check_query_dimension(
    conn: &Connection,
    backend: &'static str,
    vector: &[f32],
) -> Result<()> {
    match stored_dimension(conn, backend)? {
        Some(stored) if stored != vector.len() => Err(dimension_mismatch(vector.len(), stored)),
        _ => Ok(()),
    }
}

pub(crate) fn dimension_mismatch(query: usize, stored: usize) -> EngineError {
    EngineError::invalid_argument(
        "vector",
        format!(
            "query has {} dimensions but the store holds {}-dimensional embeddings; \
             was it indexed with another model?",
            query, stored
        ),
    )
}

/// Cosine similarity, `None` when the lengths differ. Zero vectors score 0.0.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(0.0);
    }

    Some(dot / (norm_a * norm_b))
}

/// Maps a raw cosine into the reported `[0, 1]` score range.
pub(crate) fn clamp_score(cosine: f32) -> f32 {
    if cosine.is_nan() {
        0.0
    } else {
        cosine.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_roundtrip_preserves_values() {
        let v = vec![0.5f32, -1.25, 3.0];
        assert_eq!(blob_to_embedding(&embedding_to_blob(&v)), v);
    }

    #[test]
    fn test_cosine_edge_cases() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), None);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), Some(0.0));
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]).unwrap() - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]).unwrap() < 0.0);
    }

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(-0.4), 0.0);
        assert_eq!(clamp_score(1.0000001), 1.0);
        assert_eq!(clamp_score(f32::NAN), 0.0);
        assert_eq!(clamp_score(0.42), 0.42);
    }

    #[test]
    fn test_dimension_is_claimed_once() {
        let conn = open_memory("graph").unwrap();
        assert_eq!(stored_dimension(&conn, "graph").unwrap(), None);
        assert!(check_query_dimension(&conn, "graph", &[1.0]).is_ok());

        claim_dimension(&conn, "graph", &[1.0, 0.0, 0.0]).unwrap();
        claim_dimension(&conn, "graph", &[0.0, 1.0, 0.0]).unwrap();
        assert_eq!(stored_dimension(&conn, "graph").unwrap(), Some(3));
        assert!(matches!(
            claim_dimension(&conn, "graph", &[1.0, 0.0]),
            Err(EngineError::InvalidArgument { name: "embedding", .. })
        ));
        assert!(matches!(
            claim_dimension(&conn, "graph", &[]),
            Err(EngineError::InvalidArgument { name: "embedding", .. })
        ));
        assert!(matches!(
            check_query_dimension(&conn, "graph", &[1.0, 0.0]),
            Err(EngineError::InvalidArgument { name: "vector", .. })
        ));
    }

    #[test]
    fn test_store_refuses_other_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.sqlite");
        drop(open_store(&path, "graph", true).unwrap());
        let err = open_store(&path, "vector", false).unwrap_err();
        assert!(err.to_string().contains("written by the graph backend"));
        assert!(open_store(&path, "graph", false).is_ok());
    }

    #[test]
    fn test_store_requires_file_unless_creating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("db.sqlite");
        assert!(matches!(
            open_store(&path, "graph", false),
            Err(EngineError::Connection { .. })
        ));
        assert!(open_store(&path, "graph", true).is_ok());
        assert!(path.exists());
    }
}
