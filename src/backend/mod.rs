// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage backends behind one capability interface.
//!
//! Two adapters exist: [`GraphBackend`] keeps an explicit edge table and
//! computes cosine similarity inside the store, [`VectorBackend`] keeps
//! per-class objects with reference properties and answers nearest-neighbour
//! queries from an in-memory vector index. The adapter is picked once per run
//! by [`open_backend`].

pub mod graph;
pub mod session;
mod store;
pub mod vector;

use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::{BackendConfig, BackendKind};
use crate::errors::Result;
use crate::model::{Node, NodeType, RelatedGraph, Relation, SearchResult, TypeFilter};

pub use graph::GraphBackend;
pub use session::{ConnectionState, Session};
pub use vector::VectorBackend;

/// Read interface every store adapter provides.
///
/// Scores returned by `similarity_search` are cosine similarities clamped to
/// `[0, 1]`, ordered by score descending then label ascending.
pub trait Backend: Send {
    /// Short adapter name used in error context.
    fn name(&self) -> &'static str;

    /// Candidates of the filtered types scoring at least `threshold`, at most `limit`.
    fn similarity_search(
        &self,
        vector: &[f32],
        filter: TypeFilter,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchResult>>;

    /// The node with every adjacent node grouped by relation, in store order.
    fn fetch_related(&self, uri: &str, node_type: NodeType) -> Result<RelatedGraph>;

    /// Fails with `NodeNotFound` if `uri` is absent.
    fn fetch_node(&self, uri: &str) -> Result<Node>;

    fn index_stats(&self) -> Result<IndexStats>;

    /// Releases the underlying handle. Safe to call more than once.
    fn close(&mut self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

/// Write interface used by ingestion to populate a store.
pub trait TaxonomyWriter {
    /// Inserts or replaces a node by URI.
    fn put_node(&mut self, node: &Node) -> Result<()>;

    /// Appends an edge; both endpoints must already exist.
    fn put_relation(&mut self, relation: &Relation) -> Result<()>;
}

/// Counts describing what a store holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub backend: &'static str,
    pub nodes: BTreeMap<NodeType, usize>,
    pub embedded: BTreeMap<NodeType, usize>,
    pub relations: usize,
}

impl IndexStats {
    pub fn new(backend: &'static str) -> Self {
        Self {
            backend,
            nodes: BTreeMap::new(),
            embedded: BTreeMap::new(),
            relations: 0,
        }
    }

    pub fn node_count(&self, node_type: NodeType) -> usize {
        self.nodes.get(&node_type).copied().unwrap_or(0)
    }

    pub fn embedded_count(&self, node_type: NodeType) -> usize {
        self.embedded.get(&node_type).copied().unwrap_or(0)
    }

    /// At least one node admitted by `filter` carries an embedding.
    pub fn is_indexed(&self, filter: TypeFilter) -> bool {
        filter
            .node_types()
            .iter()
            .any(|node_type| self.embedded_count(*node_type) > 0)
    }

    /// Problems that make the store unfit for searching; empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for node_type in [NodeType::Skill, NodeType::Occupation] {
            if self.embedded_count(node_type) == 0 {
                problems.push(format!("no {} nodes carry embeddings", node_type));
            }
        }
        if self.relations == 0 {
            problems.push("no relations stored".to_string());
        }
        problems
    }
}

/// Opens the adapter selected by configuration. The database must exist.
pub fn open_backend(config: &BackendConfig) -> Result<Box<dyn Backend>> {
    let path = config.path();
    tracing::debug!(backend = config.kind().as_str(), path = %path.display(), "opening backend");
    match config.kind() {
        BackendKind::Graph => Ok(Box::new(GraphBackend::open(&path)?)),
        BackendKind::Vector => Ok(Box::new(VectorBackend::open(&path)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_stats_validation() {
        let mut stats = IndexStats::new("graph");
        assert!(!stats.is_indexed(TypeFilter::Both));
        assert_eq!(stats.validate().len(), 3);

        stats.embedded.insert(NodeType::Skill, 4);
        assert!(stats.is_indexed(TypeFilter::Skill));
        assert!(stats.is_indexed(TypeFilter::Both));
        assert!(!stats.is_indexed(TypeFilter::Occupation));

        stats.embedded.insert(NodeType::Occupation, 1);
        stats.relations = 2;
        assert!(stats.validate().is_empty());
    }

    #[test]
    fn test_open_backend_requires_existing_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = BackendConfig::new(BackendKind::Graph, dir.path().join("missing.sqlite"));
        let err = open_backend(&config).err().unwrap();
        assert!(matches!(err, crate::errors::EngineError::Connection { .. }));
    }
}
