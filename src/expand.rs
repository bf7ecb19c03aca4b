// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graph expansion around a single node.

use crate::backend::Backend;
use crate::diagnostics::{DiagnosticSink, EngineEvent};
use crate::errors::Result;
use crate::model::{NodeType, RelatedGraph};

/// Collects every node adjacent to a root, grouped by relation.
///
/// Returns complete groups; capping for display happens in `output`.
pub struct GraphExpander<'a> {
    backend: &'a dyn Backend,
    sink: &'a dyn DiagnosticSink,
}

impl<'a> GraphExpander<'a> {
    pub fn new(backend: &'a dyn Backend, sink: &'a dyn DiagnosticSink) -> Self {
        Self { backend, sink }
    }

    /// Fails with `NodeNotFound` if `uri` is absent.
    pub fn expand(&self, uri: &str, node_type: NodeType) -> Result<RelatedGraph> {
        let mut graph = self.backend.fetch_related(uri, node_type)?;
        for group in node_type.relation_groups() {
            graph.related.entry(*group).or_default();
        }

        self.sink.emit(EngineEvent::ExpansionCompleted {
            uri: uri.to_string(),
            node_type,
            nodes: graph.total_related(),
        });
        Ok(graph)
    }

    /// Looks the node's type up first, then expands it.
    pub fn expand_node(&self, uri: &str) -> Result<RelatedGraph> {
        let node = self.backend.fetch_node(uri)?;
        self.expand(uri, node.node_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GraphBackend, TaxonomyWriter};
    use crate::diagnostics::MemorySink;
    use crate::errors::EngineError;
    use crate::model::{Node, Relation, RelationGroup, RelationType};

    fn backend() -> GraphBackend {
        let mut backend = GraphBackend::in_memory().unwrap();
        for node in [
            Node::new("o:chef", NodeType::Occupation, "Chef"),
            Node::new("s:knife", NodeType::Skill, "knife skills"),
            Node::new("s:lonely", NodeType::Skill, "lonely skill"),
        ] {
            backend.put_node(&node).unwrap();
        }
        backend
            .put_relation(&Relation::new("s:knife", RelationType::EssentialFor, "o:chef"))
            .unwrap();
        backend
            .put_relation(&Relation::new("s:knife", RelationType::EssentialFor, "o:chef"))
            .unwrap();
        backend
    }

    #[test]
    fn test_expand_returns_every_edge_without_dedup() {
        let backend = backend();
        let sink = MemorySink::new();
        let expander = GraphExpander::new(&backend, sink.as_ref());

        let chef = expander.expand("o:chef", NodeType::Occupation).unwrap();
        assert_eq!(chef.group(RelationGroup::EssentialSkills).len(), 2);
        assert_eq!(chef.non_empty_groups().count(), 1);
        assert_eq!(
            sink.events(),
            vec![EngineEvent::ExpansionCompleted {
                uri: "o:chef".to_string(),
                node_type: NodeType::Occupation,
                nodes: 2,
            }]
        );
    }

    #[test]
    fn test_expand_isolated_node() {
        let backend = backend();
        let sink = MemorySink::new();
        let expander = GraphExpander::new(&backend, sink.as_ref());

        let graph = expander.expand_node("s:lonely").unwrap();
        assert_eq!(graph.node.label, "lonely skill");
        assert_eq!(graph.non_empty_groups().count(), 0);
        assert_eq!(graph.related.len(), NodeType::Skill.relation_groups().len());
    }

    #[test]
    fn test_expand_missing_node() {
        let backend = backend();
        let sink = MemorySink::new();
        let expander = GraphExpander::new(&backend, sink.as_ref());
        assert!(matches!(
            expander.expand("s:gone", NodeType::Skill),
            Err(EngineError::NodeNotFound { uri }) if uri == "s:gone"
        ));
        assert!(sink.events().is_empty());
    }
}
