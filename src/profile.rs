// SPDX-License-Identifier: MIT OR Apache-2.0

//! Profile composition: occupation search results paired with their context.

use serde::Serialize;

use crate::backend::Backend;
use crate::diagnostics::{DiagnosticSink, EngineEvent};
use crate::errors::Result;
use crate::expand::GraphExpander;
use crate::model::{NodeType, Profile, TypeFilter};
use crate::search::SimilarityMatcher;

/// Profiles are only ever rooted at occupations.
pub const PROFILE_FILTER: TypeFilter = TypeFilter::Occupation;

/// Records that the caller's filter was replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TypeOverride {
    pub requested: TypeFilter,
    pub applied: TypeFilter,
}

/// Outcome of a profile search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileSearch {
    /// In search-result order.
    pub profiles: Vec<Profile>,
    /// Set when the requested filter was not `Occupation`.
    pub type_override: Option<TypeOverride>,
}

pub struct ProfileComposer<'a> {
    backend: &'a dyn Backend,
    sink: &'a dyn DiagnosticSink,
}

impl<'a> ProfileComposer<'a> {
    pub fn new(backend: &'a dyn Backend, sink: &'a dyn DiagnosticSink) -> Self {
        Self { backend, sink }
    }

    /// Searches occupations and expands each hit.
    ///
    /// A requested filter other than `Occupation` is overridden and reported
    /// both as an event and in the returned `type_override`. Any expansion
    /// failure aborts the whole composition.
    pub fn compose(
        &self,
        vector: &[f32],
        requested: TypeFilter,
        limit: usize,
        threshold: f32,
    ) -> Result<ProfileSearch> {
        let type_override = if requested != PROFILE_FILTER {
            self.sink.emit(EngineEvent::TypeOverridden {
                requested,
                applied: PROFILE_FILTER,
            });
            Some(TypeOverride {
                requested,
                applied: PROFILE_FILTER,
            })
        } else {
            None
        };

        let results = SimilarityMatcher::new(self.backend, self.sink).search(
            vector,
            PROFILE_FILTER,
            limit,
            threshold,
        )?;

        let expander = GraphExpander::new(self.backend, self.sink);
        let mut profiles = Vec::with_capacity(results.len());
        for search_result in results {
            let profile = expander.expand(search_result.uri(), NodeType::Occupation)?;
            profiles.push(Profile {
                search_result,
                profile,
            });
        }

        Ok(ProfileSearch {
            profiles,
            type_override,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::IndexStats;
    use crate::diagnostics::MemorySink;
    use crate::errors::EngineError;
    use crate::model::{Node, RelatedGraph, SearchResult};
    use crate::search::tests::CannedBackend;

    fn candidates() -> Vec<SearchResult> {
        vec![
            SearchResult::new(Node::new("o:baker", NodeType::Occupation, "baker"), 0.6),
            SearchResult::new(Node::new("s:cook", NodeType::Skill, "cook"), 0.95),
            SearchResult::new(Node::new("o:chef", NodeType::Occupation, "Chef"), 0.8),
        ]
    }

    #[test]
    fn test_profiles_follow_search_order() {
        let backend = CannedBackend::new(candidates());
        let sink = MemorySink::new();
        let composer = ProfileComposer::new(&backend, sink.as_ref());

        let outcome = composer
            .compose(&[0.0], TypeFilter::Occupation, 5, 0.3)
            .unwrap();
        assert!(outcome.type_override.is_none());
        assert!(sink.overrides().is_empty());

        let roots: Vec<&str> = outcome
            .profiles
            .iter()
            .map(|p| p.profile.node.uri.as_str())
            .collect();
        assert_eq!(roots, vec!["o:chef", "o:baker"]);
        assert!(outcome
            .profiles
            .iter()
            .all(|p| p.search_result.node_type() == NodeType::Occupation));
    }

    #[test]
    fn test_other_filters_are_overridden_observably() {
        let backend = CannedBackend::new(candidates());
        let sink = MemorySink::new();
        let composer = ProfileComposer::new(&backend, sink.as_ref());

        let outcome = composer.compose(&[0.0], TypeFilter::Skill, 1, 0.3).unwrap();
        assert_eq!(
            outcome.type_override,
            Some(TypeOverride {
                requested: TypeFilter::Skill,
                applied: TypeFilter::Occupation,
            })
        );
        assert_eq!(
            sink.overrides(),
            vec![(TypeFilter::Skill, TypeFilter::Occupation)]
        );
        assert_eq!(outcome.profiles.len(), 1);
        assert_eq!(outcome.profiles[0].search_result.label(), "Chef");
        assert_eq!(
            backend.requests.lock().unwrap().as_slice(),
            &[(TypeFilter::Occupation, 1)]
        );
    }

    #[test]
    fn test_no_hits_means_no_profiles() {
        let backend = CannedBackend::new(candidates());
        let sink = MemorySink::new();
        let composer = ProfileComposer::new(&backend, sink.as_ref());
        let outcome = composer
            .compose(&[0.0], TypeFilter::Occupation, 5, 0.9)
            .unwrap();
        assert!(outcome.profiles.is_empty());
    }

    struct VanishingBackend(CannedBackend);

    impl Backend for VanishingBackend {
        fn name(&self) -> &'static str {
            "vanishing"
        }

        fn similarity_search(
            &self,
            vector: &[f32],
            filter: TypeFilter,
            limit: usize,
            threshold: f32,
        ) -> Result<Vec<SearchResult>> {
            self.0.similarity_search(vector, filter, limit, threshold)
        }

        fn fetch_related(&self, uri: &str, _node_type: NodeType) -> Result<RelatedGraph> {
            Err(EngineError::node_not_found(uri))
        }

        fn fetch_node(&self, uri: &str) -> Result<Node> {
            Err(EngineError::node_not_found(uri))
        }

        fn index_stats(&self) -> Result<IndexStats> {
            Ok(IndexStats::new("vanishing"))
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }

        fn is_closed(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_failed_expansion_aborts_composition() {
        let backend = VanishingBackend(CannedBackend::new(candidates()));
        let sink = MemorySink::new();
        let composer = ProfileComposer::new(&backend, sink.as_ref());
        let err = composer
            .compose(&[0.0], TypeFilter::Occupation, 5, 0.3)
            .unwrap_err();
        assert!(matches!(err, EngineError::NodeNotFound { uri } if uri == "o:chef"));
    }
}
