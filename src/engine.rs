// SPDX-License-Identifier: MIT OR Apache-2.0

//! Search engine facade.
//!
//! Ties an embedding provider, a backend session and a diagnostic sink
//! together and runs one query pipeline per call:
//! embed → search → (optionally) expand or compose profiles.

use std::sync::Arc;

use crate::backend::{Backend, IndexStats, Session};
use crate::diagnostics::{DiagnosticSink, EngineEvent, TracingSink};
use crate::embedding::EmbeddingProvider;
use crate::errors::{EngineError, Result};
use crate::expand::GraphExpander;
use crate::model::{NodeType, RelatedGraph, SearchResult, TypeFilter};
use crate::profile::{ProfileComposer, ProfileSearch};
use crate::search::{validate_parameters, SimilarityMatcher};

pub struct SearchEngine {
    session: Session,
    provider: Box<dyn EmbeddingProvider>,
    sink: Arc<dyn DiagnosticSink>,
    model_ready: bool,
}

impl SearchEngine {
    /// Connects the session if needed; the engine then owns it.
    pub fn new(
        mut session: Session,
        provider: Box<dyn EmbeddingProvider>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self> {
        session.connect()?;
        Ok(Self {
            session,
            provider,
            sink,
            model_ready: false,
        })
    }

    /// Engine reporting diagnostics through `tracing`.
    pub fn with_tracing(session: Session, provider: Box<dyn EmbeddingProvider>) -> Result<Self> {
        Self::new(session, provider, Arc::new(TracingSink))
    }

    pub fn backend(&self) -> Result<&dyn Backend> {
        self.session.backend()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    /// Embeds query text; blank text and text without embeddable terms are rejected.
    pub fn embed_query(&mut self, query: &str) -> Result<Vec<f32>> {
        if query.trim().is_empty() {
            return Err(EngineError::invalid_argument("query", "must not be empty"));
        }
        let vector = self.provider.embed(query)?;
        if !self.model_ready {
            self.model_ready = true;
            self.sink.emit(EngineEvent::ModelReady {
                model: self.provider.model_id().to_string(),
            });
        }
        // a zero vector is equally far from everything
        if vector.iter().all(|x| *x == 0.0) {
            return Err(EngineError::invalid_argument(
                "query",
                "contains no terms the embedding model can represent",
            ));
        }
        Ok(vector)
    }

    /// Ranked entries of the filtered types scoring at least `threshold`.
    pub fn search(
        &mut self,
        query: &str,
        filter: TypeFilter,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchResult>> {
        validate_parameters(limit, threshold)?;
        let vector = self.embed_query(query)?;
        SimilarityMatcher::new(self.session.backend()?, self.sink.as_ref())
            .search(&vector, filter, limit, threshold)
    }

    /// Expands one node. Fails with `NodeNotFound` if `uri` is absent.
    pub fn related(&self, uri: &str, node_type: NodeType) -> Result<RelatedGraph> {
        GraphExpander::new(self.session.backend()?, self.sink.as_ref()).expand(uri, node_type)
    }

    /// Expands one node whose type is looked up first.
    pub fn related_node(&self, uri: &str) -> Result<RelatedGraph> {
        GraphExpander::new(self.session.backend()?, self.sink.as_ref()).expand_node(uri)
    }

    /// Expands the top result, if any.
    ///
    /// A top node that no longer exists yields `None`; other failures propagate.
    pub fn related_to_top(&self, results: &[SearchResult]) -> Result<Option<RelatedGraph>> {
        let Some(top) = results.first() else {
            return Ok(None);
        };
        match self.related(top.uri(), top.node_type()) {
            Ok(graph) => Ok(Some(graph)),
            Err(EngineError::NodeNotFound { uri }) => {
                tracing::debug!(%uri, "top result vanished before expansion");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Occupation search with each hit expanded into a profile.
    pub fn profile_search(
        &mut self,
        query: &str,
        requested: TypeFilter,
        limit: usize,
        threshold: f32,
    ) -> Result<ProfileSearch> {
        validate_parameters(limit, threshold)?;
        let vector = self.embed_query(query)?;
        ProfileComposer::new(self.session.backend()?, self.sink.as_ref())
            .compose(&vector, requested, limit, threshold)
    }

    pub fn index_stats(&self) -> Result<IndexStats> {
        self.session.backend()?.index_stats()
    }

    /// Fails with `NotIndexed` unless some node admitted by `filter` is embedded.
    pub fn ensure_indexed(&self, filter: TypeFilter) -> Result<IndexStats> {
        let backend = self.session.backend()?;
        let stats = backend.index_stats()?;
        if !stats.is_indexed(filter) {
            return Err(EngineError::NotIndexed {
                backend: backend.name(),
                filter,
            });
        }
        Ok(stats)
    }

    /// Releases the backend. Later queries fail with a connection error.
    pub fn close(&mut self) -> Result<()> {
        self.session.close()
    }
}
