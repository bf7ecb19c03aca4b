// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared by the search engine, backends and embedding providers.

use crate::model::TypeFilter;

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Every failure the engine can surface to its caller.
///
/// Each variant carries enough context (operation, identifier, backend) for
/// the caller to log it once and decide whether to retry.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The embedding model could not be loaded or failed while running.
    #[error("embedding model '{model}' unavailable: {reason}")]
    ModelUnavailable { model: String, reason: String },

    /// A caller passed an argument outside the engine's contract.
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    /// The requested URI does not exist in the backend.
    #[error("node not found: {uri}")]
    NodeNotFound { uri: String },

    /// A query against a backend failed.
    #[error("{backend} backend failed during {operation}: {source}")]
    BackendQuery {
        backend: &'static str,
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The backend session is unusable (never opened, already closed, or broken).
    #[error("{backend} backend connection unusable: {reason}")]
    Connection { backend: &'static str, reason: String },

    /// Search-only mode was requested but the backend holds no embeddings.
    #[error(
        "{backend} backend has no indexed {} embeddings; run ingestion first",
        .filter.describe()
    )]
    NotIndexed {
        backend: &'static str,
        filter: TypeFilter,
    },
}

impl EngineError {
    pub fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }

    pub fn node_not_found(uri: impl Into<String>) -> Self {
        Self::NodeNotFound { uri: uri.into() }
    }

    pub fn model_unavailable(model: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ModelUnavailable {
            model: model.into(),
            reason: reason.to_string(),
        }
    }

    pub fn connection(backend: &'static str, reason: impl Into<String>) -> Self {
        Self::Connection {
            backend,
            reason: reason.into(),
        }
    }

    /// Whether a later attempt of the same call may succeed.
    ///
    /// The engine itself never retries; this only informs the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ModelUnavailable { .. } | Self::BackendQuery { .. }
        )
    }
}

/// Attaches backend and operation context to a store-level error.
pub(crate) trait QueryContext<T> {
    fn during(self, backend: &'static str, operation: &'static str) -> Result<T>;
}

impl<T, E> QueryContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn during(self, backend: &'static str, operation: &'static str) -> Result<T> {
        self.map_err(|source| EngineError::BackendQuery {
            backend,
            operation,
            source: Box::new(source),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_name_backend_and_operation() {
        let raw: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "socket closed"));
        let err = raw.during("graph", "fetch_related").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("graph"));
        assert!(message.contains("fetch_related"));
        assert!(message.contains("socket closed"));
        assert!(err.is_retryable());
    }

    #[test]
    fn not_indexed_names_the_missing_types() {
        let both = EngineError::NotIndexed {
            backend: "graph",
            filter: TypeFilter::Both,
        };
        assert_eq!(
            both.to_string(),
            "graph backend has no indexed Skill or Occupation embeddings; run ingestion first"
        );
        let skill = EngineError::NotIndexed {
            backend: "vector",
            filter: TypeFilter::Skill,
        };
        assert!(skill.to_string().contains("no indexed Skill embeddings"));
    }

    #[test]
    fn caller_bugs_are_not_retryable() {
        assert!(!EngineError::invalid_argument("limit", "must be at least 1").is_retryable());
        assert!(!EngineError::node_not_found("http://x").is_retryable());
        assert!(!EngineError::connection("vector", "closed").is_retryable());
    }
}
