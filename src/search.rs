// SPDX-License-Identifier: MIT OR Apache-2.0

//! Similarity matching.
//!
//! The backend does the heavy lifting; the matcher validates arguments and
//! re-enforces the result contract on whatever the backend returns: type
//! restriction, score bounds, threshold, order and limit.

use crate::backend::Backend;
use crate::diagnostics::{DiagnosticSink, EngineEvent};
use crate::errors::{EngineError, Result};
use crate::model::{SearchResult, TypeFilter};

/// Rejects a limit below 1 or a threshold outside `[0, 1]`.
pub fn validate_parameters(limit: usize, threshold: f32) -> Result<()> {
    if limit == 0 {
        return Err(EngineError::invalid_argument("limit", "must be at least 1"));
    }
    if !(0.0..=1.0).contains(&threshold) {
        return Err(EngineError::invalid_argument(
            "threshold",
            format!("must be within 0.0..=1.0 (got {})", threshold),
        ));
    }
    Ok(())
}

/// Filters, orders and truncates raw candidates.
///
/// Scores are clamped to `[0, 1]` before the threshold is applied; a candidate
/// is kept when its score is at least `threshold`.
pub fn rank(
    candidates: Vec<SearchResult>,
    filter: TypeFilter,
    limit: usize,
    threshold: f32,
) -> Vec<SearchResult> {
    let mut kept: Vec<SearchResult> = candidates
        .into_iter()
        .filter(|candidate| filter.admits(candidate.node_type()) && !candidate.score.is_nan())
        .map(|mut candidate| {
            candidate.score = candidate.score.clamp(0.0, 1.0);
            candidate
        })
        .filter(|candidate| candidate.score >= threshold)
        .collect();

    kept.sort_by(SearchResult::ranking);
    kept.truncate(limit);
    kept
}

/// Ranks taxonomy entries against a query vector.
pub struct SimilarityMatcher<'a> {
    backend: &'a dyn Backend,
    sink: &'a dyn DiagnosticSink,
}

impl<'a> SimilarityMatcher<'a> {
    pub fn new(backend: &'a dyn Backend, sink: &'a dyn DiagnosticSink) -> Self {
        Self { backend, sink }
    }

    /// At most `limit` results of the filtered types scoring at least `threshold`.
    ///
    /// An empty result is not an error.
    pub fn search(
        &self,
        vector: &[f32],
        filter: TypeFilter,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchResult>> {
        validate_parameters(limit, threshold)?;

        let candidates = self
            .backend
            .similarity_search(vector, filter, limit, threshold)?;
        let total = candidates.len();
        let ranked = rank(candidates, filter, limit, threshold);

        self.sink.emit(EngineEvent::SearchCompleted {
            filter,
            candidates: total,
            returned: ranked.len(),
        });
        Ok(ranked)
    }
}
