// SPDX-License-Identifier: MIT OR Apache-2.0

//! Diagnostic events emitted by the engine.
//!
//! Engine components receive a sink instead of calling the global logger, so
//! callers decide where events go and tests can assert on them.

use std::sync::{Arc, Mutex};

use crate::model::{NodeType, TypeFilter};

/// Something noteworthy that happened while answering a query.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Profile search replaced the caller's type filter.
    TypeOverridden {
        requested: TypeFilter,
        applied: TypeFilter,
    },
    SearchCompleted {
        filter: TypeFilter,
        candidates: usize,
        returned: usize,
    },
    ExpansionCompleted {
        uri: String,
        node_type: NodeType,
        nodes: usize,
    },
    ModelReady {
        model: String,
    },
}

/// Receiver for engine events.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::TypeOverridden { requested, applied } => {
                tracing::warn!(
                    %requested,
                    %applied,
                    "profile search is only available for {}; switching type",
                    applied
                );
            }
            EngineEvent::SearchCompleted {
                filter,
                candidates,
                returned,
            } => {
                tracing::info!(%filter, candidates, returned, "similarity search completed");
            }
            EngineEvent::ExpansionCompleted {
                uri,
                node_type,
                nodes,
            } => {
                tracing::debug!(%uri, %node_type, nodes, "related graph expanded");
            }
            EngineEvent::ModelReady { model } => {
                tracing::debug!(%model, "embedding model ready");
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&self, _event: EngineEvent) {}
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<EngineEvent>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn overrides(&self) -> Vec<(TypeFilter, TypeFilter)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::TypeOverridden { requested, applied } => Some((requested, applied)),
                _ => None,
            })
            .collect()
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, event: EngineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
