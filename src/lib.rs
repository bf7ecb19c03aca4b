// SPDX-License-Identifier: MIT OR Apache-2.0

//! esco-search - semantic search over the ESCO occupation and skill taxonomy
//!
//! Shared modules for the `esco` CLI: query embedding, similarity ranking,
//! relation expansion and occupation profiles over a graph or vector store.

pub mod backend;
pub mod config;
pub mod diagnostics;
pub mod embedding;
pub mod engine;
pub mod errors;
pub mod expand;
pub mod logging;
pub mod model;
pub mod output;
pub mod profile;
pub mod search;

pub use engine::SearchEngine;
pub use errors::{EngineError, Result};
pub use model::{Node, NodeType, Profile, RelatedGraph, SearchResult, TypeFilter};
