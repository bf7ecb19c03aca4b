// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding module - turns query text into vectors
//!
//! Providers are selected by configuration; all of them are deterministic for
//! a fixed model and load their model at most once per process.

pub mod hashing;
pub mod provider;

pub use hashing::HashingEmbedder;
#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
pub use provider::{FastEmbedConfig, FastEmbedder};
pub use provider::{create_provider, CommandProvider, EmbeddingProvider};
