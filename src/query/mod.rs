// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query module - search, expansion and status commands
//!
//! Every command opens one session, runs, and closes the session on every
//! path before its outcome is reported.

pub mod related;
pub mod search;
pub mod status;

use anyhow::{Context as _, Result};

use crate::cli::{Cli, OutputFormat};
use esco_search::backend::Session;
use esco_search::config::{BackendConfig, Config};
use esco_search::embedding::create_provider;
use esco_search::SearchEngine;

/// Settings resolved once per invocation.
pub struct Context {
    pub config: Config,
    pub backend: BackendConfig,
    pub format: OutputFormat,
    pub compact: bool,
}

impl Context {
    /// Flags override environment, environment overrides the config file.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let config = Config::load(cli.config.as_deref())?;
        let mut backend = config.backend_for(cli.profile.as_deref())?;
        if let Some(kind) = cli.backend {
            backend.kind = Some(kind.into());
        }
        if let Some(db) = &cli.db {
            backend.path = Some(db.clone());
        }
        Ok(Self {
            config,
            backend,
            format: cli.format,
            compact: cli.compact,
        })
    }

    pub fn open_engine(&self) -> Result<SearchEngine> {
        let provider = create_provider(self.config.embeddings())
            .context("Failed to set up embedding provider")?;
        SearchEngine::with_tracing(Session::new(self.backend.clone()), provider).with_context(
            || {
                format!(
                    "Failed to open {} backend at {}",
                    self.backend.kind().as_str(),
                    self.backend.path().display()
                )
            },
        )
    }
}

/// Runs `body` and closes the engine's session whatever the outcome.
///
/// A failure in `body` wins over a failure to close, which is only logged,
/// so the caller sees a single error.
pub fn with_engine<T>(
    engine: &mut SearchEngine,
    body: impl FnOnce(&mut SearchEngine) -> Result<T>,
) -> Result<T> {
    let outcome = body(engine);
    let closed = engine.close();
    match (outcome, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err).context("Failed to close backend session"),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            tracing::warn!(error = %close_err, "failed to close backend session");
            Err(err)
        }
    }
}
