// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide tracing setup.
//!
//! `init` is the only place a global subscriber is installed. Calling it more
//! than once is harmless: the first level wins.

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a full filter directive (e.g. `ESCO_LOG=debug`).
pub const LOG_ENV: &str = "ESCO_LOG";

/// Third-party crates that are chatty at `info`.
const QUIET_CRATES: &[&str] = &[
    "ort",
    "hf_hub",
    "fastembed",
    "tokenizers",
    "reqwest",
    "rusqlite",
];

static INITIALIZED: OnceCell<LogLevel> = OnceCell::new();

/// Default verbosity when `ESCO_LOG` is unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

impl LogLevel {
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        if quiet {
            LogLevel::Quiet
        } else if verbose {
            LogLevel::Verbose
        } else {
            LogLevel::Normal
        }
    }

    fn base_directive(&self) -> &'static str {
        match self {
            LogLevel::Quiet => "error",
            LogLevel::Normal => "warn",
            LogLevel::Verbose => "info",
        }
    }
}

/// Builds the filter: `ESCO_LOG` if set, otherwise the level's default, with
/// third-party crates capped at `warn` either way.
pub fn build_filter(level: LogLevel) -> EnvFilter {
    let base = std::env::var(LOG_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| level.base_directive().to_string());

    let directives = QUIET_CRATES
        .iter()
        .fold(base, |acc, krate| format!("{},{}=warn", acc, krate));

    EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(level.base_directive()))
}

/// Installs the global subscriber (stderr, env filter). Idempotent.
pub fn init(level: LogLevel) -> LogLevel {
    *INITIALIZED.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(build_filter(level))
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
        level
    })
}
