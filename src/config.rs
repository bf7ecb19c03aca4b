// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration file support for esco
//!
//! Loads configuration from an explicit path, `.escorc.toml` in the current
//! directory, or `~/.config/esco/config.toml`, falling back to defaults.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::model::TypeFilter;

/// Local config file name looked up in the working directory.
pub const LOCAL_CONFIG: &str = ".escorc.toml";

/// Default taxonomy database location, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = ".esco/taxonomy.sqlite";

/// Which store adapter to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Graph,
    Vector,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Graph => "graph",
            BackendKind::Vector => "vector",
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "graph" | "neo4j" => Ok(BackendKind::Graph),
            "vector" | "weaviate" => Ok(BackendKind::Vector),
            _ => Err(format!("Unknown backend: {}", s)),
        }
    }
}

/// Embedding provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderType {
    #[default]
    Builtin,
    Hashing,
    Command,
}

/// Backend connection settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Store adapter (graph, vector)
    pub kind: Option<BackendKind>,
    /// Path to the taxonomy database file
    pub path: Option<PathBuf>,
}

impl BackendConfig {
    pub fn new(kind: BackendKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind: Some(kind),
            path: Some(path.into()),
        }
    }

    /// Get backend kind (defaults to Graph)
    pub fn kind(&self) -> BackendKind {
        self.kind.unwrap_or_default()
    }

    /// Get database path (defaults to `.esco/taxonomy.sqlite`)
    pub fn path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
    }

    /// Fill unset fields from `base`.
    fn or(&self, base: &BackendConfig) -> BackendConfig {
        BackendConfig {
            kind: self.kind.or(base.kind),
            path: self.path.clone().or_else(|| base.path.clone()),
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider type (builtin, hashing, command)
    pub provider: Option<EmbeddingProviderType>,
    /// Model identifier for the embedding provider
    pub model: Option<String>,
    /// Command to execute for command provider
    pub command: Option<String>,
    /// Maximum characters of input text passed to the model
    pub max_chars: Option<usize>,
    /// Whether to L2-normalize output vectors
    pub normalize: Option<bool>,
    /// Output dimension for the hashing provider
    pub dimension: Option<usize>,
    /// Where the builtin provider caches downloaded model files
    pub cache_dir: Option<PathBuf>,
}

impl EmbeddingConfig {
    /// Get provider type (defaults to Builtin)
    pub fn provider(&self) -> EmbeddingProviderType {
        self.provider.unwrap_or_default()
    }

    /// Get model identifier (defaults to "minilm")
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or("minilm")
    }

    /// Get command (defaults to "embedder")
    pub fn command(&self) -> &str {
        self.command.as_deref().unwrap_or("embedder")
    }

    /// Get max chars (defaults to 2000)
    pub fn max_chars(&self) -> usize {
        self.max_chars.unwrap_or(2000)
    }

    /// Get normalize flag (defaults to true)
    pub fn normalize(&self) -> bool {
        self.normalize.unwrap_or(true)
    }

    /// Get hashing dimension (defaults to 384)
    pub fn dimension(&self) -> usize {
        self.dimension.unwrap_or(384)
    }
}

/// Search defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of results
    pub limit: Option<usize>,
    /// Minimum similarity score (0.0-1.0)
    pub threshold: Option<f32>,
    /// Default node type filter (skill, occupation, both)
    pub node_type: Option<String>,
    /// Related nodes shown per group before "... and N more"
    pub related_cap: Option<usize>,
}

impl SearchConfig {
    /// Get limit (defaults to 10)
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(10)
    }

    /// Get threshold (defaults to 0.5)
    pub fn threshold(&self) -> f32 {
        self.threshold.unwrap_or(0.5)
    }

    /// Get node type filter (defaults to Both)
    pub fn node_type(&self) -> Result<TypeFilter> {
        match self.node_type.as_deref() {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("Invalid search.node_type: {}", raw)),
            None => Ok(TypeFilter::Both),
        }
    }

    /// Get related cap (defaults to 5)
    pub fn related_cap(&self) -> usize {
        self.related_cap.unwrap_or(5)
    }
}

/// Configuration loaded from `.escorc.toml` or `~/.config/esco/config.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default backend connection
    #[serde(default)]
    pub backend: BackendConfig,

    /// Named backend profiles (e.g., "default", "aura")
    #[serde(default, rename = "profile")]
    pub profiles: HashMap<String, BackendConfig>,

    /// Embedding configuration
    #[serde(default)]
    pub embeddings: EmbeddingConfig,

    /// Search defaults
    #[serde(default)]
    pub search: SearchConfig,
}

impl Config {
    /// Load configuration
    ///
    /// Precedence (highest to lowest):
    /// 1. `explicit` path (must exist)
    /// 2. `.escorc.toml` in current directory
    /// 3. `~/.config/esco/config.toml`
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                bail!("Configuration file not found: {}", path.display());
            }
            return Self::load_from_path(path);
        }

        let local = PathBuf::from(LOCAL_CONFIG);
        if local.exists() {
            return Self::load_from_path(&local);
        }

        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("esco").join("config.toml");
            if config_path.exists() {
                return Self::load_from_path(&config_path);
            }
        }

        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Reject values the engine would refuse later anyway.
    pub fn validate(&self) -> Result<()> {
        if let Some(threshold) = self.search.threshold {
            if !(0.0..=1.0).contains(&threshold) {
                bail!("search.threshold must be within 0.0..=1.0 (got {})", threshold);
            }
        }
        if self.search.limit == Some(0) {
            bail!("search.limit must be at least 1");
        }
        if self.search.related_cap == Some(0) {
            bail!("search.related_cap must be at least 1");
        }
        if self.embeddings.dimension == Some(0) {
            bail!("embeddings.dimension must be at least 1");
        }
        self.search.node_type()?;
        Ok(())
    }

    /// Resolve the backend for a profile name, applying `ESCO_BACKEND` / `ESCO_DB`.
    ///
    /// `default` maps to `[backend]`; other names must exist under `[profile.*]`.
    pub fn backend_for(&self, profile: Option<&str>) -> Result<BackendConfig> {
        let mut resolved = match profile {
            None | Some("default") => self.backend.clone(),
            Some(name) => match self.profiles.get(name) {
                Some(profile) => profile.or(&self.backend),
                None => bail!("Profile '{}' not found in configuration", name),
            },
        };

        if let Ok(raw) = std::env::var("ESCO_BACKEND") {
            let kind = raw
                .parse::<BackendKind>()
                .map_err(|e| anyhow::anyhow!(e))
                .context("Invalid ESCO_BACKEND")?;
            resolved.kind = Some(kind);
        }
        if let Some(path) = std::env::var_os("ESCO_DB") {
            resolved.path = Some(PathBuf::from(path));
        }

        Ok(resolved)
    }

    /// Get the embedding configuration
    pub fn embeddings(&self) -> &EmbeddingConfig {
        &self.embeddings
    }

    /// Get the search configuration
    pub fn search(&self) -> &SearchConfig {
        &self.search
    }
}
