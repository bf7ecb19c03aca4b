// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding provider interface and implementations.
//!
//! The builtin provider runs a local sentence-transformer through fastembed;
//! the command provider shells out to an external embedder.

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use serde_json::Value;
use std::borrow::Cow;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use super::hashing::HashingEmbedder;
use crate::config::{EmbeddingConfig, EmbeddingProviderType};
use crate::errors::{EngineError, Result};

const DEFAULT_FASTEMBED_MODEL: &str = "minilm";
const DEFAULT_MAX_CHARS: usize = 2000;

/// Trait for embedding providers.
///
/// Implementations must be deterministic for a fixed model: the same text
/// always yields the same vector within a process.
pub trait EmbeddingProvider: Send {
    /// Returns the model identifier.
    fn model_id(&self) -> &str;

    /// Generates embeddings for the given texts.
    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generates an embedding for a single text.
    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        let model = self.model_id().to_string();
        let mut result = self.embed_texts(&[text.to_string()])?;
        result
            .pop()
            .ok_or_else(|| EngineError::model_unavailable(model, "no embedding returned"))
    }
}

/// Builds the provider selected by configuration.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider() {
        EmbeddingProviderType::Builtin => builtin_provider(config),
        EmbeddingProviderType::Hashing => Ok(Box::new(HashingEmbedder::new(config.dimension()))),
        EmbeddingProviderType::Command => Ok(Box::new(CommandProvider::new(
            config.command().to_string(),
            config.model().to_string(),
        ))),
    }
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
fn builtin_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    Ok(Box::new(FastEmbedder::new(
        FastEmbedConfig::from_config(config)?.with_env_overrides()?,
    )))
}

#[cfg(all(target_os = "macos", target_arch = "x86_64"))]
fn builtin_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    Err(EngineError::model_unavailable(
        config.model(),
        "the builtin provider is not available on this platform; use provider = \"command\"",
    ))
}

/// Configuration for the fastembed provider.
#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
#[derive(Debug, Clone)]
pub struct FastEmbedConfig {
    pub model: EmbeddingModel,
    pub max_chars: usize,
    pub normalize: bool,
    pub cache_dir: Option<PathBuf>,
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
impl FastEmbedConfig {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            model: parse_model(config.model())?,
            max_chars: config.max_chars(),
            normalize: config.normalize(),
            cache_dir: config.cache_dir.clone(),
        })
    }

    /// Applies `FASTEMBED_MODEL`, `FASTEMBED_MAX_CHARS` and `FASTEMBED_NORMALIZE`.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(raw) = read_env("FASTEMBED_MODEL")? {
            self.model = parse_model(&raw)?;
        }
        if let Some(raw) = read_env("FASTEMBED_MAX_CHARS")? {
            let max_chars = raw.parse::<usize>().map_err(|_| {
                EngineError::invalid_argument("FASTEMBED_MAX_CHARS", format!("not a number: {}", raw))
            })?;
            self.max_chars = if max_chars == 0 {
                DEFAULT_MAX_CHARS
            } else {
                max_chars
            };
        }
        if let Some(raw) = read_env("FASTEMBED_NORMALIZE")? {
            self.normalize = parse_bool("FASTEMBED_NORMALIZE", &raw)?;
        }
        Ok(self)
    }
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
impl Default for FastEmbedConfig {
    fn default() -> Self {
        Self {
            model: EmbeddingModel::AllMiniLML6V2,
            max_chars: DEFAULT_MAX_CHARS,
            normalize: true,
            cache_dir: None,
        }
    }
}

/// FastEmbed provider; the ONNX model is loaded on first use and then reused.
#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
pub struct FastEmbedder {
    embedder: Option<TextEmbedding>,
    config: FastEmbedConfig,
    model_id: String,
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
impl FastEmbedder {
    pub fn new(config: FastEmbedConfig) -> Self {
        let model_id = config.model.to_string();
        Self {
            embedder: None,
            config,
            model_id,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.embedder.is_some()
    }

    /// Loads the model once. A failed load leaves the provider unloaded so a
    /// later call can try again.
    fn ensure_model(&mut self) -> Result<&mut TextEmbedding> {
        if self.embedder.is_none() {
            let mut init = InitOptions::new(self.config.model.clone());
            if let Some(dir) = &self.config.cache_dir {
                init = init.with_cache_dir(dir.clone());
            }
            let embedder = TextEmbedding::try_new(init)
                .map_err(|e| EngineError::model_unavailable(&self.model_id, format!("{:#}", e)))?;
            tracing::info!(model = %self.model_id, "loaded embedding model");
            self.embedder = Some(embedder);
        }
        self.embedder
            .as_mut()
            .ok_or_else(|| EngineError::model_unavailable(&self.model_id, "model not loaded"))
    }
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
impl EmbeddingProvider for FastEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prepared = truncate_texts(texts, self.config.max_chars);
        let normalize = self.config.normalize;
        let model_id = self.model_id.clone();
        let embedder = self.ensure_model()?;
        let mut embeddings = embedder
            .embed(&prepared, None)
            .map_err(|e| EngineError::model_unavailable(model_id, format!("{:#}", e)))?;

        if normalize {
            for embedding in embeddings.iter_mut() {
                l2_normalize(embedding);
            }
        }

        Ok(embeddings)
    }
}

/// Command provider that shells out to an external process.
///
/// The command receives `{"model": ..., "texts": [...]}` on stdin and prints
/// either a JSON array of vectors or an object holding one under
/// `embeddings`, `vectors` or `data`.
pub struct CommandProvider {
    command: String,
    model: String,
}

impl CommandProvider {
    pub fn new(command: String, model: String) -> Self {
        Self { command, model }
    }

    fn unavailable(&self, reason: impl std::fmt::Display) -> EngineError {
        EngineError::model_unavailable(&self.model, format!("`{}`: {}", self.command, reason))
    }

    fn run_command(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let payload = serde_json::json!({
            "model": self.model,
            "texts": texts,
        });

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.unavailable(format!("failed to spawn: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(payload.to_string().as_bytes())
                .map_err(|e| self.unavailable(format!("failed to write payload: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| self.unavailable(format!("failed to read output: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.unavailable(format!(
                "exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed: Value = serde_json::from_str(stdout.trim())
            .map_err(|e| self.unavailable(format!("output is not JSON: {}", e)))?;
        let vectors = parse_vectors(parsed).map_err(|reason| self.unavailable(reason))?;

        if vectors.len() != texts.len() {
            return Err(self.unavailable(format!(
                "returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }
}

impl EmbeddingProvider for CommandProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(command = %self.command, texts = texts.len(), "running embedding command");
        self.run_command(texts)
    }
}

fn parse_vectors(parsed: Value) -> std::result::Result<Vec<Vec<f32>>, String> {
    let rows = match parsed {
        Value::Array(rows) => rows,
        Value::Object(mut obj) => match ["embeddings", "vectors", "data"]
            .iter()
            .find_map(|key| obj.remove(*key))
        {
            Some(Value::Array(rows)) => rows,
            Some(_) => return Err("embeddings field must be an array".to_string()),
            None => return Err("output missing 'embeddings' field".to_string()),
        },
        _ => return Err("output must be a JSON array or object".to_string()),
    };

    rows.iter()
        .map(|row| {
            row.as_array()
                .ok_or_else(|| "embedding row must be an array".to_string())?
                .iter()
                .map(|value| {
                    value
                        .as_f64()
                        .map(|v| v as f32)
                        .ok_or_else(|| "embedding value must be a number".to_string())
                })
                .collect()
        })
        .collect()
}

fn truncate_texts(texts: &[String], max_chars: usize) -> Vec<Cow<'_, str>> {
    texts
        .iter()
        .map(|text| truncate_to_chars(text.as_str(), max_chars))
        .collect()
}

fn truncate_to_chars(input: &str, max_chars: usize) -> Cow<'_, str> {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => Cow::Owned(input[..idx].to_string()),
        None => Cow::Borrowed(input),
    }
}

pub(crate) fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
fn parse_model(raw: &str) -> Result<EmbeddingModel> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(EmbeddingModel::AllMiniLML6V2);
    }

    match value.to_lowercase().as_str() {
        "minilm"
        | "all-minilm-l6-v2"
        | "sentence-transformers/all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "minilm-l12" | "all-minilm-l12-v2" | "sentence-transformers/all-minilm-l12-v2" => {
            Ok(EmbeddingModel::AllMiniLML12V2)
        }
        "bge-small" | "bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => {
            Ok(EmbeddingModel::BGESmallENV15)
        }
        "multilingual"
        | "paraphrase-multilingual-minilm-l12-v2"
        | "sentence-transformers/paraphrase-multilingual-minilm-l12-v2" => {
            Ok(EmbeddingModel::ParaphraseMLMiniLML12V2)
        }
        other => Err(EngineError::invalid_argument(
            "embeddings.model",
            format!(
                "unsupported model '{}' (supported: {}, minilm-l12, bge-small, multilingual)",
                other, DEFAULT_FASTEMBED_MODEL
            ),
        )),
    }
}

fn read_env(name: &'static str) -> Result<Option<String>> {
    match env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => Ok(Some(raw.trim().to_string())),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(EngineError::invalid_argument(
            name,
            "value is not valid unicode",
        )),
    }
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(EngineError::invalid_argument(
            name,
            format!("expected a boolean, got '{}'", other),
        )),
    }
}
