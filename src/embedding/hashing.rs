// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic feature-hashing embedder.
//!
//! No model files, no network: each lowercased word token is hashed into one
//! signed bucket and the bag is L2 normalized. Texts sharing words get a
//! positive cosine similarity, texts with disjoint vocabularies land near 0.

use once_cell::sync::Lazy;
use regex::Regex;

use super::provider::{l2_normalize, EmbeddingProvider};
use crate::errors::Result;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("valid regex"));

/// Feature-hashing embedder with a fixed output dimension.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    model_id: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            model_id: format!("hashing-{}", dimension),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embeds one text without going through the provider trait.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            let (bucket, sign) = self.bucket(&token);
            vector[bucket] += sign;
        }
        l2_normalize(&mut vector);
        vector
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let hash = blake3::hash(token.as_bytes());
        let bytes = hash.as_bytes();
        let mut index = [0u8; 8];
        index.copy_from_slice(&bytes[..8]);
        let bucket = (u64::from_le_bytes(index) % self.dimension as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        (bucket, sign)
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    TOKEN_RE
        .find_iter(text)
        .map(|token| token.as_str().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_deterministic() {
        let mut first = HashingEmbedder::new(384);
        let mut second = HashingEmbedder::new(384);
        let a = first.embed("python programming").unwrap();
        let b = first.embed("python programming").unwrap();
        let c = second.embed("python programming").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.len(), 384);
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let embedder = HashingEmbedder::new(128);
        assert_eq!(
            embedder.vector_for("Python (programming)"),
            embedder.vector_for("python programming")
        );
    }

    #[test]
    fn test_unit_norm() {
        let embedder = HashingEmbedder::new(256);
        let v = embedder.vector_for("manage kitchen staff");
        assert!((dot(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(16);
        assert!(embedder.vector_for("  ...  ").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_shared_words_score_higher() {
        let embedder = HashingEmbedder::new(1024);
        let query = embedder.vector_for("python programming");
        let close = embedder.vector_for("Python (programming language)");
        let identical = embedder.vector_for("programming python");
        assert!((dot(&query, &identical) - 1.0).abs() < 1e-5);
        assert!(dot(&query, &close) > 0.5);
    }
}
