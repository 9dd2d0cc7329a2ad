//! Deterministic hash-based embeddings.
//!
//! Not semantically meaningful, but stable: the same text always maps to the
//! same unit-length vector, and texts sharing tokens land near each other.
//! Used by tests and as an offline stand-in for a real model.

use std::hash::Hasher;

use async_trait::async_trait;
use fnv::FnvHasher;

use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult, preprocess_text};

/// Offline embedding provider that hashes tokens into a fixed-size vector.
#[derive(Debug, Clone)]
pub struct HashedEmbeddingProvider {
    dimension: usize,
}

impl HashedEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let normalized = preprocess_text(text);
        for token in normalized.split(' ').filter(|t| !t.is_empty()) {
            let mut hasher = FnvHasher::default();
            hasher.write(token.as_bytes());
            let hash = hasher.finish();
            let bucket = (hash % self.dimension as u64) as usize;
            // Sign bit from a higher hash bit keeps buckets from only growing.
            let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashedEmbeddingProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Err(EmbedError::EmptyResult);
        }
        let embeddings = texts.iter().map(|t| self.embed(t)).collect();
        Ok(EmbeddingResult::new(embeddings, self.dimension))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "hashed"
    }
}
