//! The [`EmbeddingProvider`] trait and shared embedding types.

use async_trait::async_trait;

use crate::error::Result;

/// Longest text, in characters, that is sent to a provider. Longer inputs
/// are truncated after whitespace normalization.
pub const MAX_EMBED_CHARS: usize = 512;

/// Result of embedding a batch of texts.
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// One vector per input text, in input order.
    pub embeddings: Vec<Vec<f32>>,
    /// Dimension of every vector in `embeddings`.
    pub dimension: usize,
}

impl EmbeddingResult {
    pub fn new(embeddings: Vec<Vec<f32>>, dimension: usize) -> Self {
        Self {
            embeddings,
            dimension,
        }
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Trait for text embedding providers.
///
/// Implementations are shared across the indexing pipeline and query path,
/// so they must be `Send + Sync`.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, preserving input order.
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    /// Dimension of the vectors this provider produces.
    fn embedding_dimension(&self) -> usize;

    /// Human-readable provider name for logs and answer metadata.
    fn provider_name(&self) -> &str;
}

/// Normalize text before embedding: trim, collapse whitespace runs to a
/// single space, and cap the length at [`MAX_EMBED_CHARS`].
pub fn preprocess_text(text: &str) -> String {
    let collapsed: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_EMBED_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preprocess_collapses_whitespace() {
        assert_eq!(preprocess_text("  a \n\n b\t c  "), "a b c");
        assert_eq!(preprocess_text(""), "");
    }

    #[test]
    fn preprocess_caps_length_in_chars() {
        let long = "字".repeat(2 * MAX_EMBED_CHARS);
        let out = preprocess_text(&long);
        assert_eq!(out.chars().count(), MAX_EMBED_CHARS);
    }
}
