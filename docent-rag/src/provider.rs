//! The [`LlmProvider`] capability trait and shared generation types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Sampling parameters forwarded to a provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerateOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.7,
        }
    }
}

/// Token accounting as reported by the provider, when it reports any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A successful completion.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    /// Trimmed answer text; guaranteed non-empty by providers.
    pub text: String,
    /// Model that actually served the request.
    pub model: String,
    pub usage: Option<TokenUsage>,
}

/// Capability interface for answer generation. One implementation per
/// backend; fallback is an ordered list of these tried in sequence.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for `prompt`. A blank completion must surface
    /// as [`LlmError::EmptyResponse`], never as success.
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<Generation, LlmError>;

    /// Cheap connectivity probe, for startup checks and health endpoints.
    async fn check(&self) -> Result<(), LlmError>;

    /// Stable name used in logs and answer metadata.
    fn name(&self) -> &str;
}
