//! HTTP embedding provider for OpenAI-compatible `/embeddings` endpoints.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult, preprocess_text};

const BODY_SNIPPET_LEN: usize = 240;

/// Configuration for [`HttpEmbeddingProvider`].
#[derive(Debug, Clone)]
pub struct HttpEmbedConfig {
    /// Base URL, e.g. `http://localhost:11434/v1`.
    pub base_url: String,
    /// Model name sent with every request.
    pub model: String,
    /// Dimension of the vectors the model produces.
    pub dimension: usize,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl HttpEmbedConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            dimension,
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Embedding provider backed by an OpenAI-compatible HTTP endpoint.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    config: HttpEmbedConfig,
    url: String,
}

impl HttpEmbeddingProvider {
    pub fn new(config: HttpEmbedConfig) -> Result<Self> {
        let base = config.base_url.trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(EmbedError::invalid_config(format!(
                "base_url must start with http:// or https://, got '{}'",
                config.base_url
            )));
        }
        if config.model.trim().is_empty() {
            return Err(EmbedError::invalid_config("model must not be empty"));
        }
        if config.dimension == 0 {
            return Err(EmbedError::invalid_config("dimension must be at least 1"));
        }
        let url = format!("{base}/embeddings");
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            config,
            url,
        })
    }

    #[instrument(skip_all, fields(model = %self.config.model, inputs = texts.len()))]
    async fn request(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingsRequest {
            model: &self.config.model,
            input: texts,
        };
        let mut req = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(BODY_SNIPPET_LEN).collect();
            return Err(EmbedError::Api {
                status: status.as_u16(),
                snippet,
            });
        }
        let parsed: EmbeddingsResponse = resp
            .json()
            .await
            .map_err(|e| EmbedError::decode(e.to_string()))?;
        if parsed.data.is_empty() {
            return Err(EmbedError::EmptyResult);
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self.request(vec![preprocess_text(text)]).await?;
        vectors.into_iter().next().ok_or(EmbedError::EmptyResult)
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Err(EmbedError::EmptyResult);
        }
        let inputs: Vec<String> = texts.iter().map(|t| preprocess_text(t)).collect();
        let embeddings = self.request(inputs).await?;
        if embeddings.len() != texts.len() {
            return Err(EmbedError::decode(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        Ok(EmbeddingResult::new(embeddings, self.config.dimension))
    }

    fn embedding_dimension(&self) -> usize {
        self.config.dimension
    }

    fn provider_name(&self) -> &str {
        "http"
    }
}
