//! Provider for a local Ollama daemon (`/api/generate`).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::LlmError;
use crate::provider::{GenerateOptions, Generation, LlmProvider, TokenUsage};

const BODY_SNIPPET_LEN: usize = 240;

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Daemon root, e.g. `http://localhost:11434`.
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl OllamaConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            timeout: Duration::from_secs(240),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

pub struct OllamaProvider {
    client: reqwest::Client,
    config: OllamaConfig,
    url_generate: String,
    url_tags: String,
}

impl OllamaProvider {
    pub fn new(config: OllamaConfig) -> Result<Self, LlmError> {
        let base = config.base_url.trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(LlmError::InvalidEndpoint(config.base_url.clone()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            url_generate: format!("{base}/api/generate"),
            url_tags: format!("{base}/api/tags"),
            client,
            config,
        })
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    #[instrument(skip_all, fields(provider = self.name(), model = %self.config.model))]
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<Generation, LlmError> {
        let body = OllamaRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: OllamaOptions {
                num_predict: options.max_tokens,
                temperature: options.temperature,
            },
        };
        let resp = self
            .client
            .post(&self.url_generate)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                snippet: text.chars().take(BODY_SNIPPET_LEN).collect(),
            });
        }
        let parsed: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        let text = parsed.response.trim().to_string();
        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        let usage = match (parsed.prompt_eval_count, parsed.eval_count) {
            (None, None) => None,
            (p, c) => {
                let prompt_tokens = p.unwrap_or(0);
                let completion_tokens = c.unwrap_or(0);
                Some(TokenUsage {
                    prompt_tokens,
                    completion_tokens,
                    total_tokens: prompt_tokens + completion_tokens,
                })
            }
        };
        Ok(Generation {
            text,
            model: parsed.model.unwrap_or_else(|| self.config.model.clone()),
            usage,
        })
    }

    async fn check(&self) -> Result<(), LlmError> {
        let resp = self.client.get(&self.url_tags).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                snippet: text.chars().take(BODY_SNIPPET_LEN).collect(),
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
