//! The RAG engine: validate, retrieve, prompt, generate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use docent_retriever::{IndexingPipeline, SearchOptions};
use tracing::{info, warn};

use crate::chain::ProviderChain;
use crate::error::{RagError, Result};
use crate::prompt::build_prompt;
use crate::provider::{GenerateOptions, TokenUsage};

/// Engine-level limits and defaults.
#[derive(Debug, Clone)]
pub struct RagConfig {
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub default_threshold: f32,
    /// Maximum question length in characters.
    pub max_question_chars: usize,
    pub default_max_tokens: u32,
    pub max_tokens_cap: u32,
    pub default_temperature: f32,
    /// Pause between questions in [`RagEngine::batch_ask`], to stay inside
    /// provider rate limits.
    pub batch_pause: Duration,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            max_top_k: 20,
            default_threshold: 0.3,
            max_question_chars: 1000,
            default_max_tokens: 2048,
            max_tokens_cap: 4096,
            default_temperature: 0.7,
            batch_pause: Duration::from_secs(1),
        }
    }
}

impl RagConfig {
    pub fn with_batch_pause(mut self, pause: Duration) -> Self {
        self.batch_pause = pause;
        self
    }

    pub fn with_max_question_chars(mut self, max: usize) -> Self {
        self.max_question_chars = max;
        self
    }
}

/// Per-call overrides; unset fields fall back to [`RagConfig`] defaults and
/// are clamped to its limits.
#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    pub top_k: Option<usize>,
    pub threshold: Option<f32>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub document_ids: Option<Vec<String>>,
}

/// A retrieved chunk as cited in an answer.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub document_name: String,
    pub chunk_index: i64,
    pub similarity: f32,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerMetadata {
    pub search_ms: u64,
    pub generation_ms: u64,
    pub total_ms: u64,
    /// Name of the provider that produced the answer (the fallback's name
    /// when the primary failed).
    pub provider: String,
    pub model: String,
    pub usage: Option<TokenUsage>,
    pub retrieved: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RagAnswer {
    pub question: String,
    pub answer: String,
    pub sources: Vec<SourceChunk>,
    pub metadata: AnswerMetadata,
}

/// One entry of a [`RagEngine::batch_ask`] result. Failures are captured
/// per question so one bad question never aborts the batch.
#[derive(Debug)]
pub struct BatchItem {
    pub question: String,
    pub result: std::result::Result<RagAnswer, String>,
}

pub struct RagEngine {
    pipeline: Arc<IndexingPipeline>,
    chain: ProviderChain,
    config: RagConfig,
}

impl RagEngine {
    pub fn new(pipeline: Arc<IndexingPipeline>, chain: ProviderChain) -> Self {
        Self::with_config(pipeline, chain, RagConfig::default())
    }

    pub fn with_config(
        pipeline: Arc<IndexingPipeline>,
        chain: ProviderChain,
        config: RagConfig,
    ) -> Self {
        Self {
            pipeline,
            chain,
            config,
        }
    }

    /// Answer `question` grounded in the indexed documents.
    ///
    /// Validation happens before any retrieval or provider call; a search
    /// that finds nothing still produces an answer, with the prompt stating
    /// explicitly that no supporting documents exist.
    pub async fn ask(&self, question: &str, options: &AskOptions) -> Result<RagAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::InvalidInput("question must not be empty".into()));
        }
        let chars = question.chars().count();
        if chars > self.config.max_question_chars {
            return Err(RagError::InvalidInput(format!(
                "question is {chars} characters, limit is {}",
                self.config.max_question_chars
            )));
        }

        let top_k = options
            .top_k
            .unwrap_or(self.config.default_top_k)
            .clamp(1, self.config.max_top_k);
        let threshold = options
            .threshold
            .unwrap_or(self.config.default_threshold)
            .clamp(0.0, 1.0);
        let generate_options = GenerateOptions {
            max_tokens: options
                .max_tokens
                .unwrap_or(self.config.default_max_tokens)
                .min(self.config.max_tokens_cap),
            temperature: options
                .temperature
                .unwrap_or(self.config.default_temperature)
                .clamp(0.0, 2.0),
        };

        let started = Instant::now();
        let search_options = SearchOptions {
            top_k,
            threshold: Some(threshold),
            document_ids: options.document_ids.clone(),
        };
        let retrieved = self.pipeline.search(question, &search_options).await?;
        let search_ms = started.elapsed().as_millis() as u64;

        let prompt = build_prompt(question, &retrieved);
        let generation_started = Instant::now();
        let (generation, provider) = self.chain.generate(&prompt, &generate_options).await?;
        let generation_ms = generation_started.elapsed().as_millis() as u64;

        info!(
            provider = %provider,
            retrieved = retrieved.len(),
            search_ms,
            generation_ms,
            "question answered"
        );

        let sources: Vec<SourceChunk> = retrieved
            .into_iter()
            .map(|r| SourceChunk {
                chunk_id: r.chunk_id,
                document_id: r.document_id,
                document_name: r.document_name,
                chunk_index: r.chunk_index,
                similarity: r.similarity,
                content: r.content,
            })
            .collect();
        Ok(RagAnswer {
            question: question.to_string(),
            answer: generation.text,
            metadata: AnswerMetadata {
                search_ms,
                generation_ms,
                total_ms: started.elapsed().as_millis() as u64,
                provider,
                model: generation.model,
                usage: generation.usage,
                retrieved: sources.len(),
            },
            sources,
        })
    }

    /// Answer a list of questions strictly sequentially, pausing between
    /// them. Per-question failures are recorded in the returned items.
    pub async fn batch_ask(&self, questions: &[String], options: &AskOptions) -> Vec<BatchItem> {
        let mut items = Vec::with_capacity(questions.len());
        for (i, question) in questions.iter().enumerate() {
            let result = self.ask(question, options).await.map_err(|e| e.to_string());
            if let Err(e) = &result {
                warn!(question = %question, error = %e, "batch question failed");
            }
            items.push(BatchItem {
                question: question.clone(),
                result,
            });
            if i + 1 < questions.len() {
                tokio::time::sleep(self.config.batch_pause).await;
            }
        }
        items
    }
}
