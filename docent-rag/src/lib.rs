//! Retrieval-augmented question answering.
//!
//! Ties the retrieval pipeline to a chain of language-model providers:
//! retrieve the most relevant chunks for a question, render them into a
//! grounded prompt, and request an answer from the active provider, falling
//! back once to the next provider in line when the call fails.
//!
//! Providers implement the [`LlmProvider`] capability trait; two HTTP
//! implementations ship here ([`OpenAiCompatProvider`] for
//! OpenAI-compatible `/chat/completions` endpoints, [`OllamaProvider`] for
//! a local Ollama daemon).

pub mod chain;
pub mod engine;
pub mod error;
pub mod ollama;
pub mod openai;
pub mod prompt;
pub mod provider;

pub use chain::ProviderChain;
pub use engine::{
    AnswerMetadata, AskOptions, BatchItem, RagAnswer, RagConfig, RagEngine, SourceChunk,
};
pub use error::{LlmError, RagError, Result};
pub use ollama::{OllamaConfig, OllamaProvider};
pub use openai::{OpenAiCompatProvider, OpenAiConfig};
pub use prompt::build_prompt;
pub use provider::{GenerateOptions, Generation, LlmProvider, TokenUsage};
