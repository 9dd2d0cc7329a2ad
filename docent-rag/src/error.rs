use thiserror::Error;

/// Errors from a single language-model provider call.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("invalid provider endpoint: {0}")]
    InvalidEndpoint(String),

    /// The HTTP request failed (connect, timeout, TLS).
    #[error("llm request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("llm endpoint returned {status}: {snippet}")]
    Api { status: u16, snippet: String },

    #[error("failed to decode llm response: {0}")]
    Decode(String),

    /// The provider answered successfully but with blank text. Reported
    /// distinctly so callers never mistake it for a real answer.
    #[error("llm returned an empty response")]
    EmptyResponse,
}

/// Errors surfaced by the RAG engine.
#[derive(Debug, Error)]
pub enum RagError {
    /// The question was rejected before any retrieval or provider call.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] docent_retriever::RetrieverError),

    /// Every attempted provider failed; carries the last provider's error.
    #[error("generation failed: {0}")]
    Generation(#[from] LlmError),
}

pub type Result<T> = std::result::Result<T, RagError>;
