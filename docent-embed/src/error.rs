use thiserror::Error;

/// Errors that can occur while producing embeddings.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// Provider configuration was invalid.
    #[error("invalid embedding config: {message}")]
    InvalidConfig { message: String },

    /// The HTTP request itself failed (connect, timeout, TLS).
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("embedding endpoint returned {status}: {snippet}")]
    Api { status: u16, snippet: String },

    /// The response body could not be interpreted.
    #[error("failed to decode embedding response: {message}")]
    Decode { message: String },

    /// The provider returned no vectors for a non-empty request.
    #[error("embedding provider returned an empty result")]
    EmptyResult,
}

impl EmbedError {
    /// Create an invalid-config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedError>;
