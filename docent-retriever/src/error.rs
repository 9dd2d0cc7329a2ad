use docent_embed::EmbedError;
use thiserror::Error;

use crate::snapshot::SnapshotError;

/// Errors surfaced by the retrieval layer.
#[derive(Debug, Error)]
pub enum RetrieverError {
    /// Caller-supplied parameters were rejected before any work happened.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A query vector did not match the index's locked dimension.
    #[error("dimension mismatch: index holds {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The embedding provider failed.
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    /// The chunk store failed.
    #[error("chunk store error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Persisting or loading the index snapshot failed. Fatal for the
    /// operation in progress; in-memory state stays valid and the next
    /// rebuild repairs the snapshot.
    #[error("snapshot persistence failed: {0}")]
    Persistence(#[from] SnapshotError),
}

pub type Result<T> = std::result::Result<T, RetrieverError>;
