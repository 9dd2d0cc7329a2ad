//! Embedding providers for semantic indexing.
//!
//! This crate defines the [`EmbeddingProvider`] trait used by the retrieval
//! pipeline, plus two implementations:
//!
//! - [`HttpEmbeddingProvider`]: calls an OpenAI-compatible `/embeddings`
//!   endpoint over HTTP.
//! - [`HashedEmbeddingProvider`]: deterministic, offline, hash-based
//!   vectors. Useful in tests and anywhere network access is unavailable.
//!
//! # Quick Start
//!
//! ```
//! use docent_embed::{EmbeddingProvider, HashedEmbeddingProvider};
//!
//! # tokio_test::block_on(async {
//! let provider = HashedEmbeddingProvider::new(64);
//! let vector = provider.embed_text("hello world").await.unwrap();
//! assert_eq!(vector.len(), 64);
//! # });
//! ```

pub mod error;
pub mod hashed;
pub mod http;
pub mod provider;

pub use error::{EmbedError, Result};
pub use hashed::HashedEmbeddingProvider;
pub use http::{HttpEmbedConfig, HttpEmbeddingProvider};
pub use provider::{EmbeddingProvider, EmbeddingResult, preprocess_text};
