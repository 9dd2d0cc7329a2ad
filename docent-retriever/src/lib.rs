//! Semantic retrieval: chunk storage, vector indexing, and index maintenance.
//!
//! This crate owns everything between chunked text and ranked search results:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      IndexingPipeline                      │
//! │  chunks ──► EmbeddingProvider ──► VectorIndex.add()        │
//! │  query  ──► EmbeddingProvider ──► VectorIndex.search() ──► │
//! │                                   ChunkStore join ──► hits │
//! └──────────────┬─────────────────────────┬───────────────────┘
//!                │                         │
//!        ┌───────▼────────┐       ┌────────▼────────┐
//!        │   ChunkStore   │       │   VectorIndex   │
//!        │ (SQLite, sqlx) │       │ (linear cosine, │
//!        │                │       │  JSON snapshot) │
//!        └────────────────┘       └─────────────────┘
//!                ▲
//!        ┌───────┴────────┐
//!        │RebuildScheduler│  debounced, rate-limited full rebuilds
//!        └────────────────┘
//! ```
//!
//! The index is an exact linear-scan cosine store by contract: `add`,
//! `search`, `remove` and `rebuild` are stable seams behind which an
//! approximate index could be swapped later without touching callers.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use docent_embed::HashedEmbeddingProvider;
//! use docent_retriever::{
//!     ChunkStore, FileSnapshotStore, IndexingPipeline, SearchOptions, VectorIndex,
//! };
//!
//! # async fn example() -> docent_retriever::Result<()> {
//! let chunks = ChunkStore::open_memory().await?;
//! let snapshots = Arc::new(FileSnapshotStore::new("index.json"));
//! let index = Arc::new(VectorIndex::open(snapshots).await);
//! let embedder = Arc::new(HashedEmbeddingProvider::new(256));
//! let pipeline = IndexingPipeline::new(embedder, index, chunks);
//!
//! let hits = pipeline.search("how do I reset my password", &SearchOptions::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod index;
pub mod pipeline;
pub mod scheduler;
pub mod snapshot;
pub mod store;

pub use error::{Result, RetrieverError};
pub use index::{AddOutcome, IndexStats, SearchHit, VectorIndex, cosine_similarity};
pub use pipeline::{IndexOutcome, IndexingPipeline, RankedResult, SearchOptions};
pub use scheduler::{RebuildScheduler, RebuildTarget, SchedulerConfig};
pub use snapshot::{FileSnapshotStore, IndexSnapshot, SnapshotError, SnapshotStore, VectorEntry};
pub use store::{ChunkRecord, ChunkStore, DocumentRecord, DocumentStatus, StoreStats};
