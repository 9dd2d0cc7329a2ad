//! Text chunking for document indexing.
//!
//! Splits long documents into overlapping chunks suitable for embedding,
//! preferring natural sentence/paragraph boundaries over hard cuts. All
//! offsets are character offsets into the original text, so callers can map
//! chunks back to their source regardless of encoding width.
//!
//! # Quick Start
//!
//! ```
//! use docent_chunk::{SplitterConfig, TextSplitter};
//!
//! let splitter = TextSplitter::new(SplitterConfig::default()).unwrap();
//! let chunks = splitter.split("First paragraph.\n\nSecond paragraph.");
//! assert_eq!(chunks.len(), 1); // short input stays whole
//! assert!(chunks[0].is_complete);
//! ```

pub mod splitter;

pub use splitter::{
    DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_SEPARATORS, SplitterConfig,
    SplitterConfigError, TextChunk, TextSplitter,
};
