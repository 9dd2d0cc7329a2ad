//! Separator-priority text splitter.
//!
//! The splitter walks the input with a window of `chunk_size` characters and
//! cuts each chunk at the best boundary inside the window: the last occurrence
//! of the highest-priority separator, falling back to the last whitespace, and
//! finally to a hard cut at the window edge. Consecutive chunks overlap by up
//! to `chunk_overlap` characters so that sentences straddling a cut appear in
//! both neighbors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 300;
/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Split-point candidates in priority order. Paragraph breaks beat line
/// breaks, which beat CJK and ASCII sentence terminators.
pub const DEFAULT_SEPARATORS: &[&str] = &[
    "\n\n", "\n", "。", "！", "？", ";", "；", ".", "!", "?",
];

/// A separator cut is only accepted if the resulting chunk is at least this
/// fraction of `chunk_size`, so a boundary right next to the window start
/// does not produce a sliver.
const MIN_CHUNK_FRACTION: f64 = 0.3;

#[derive(Debug, Error)]
pub enum SplitterConfigError {
    #[error("chunk_size must be at least 1")]
    ZeroChunkSize,
    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({chunk_size})")]
    OverlapTooLarge { overlap: usize, chunk_size: usize },
}

/// Configuration for [`TextSplitter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Boundary candidates in priority order.
    pub separators: Vec<String>,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl SplitterConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_separators(mut self, separators: Vec<String>) -> Self {
        self.separators = separators;
        self
    }
}

/// One emitted chunk. `text` is trimmed; `start_offset..end_offset` is the
/// untrimmed character range it was cut from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Position of this chunk in the emission order, starting at 0.
    pub index: usize,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    /// True when this chunk reached the end of the input.
    pub is_complete: bool,
}

/// Splits text into overlapping chunks at natural boundaries.
pub struct TextSplitter {
    config: SplitterConfig,
    // Separators pre-decoded to char sequences so window scans stay O(chars).
    separators: Vec<Vec<char>>,
}

impl TextSplitter {
    pub fn new(config: SplitterConfig) -> Result<Self, SplitterConfigError> {
        if config.chunk_size == 0 {
            return Err(SplitterConfigError::ZeroChunkSize);
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(SplitterConfigError::OverlapTooLarge {
                overlap: config.chunk_overlap,
                chunk_size: config.chunk_size,
            });
        }
        let separators = config
            .separators
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.chars().collect())
            .collect();
        Ok(Self { config, separators })
    }

    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Split `text` into chunks.
    ///
    /// Empty or whitespace-only input yields no chunks. Input no longer than
    /// `chunk_size` yields a single complete chunk. Otherwise the emitted
    /// ranges cover the whole input and consecutive chunks overlap by at most
    /// `chunk_overlap` characters. Progress is forced by at least one
    /// character per step, so this terminates for any input.
    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();

        if len <= self.config.chunk_size {
            return vec![TextChunk {
                index: 0,
                text: text.trim().to_string(),
                start_offset: 0,
                end_offset: len,
                is_complete: true,
            }];
        }

        let mut chunks = Vec::new();
        let mut start = 0usize;
        while start < len {
            let window_end = (start + self.config.chunk_size).min(len);
            let end = if window_end >= len {
                len
            } else {
                self.find_cut(&chars, start, window_end)
            };

            let raw: String = chars[start..end].iter().collect();
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                chunks.push(TextChunk {
                    index: chunks.len(),
                    text: trimmed.to_string(),
                    start_offset: start,
                    end_offset: end,
                    is_complete: end >= len,
                });
            }

            if end >= len {
                break;
            }
            let next = end.saturating_sub(self.config.chunk_overlap).max(start + 1);
            if next >= len || next <= start {
                break;
            }
            start = next;
        }
        chunks
    }

    /// Best cut position in `(start, end]`, searched by separator priority.
    fn find_cut(&self, chars: &[char], start: usize, end: usize) -> usize {
        let min_len = self.config.chunk_size as f64 * MIN_CHUNK_FRACTION;
        for sep in &self.separators {
            if let Some(pos) = find_last(chars, start, end, sep) {
                let cut = pos + sep.len();
                if trimmed_len(&chars[start..cut]) as f64 >= min_len {
                    return cut;
                }
            }
        }
        // No usable separator: cut at the last whitespace in the window so we
        // at least avoid splitting a word.
        for i in (start + 1..end).rev() {
            if chars[i].is_whitespace() {
                return i;
            }
        }
        // Hard cut at the window edge; may split mid-word.
        end
    }
}

/// Start index of the last occurrence of `sep` that begins after `start` and
/// ends at or before `end`.
fn find_last(chars: &[char], start: usize, end: usize, sep: &[char]) -> Option<usize> {
    if sep.len() > end - start {
        return None;
    }
    for i in (start + 1..=end - sep.len()).rev() {
        if chars[i..i + sep.len()] == sep[..] {
            return Some(i);
        }
    }
    None
}

/// Character length of `slice` after trimming whitespace from both ends.
fn trimmed_len(slice: &[char]) -> usize {
    let Some(first) = slice.iter().position(|c| !c.is_whitespace()) else {
        return 0;
    };
    let Some(last) = slice.iter().rposition(|c| !c.is_whitespace()) else {
        return 0;
    };
    last - first + 1
}
