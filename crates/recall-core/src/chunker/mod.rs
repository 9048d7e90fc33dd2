//! Sentence-aware document chunking with overlap.
//!
//! Text is whitespace-normalized, split into sentences and greedily packed
//! into chunks of at most [`ChunkerConfig::chunk_size`] characters. Each new
//! chunk is seeded with the tail of the previous one, trimmed forward to a
//! word boundary. A sentence longer than the chunk size becomes its own
//! oversized chunk rather than being cut mid-sentence.

mod sentence;
mod tokens;

use std::ops::Range;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
pub use tokens::{estimate_tokens, is_cjk};

use crate::model::content_hash;
use crate::{Error, Result, TRACING_TARGET_CHUNKER};

/// Default maximum chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 512;

/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Configuration for the [`Chunker`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct ChunkerConfig {
    /// Maximum chunk length in characters
    #[cfg_attr(
        feature = "config",
        arg(long = "chunk-size", env = "CHUNK_SIZE", default_value = "512")
    )]
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters carried over from the end of the previous chunk
    #[cfg_attr(
        feature = "config",
        arg(long = "chunk-overlap", env = "CHUNK_OVERLAP", default_value = "50")
    )]
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkerConfig {
    /// Creates a configuration with the given size and overlap.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Sets the maximum chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the overlap.
    #[must_use]
    pub fn with_chunk_overlap(mut self, chunk_overlap: usize) -> Self {
        self.chunk_overlap = chunk_overlap;
        self
    }

    /// Validates that the size is positive and larger than the overlap.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::invalid_config("chunk_size must be positive"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::invalid_config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// A contiguous slice of a document's normalized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Ordinal position within the document.
    pub index: usize,
    pub content: String,
    /// Character offset of the first chunk character in the original text.
    pub start_offset: usize,
    /// Character offset one past the last chunk character in the original text.
    pub end_offset: usize,
    pub token_count: usize,
    /// Hex SHA-256 of `content`.
    pub content_hash: String,
}

/// Whitespace-normalized text with a map back to original character offsets.
struct Normalized {
    chars: Vec<char>,
    origin: Vec<usize>,
}

impl Normalized {
    fn new(text: &str) -> Self {
        let mut chars = Vec::with_capacity(text.len());
        let mut origin = Vec::with_capacity(text.len());
        let mut pending_space = None;

        for (i, c) in text.chars().enumerate() {
            if c.is_whitespace() {
                if !chars.is_empty() && pending_space.is_none() {
                    pending_space = Some(i);
                }
                continue;
            }
            if let Some(pos) = pending_space.take() {
                chars.push(' ');
                origin.push(pos);
            }
            chars.push(c);
            origin.push(i);
        }

        Self { chars, origin }
    }
}

/// Splits document text into overlapping chunks.
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Creates a chunker, validating the configuration.
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the chunker configuration.
    #[inline]
    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Collapses whitespace runs to single spaces and trims both ends.
    pub fn normalize(text: &str) -> String {
        Normalized::new(text).chars.into_iter().collect()
    }

    /// Splits `text` on sentence boundaries into chunks.
    ///
    /// Fails with [`Error::EmptyContent`] if nothing remains after
    /// normalization.
    pub fn chunk_document(&self, text: &str) -> Result<Vec<Chunk>> {
        let norm = Normalized::new(text);
        if norm.chars.is_empty() {
            return Err(Error::EmptyContent);
        }

        let size = self.config.chunk_size;
        let mut ranges: Vec<Range<usize>> = Vec::new();
        let mut current: Option<Range<usize>> = None;

        for sentence in sentence::split_sentences(&norm.chars) {
            let next = match current.take() {
                None => sentence,
                Some(open) if sentence.end - open.start <= size => open.start..sentence.end,
                Some(closed) => {
                    let seed = self
                        .overlap_start(&norm.chars, &closed)
                        .filter(|&tail| sentence.end - tail <= size)
                        .unwrap_or(sentence.start);
                    ranges.push(closed);
                    seed..sentence.end
                }
            };
            current = Some(next);
        }
        ranges.extend(current);

        let chunks = self.build_chunks(&norm, ranges);
        tracing::debug!(
            target: TRACING_TARGET_CHUNKER,
            chars = norm.chars.len(),
            chunks = chunks.len(),
            chunk_size = size,
            "Chunked document by sentence"
        );
        Ok(chunks)
    }

    /// Slices `text` by raw character count, ignoring sentence boundaries.
    ///
    /// Used for content without sentence structure. Overlap follows the same
    /// word-boundary rule as [`Chunker::chunk_document`].
    pub fn chunk_by_fixed_size(&self, text: &str) -> Result<Vec<Chunk>> {
        let norm = Normalized::new(text);
        if norm.chars.is_empty() {
            return Err(Error::EmptyContent);
        }

        let len = norm.chars.len();
        let size = self.config.chunk_size;
        let mut ranges = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + size).min(len);
            ranges.push(start..end);
            if end >= len {
                break;
            }

            let mut next = self
                .overlap_start(&norm.chars, &(start..end))
                .filter(|&tail| tail > start)
                .unwrap_or(end);
            while next < len && norm.chars[next].is_whitespace() {
                next += 1;
            }
            start = next;
        }

        let chunks = self.build_chunks(&norm, ranges);
        tracing::debug!(
            target: TRACING_TARGET_CHUNKER,
            chars = len,
            chunks = chunks.len(),
            chunk_size = size,
            "Chunked document by fixed size"
        );
        Ok(chunks)
    }

    /// Start of the overlap tail of `chunk`, moved forward to a word start.
    fn overlap_start(&self, chars: &[char], chunk: &Range<usize>) -> Option<usize> {
        let overlap = self.config.chunk_overlap;
        if overlap == 0 || chunk.is_empty() {
            return None;
        }

        let mut tail = chunk.end.saturating_sub(overlap).max(chunk.start);
        if tail > chunk.start && !chars[tail - 1].is_whitespace() {
            tail = (tail..chunk.end).find(|&i| chars[i].is_whitespace())? + 1;
        }
        while tail < chunk.end && chars[tail].is_whitespace() {
            tail += 1;
        }

        (tail < chunk.end).then_some(tail)
    }

    fn build_chunks(&self, norm: &Normalized, ranges: Vec<Range<usize>>) -> Vec<Chunk> {
        ranges
            .into_iter()
            .enumerate()
            .map(|(index, range)| {
                let content: String = norm.chars[range.clone()].iter().collect();
                Chunk {
                    index,
                    start_offset: norm.origin[range.start],
                    end_offset: norm.origin[range.end - 1] + 1,
                    token_count: estimate_tokens(&content),
                    content_hash: content_hash(&content),
                    content,
                }
            })
            .collect()
    }
}
