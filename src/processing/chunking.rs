//! Fixed-size token windows with overlap.
//!
//! Summarization models accept a bounded context, so documents are cut into windows of
//! `chunk_size` tokens where each window repeats the last `overlap` tokens of the previous
//! one. Window `i` starts at `i * step` with `step = chunk_size - overlap`; the final window
//! may be shorter. Windows borrow from the token slice and are produced lazily.

use super::types::ChunkingError;

/// Validated window geometry for the chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWindow {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkWindow {
    /// Validate window parameters; `overlap` must be strictly smaller than `chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkingError> {
        if overlap >= chunk_size {
            return Err(ChunkingError::InvalidConfiguration {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Tokens per window.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Tokens shared between adjacent windows.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between consecutive window starts. Always non-zero.
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Number of windows produced for a sequence of `len` tokens.
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.step())
    }

    /// Iterate the windows over `tokens`. A cloned iterator replays the remaining windows;
    /// calling this again starts over from the first one.
    pub fn chunks<'a, T>(&self, tokens: &'a [T]) -> TokenChunks<'a, T> {
        TokenChunks {
            tokens,
            chunk_size: self.chunk_size,
            step: self.step(),
            start: 0,
        }
    }
}

/// Lazy iterator over overlapping token windows.
#[derive(Debug, Clone)]
pub struct TokenChunks<'a, T> {
    tokens: &'a [T],
    chunk_size: usize,
    step: usize,
    start: usize,
}

impl<'a, T> Iterator for TokenChunks<'a, T> {
    type Item = &'a [T];

    fn next(&mut self) -> Option<Self::Item> {
        if self.start >= self.tokens.len() {
            return None;
        }
        let end = (self.start + self.chunk_size).min(self.tokens.len());
        let chunk = &self.tokens[self.start..end];
        self.start += self.step;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .tokens
            .len()
            .saturating_sub(self.start)
            .div_ceil(self.step);
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for TokenChunks<'_, T> {}

impl<T> std::iter::FusedIterator for TokenChunks<'_, T> {}
