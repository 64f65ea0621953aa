use std::iter::FusedIterator;

use pdfqa_core::config::PdfqaConfig;
use pdfqa_core::error::AppError;

/// Window size and overlap for fixed-size character chunking.
///
/// Sizes count `char`s, so a chunk never ends inside a UTF-8 sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpec {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkSpec {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, AppError> {
        if chunk_size == 0 {
            return Err(AppError::new(
                "CHUNK_CONFIG_INVALID",
                "chunk_size must be greater than zero",
            ));
        }
        if overlap >= chunk_size {
            return Err(AppError::new(
                "CHUNK_CONFIG_INVALID",
                "overlap must be smaller than chunk_size",
            )
            .with_details(format!("chunk_size={chunk_size}; overlap={overlap}")));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn from_config(config: &PdfqaConfig) -> Result<Self, AppError> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Lazily split `text`. Calling this again (or cloning the iterator)
    /// restarts from the beginning.
    pub fn split<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            text,
            next_start: Some(0),
            spec: *self,
        }
    }
}

/// Convenience wrapper over [`ChunkSpec::new`] + [`ChunkSpec::split`].
pub fn split(text: &str, chunk_size: usize, overlap: usize) -> Result<Chunks<'_>, AppError> {
    Ok(ChunkSpec::new(chunk_size, overlap)?.split(text))
}

#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    // Byte offset of the next chunk; `None` once the end has been emitted.
    next_start: Option<usize>,
    spec: ChunkSpec,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let start = self.next_start?;
        let rest = &self.text[start..];
        if rest.is_empty() {
            self.next_start = None;
            return None;
        }

        let end = start + byte_offset_after_chars(rest, self.spec.chunk_size);
        if end >= self.text.len() {
            self.next_start = None;
        } else {
            let step = self.spec.chunk_size - self.spec.overlap;
            self.next_start = Some(start + byte_offset_after_chars(rest, step));
        }
        Some(&self.text[start..end])
    }
}

impl FusedIterator for Chunks<'_> {}

fn byte_offset_after_chars(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}
