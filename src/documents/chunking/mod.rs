
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{RagError, Result};

/// Configuration for positional chunking
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window length in characters
    pub chunk_size: usize,
    /// Characters shared between a chunk and its predecessor
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl ChunkingConfig {
    /// Create a validated chunking configuration
    #[inline]
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self {
            chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.overlap >= self.chunk_size {
            return Err(RagError::InvalidChunking {
                chunk_size: self.chunk_size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }

    /// Distance between the start offsets of consecutive chunks
    #[inline]
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Number of chunks `chunk_text` produces for a non-blank text of `len` characters
    #[inline]
    pub fn expected_chunks(&self, len: usize) -> usize {
        if len == 0 {
            0
        } else if len <= self.chunk_size {
            1
        } else {
            (len - self.overlap).div_ceil(self.step())
        }
    }
}

/// Split `text` into windows of `chunk_size` characters, each overlapping its
/// predecessor by `overlap` characters.
///
/// Offsets count `char`s, never bytes. Blank input yields no chunks. The last
/// window ends at the end of the text and may be shorter than `chunk_size`.
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<String>> {
    config.validate()?;

    if text.trim().is_empty() {
        debug!("Skipping blank document");
        return Ok(Vec::new());
    }

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut chunks = Vec::with_capacity(config.expected_chunks(len));
    let mut offset = 0;

    loop {
        let end = (offset + config.chunk_size).min(len);
        chunks.push(chars[offset..end].iter().collect::<String>());
        if end >= len {
            break;
        }
        offset += config.step();
    }

    debug!(
        "Split {} characters into {} chunks (size {}, overlap {})",
        len,
        chunks.len(),
        config.chunk_size,
        config.overlap
    );

    Ok(chunks)
}
