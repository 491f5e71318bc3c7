//! Fixed-size text chunking
//!
//! Documents are split into windows of `chunk_chars` characters where each
//! window starts `overlap_chars` before the previous one ended. Offsets are
//! counted in characters (not bytes) so that multi-byte text is never split
//! inside a code point.

use crate::error::{Error, Result};
use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validated chunk length and overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkParams {
    chunk_chars: usize,
    overlap_chars: usize,
}

impl ChunkParams {
    /// Create chunk parameters, requiring `overlap_chars < chunk_chars`
    pub fn new(chunk_chars: usize, overlap_chars: usize) -> Result<Self> {
        if chunk_chars == 0 {
            return Err(Error::Config(
                "chunk.chunk_chars must be positive".to_string(),
            ));
        }
        if overlap_chars >= chunk_chars {
            return Err(Error::Config(format!(
                "chunk.overlap_chars ({}) must be smaller than chunk.chunk_chars ({})",
                overlap_chars, chunk_chars
            )));
        }
        Ok(Self {
            chunk_chars,
            overlap_chars,
        })
    }

    pub fn chunk_chars(&self) -> usize {
        self.chunk_chars
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }

    /// Number of chunks produced for a text of `len` characters
    pub fn expected_chunks(&self, len: usize) -> usize {
        if len == 0 {
            0
        } else if len <= self.chunk_chars {
            1
        } else {
            let stride = self.chunk_chars - self.overlap_chars;
            (len - self.overlap_chars).div_ceil(stride)
        }
    }
}

impl fmt::Display for ChunkParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunk_chars={}, overlap_chars={}",
            self.chunk_chars, self.overlap_chars
        )
    }
}

/// A text chunk with its position in the parent document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Chunk index (0-based)
    pub index: usize,

    /// Character start position in the document (inclusive)
    pub char_start: usize,

    /// Character end position in the document (exclusive)
    pub char_end: usize,

    /// The chunk text
    pub text: String,

    /// Blake3 hash of the chunk text
    pub hash: String,
}

/// Split text into overlapping fixed-size chunks
///
/// Chunk `i + 1` starts at `end_i - overlap`. The final chunk may be shorter
/// than `chunk_chars`; empty text produces no chunks.
pub fn chunk_text(text: &str, params: &ChunkParams) -> Vec<TextChunk> {
    let offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let total = offsets.len();
    let byte_at = |c: usize| if c == total { text.len() } else { offsets[c] };

    let mut chunks = Vec::with_capacity(params.expected_chunks(total));
    let mut start = 0;

    while start < total {
        let end = (start + params.chunk_chars).min(total);
        let slice = &text[byte_at(start)..byte_at(end)];

        chunks.push(TextChunk {
            index: chunks.len(),
            char_start: start,
            char_end: end,
            text: slice.to_string(),
            hash: compute_text_hash(slice),
        });

        if end == total {
            break;
        }
        start = end - params.overlap_chars;
    }

    chunks
}

/// Compute a stable hash for document content
pub fn compute_content_hash(content: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(content);
    hasher.finalize().to_hex().to_string()
}

/// Compute a stable hash for a string
pub fn compute_text_hash(text: &str) -> String {
    compute_content_hash(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(len: usize, overlap: usize) -> ChunkParams {
        ChunkParams::new(len, overlap).unwrap()
    }

    #[test]
    fn test_overlap_must_be_smaller() {
        assert!(ChunkParams::new(100, 100).is_err());
        assert!(ChunkParams::new(100, 150).is_err());
        assert!(ChunkParams::new(0, 0).is_err());
        assert!(ChunkParams::new(100, 0).is_ok());
    }

    #[test]
    fn test_250_chars_with_100_and_20() {
        let text = "a".repeat(250);
        let chunks = chunk_text(&text, &params(100, 20));

        let spans: Vec<(usize, usize)> =
            chunks.iter().map(|c| (c.char_start, c.char_end)).collect();
        assert_eq!(spans, vec![(0, 100), (80, 180), (160, 250)]);
        assert_eq!(chunks[2].text.len(), 90);
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("hello world", &params(100, 20));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello world");
        assert_eq!(chunks[0].char_end, 11);

        let exact = "x".repeat(100);
        assert_eq!(chunk_text(&exact, &params(100, 20)).len(), 1);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(chunk_text("", &params(100, 20)).is_empty());
    }

    #[test]
    fn test_chunk_count_formula() {
        let cases = [
            (250, 100, 20),
            (181, 100, 20),
            (180, 100, 20),
            (1000, 7, 3),
            (5000, 1000, 200),
        ];
        for (len, size, overlap) in cases {
            let text = "z".repeat(len);
            let p = params(size, overlap);
            assert_eq!(chunk_text(&text, &p).len(), p.expected_chunks(len), "len={}", len);
        }
        assert_eq!(params(100, 20).expected_chunks(180), 2);
    }

    #[test]
    fn test_chunks_cover_text_without_gaps() {
        let text: String = (0..537).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let p = params(64, 16);
        let chunks = chunk_text(&text, &p);

        assert_eq!(chunks[0].char_start, 0);
        assert_eq!(chunks.last().unwrap().char_end, 537);
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].char_start, pair[0].char_end - 16);
            assert!(pair[1].char_start < pair[0].char_end);
        }
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }

    #[test]
    fn test_multibyte_offsets_are_chars() {
        let text = "é".repeat(30);
        let chunks = chunk_text(&text, &params(20, 5));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text.chars().count(), 20);
        assert_eq!((chunks[1].char_start, chunks[1].char_end), (15, 30));
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(40);
        let a = chunk_text(&text, &params(120, 30));
        let b = chunk_text(&text, &params(120, 30));
        assert_eq!(a, b);
    }

    #[test]
    fn test_content_hash_stable() {
        assert_eq!(compute_text_hash("abc"), compute_content_hash(b"abc"));
        assert_ne!(compute_text_hash("abc"), compute_text_hash("abd"));
    }
}
