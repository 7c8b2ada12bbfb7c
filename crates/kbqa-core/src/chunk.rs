//! Sliding-window text chunker.
//!
//! Splits a [`Document`] into [`Chunk`]s of at most `chunk_size`
//! characters, where each chunk repeats the last `chunk_overlap`
//! characters of its predecessor. Lengths and offsets are counted in
//! chars, so multi-byte UTF-8 text is never split inside a code point.
//!
//! # Algorithm
//!
//! 1. Compute the stride: `chunk_size - chunk_overlap`.
//! 2. Window `n` starts at char `n × stride` and covers up to
//!    `chunk_size` chars.
//! 3. Stop after the first window that reaches the end of the text, so
//!    the final chunk is never wholly contained in the one before it.
//!
//! Each chunk carries a stable id derived from the document source and
//! its index, plus a SHA-256 hash of its text.
//!
//! # Example
//!
//! ```rust
//! use kbqa_core::chunk::{chunk_text, ChunkParams};
//!
//! let params = ChunkParams::new(4, 2).unwrap();
//! let chunks = chunk_text("notes.txt", "abcdefgh", params);
//! let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
//! assert_eq!(texts, ["abcd", "cdef", "efgh"]);
//! ```

use sha2::{Digest, Sha256};

use crate::models::{Chunk, Document};

/// Validated chunking parameters.
///
/// Construct with [`ChunkParams::new`]; invalid combinations are
/// rejected up front so the chunker itself cannot fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    chunk_size: usize,
    chunk_overlap: usize,
}

/// Invalid chunking parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("chunk_size must be > 0")]
    ZeroSize,
    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

impl ChunkParams {
    /// Validate `chunk_size > 0` and `chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkError> {
        if chunk_size == 0 {
            return Err(ChunkError::ZeroSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkError::OverlapTooLarge {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    fn stride(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

/// Chunk a loaded document. See [`chunk_text`].
pub fn chunk_document(doc: &Document, params: ChunkParams) -> Vec<Chunk> {
    chunk_text(&doc.source, &doc.text, params)
}

/// Split `text` into overlapping chunks.
///
/// # Guarantees
///
/// - Deterministic: the same input always yields identical chunks.
/// - Every chunk has at most `chunk_size` chars.
/// - Consecutive chunks share exactly `chunk_overlap` chars.
/// - Text of at most `chunk_size` chars yields one chunk equal to it.
/// - Empty text yields no chunks.
pub fn chunk_text(source: &str, text: &str, params: ChunkParams) -> Vec<Chunk> {
    // Byte offset of every char, plus the end of the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = bounds.len() - 1;

    let mut chunks = Vec::new();
    if total_chars == 0 {
        return chunks;
    }

    let mut start = 0;
    loop {
        let end = (start + params.chunk_size).min(total_chars);
        let piece = &text[bounds[start]..bounds[end]];
        chunks.push(make_chunk(source, chunks.len(), start, piece));
        if end == total_chars {
            break;
        }
        start += params.stride();
    }

    chunks
}

fn make_chunk(source: &str, index: usize, offset: usize, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: format!("{}#{}", source, index),
        source: source.to_string(),
        chunk_index: index,
        offset,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(size: usize, overlap: usize) -> ChunkParams {
        ChunkParams::new(size, overlap).unwrap()
    }

    #[test]
    fn test_short_text_single_chunk() {
        let text = "Rust is a systems programming language.";
        let chunks = chunk_text("kb.txt", text, params(1000, 150));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].offset, 0);
    }

    #[test]
    fn test_text_exactly_chunk_size() {
        let chunks = chunk_text("kb.txt", "abcdef", params(6, 2));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "abcdef");
    }

    #[test]
    fn test_empty_text_no_chunks() {
        assert!(chunk_text("kb.txt", "", params(10, 2)).is_empty());
    }

    #[test]
    fn test_windows_and_offsets() {
        let chunks = chunk_text("kb.txt", "abcdefghij", params(4, 2));
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["abcd", "cdef", "efgh", "ghij"]);
        let offsets: Vec<usize> = chunks.iter().map(|c| c.offset).collect();
        assert_eq!(offsets, [0, 2, 4, 6]);
    }

    #[test]
    fn test_no_overlap() {
        let chunks = chunk_text("kb.txt", "abcdefg", params(3, 0));
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["abc", "def", "g"]);
    }

    #[test]
    fn test_consecutive_chunks_share_overlap() {
        let text = (0..200)
            .map(|i| format!("sentence {} ", i))
            .collect::<String>();
        let overlap = 15;
        let chunks = chunk_text("kb.txt", &text, params(100, overlap));
        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].text.chars().collect();
            let next: Vec<char> = pair[1].text.chars().collect();
            assert_eq!(prev[prev.len() - overlap..], next[..overlap]);
        }
    }

    #[test]
    fn test_no_chunk_exceeds_size() {
        let text = "lorem ipsum dolor sit amet ".repeat(50);
        for c in chunk_text("kb.txt", &text, params(64, 10)) {
            assert!(c.text.chars().count() <= 64, "chunk too long: {}", c.text);
        }
    }

    #[test]
    fn test_last_chunk_not_contained_in_previous() {
        let chunks = chunk_text("kb.txt", "abcdefghijk", params(4, 2));
        let last = chunks.last().unwrap();
        assert!(last.text.chars().count() > 2);
        assert!(last.text.ends_with('k'));
    }

    #[test]
    fn test_chunks_reassemble_document() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(7);
        let overlap = 5;
        let chunks = chunk_text("kb.txt", &text, params(30, overlap));
        let mut rebuilt = chunks[0].text.clone();
        for c in &chunks[1..] {
            rebuilt.extend(c.text.chars().skip(overlap));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──────┐ héllo wörld ✓ 日本語のテキスト";
        let chunks = chunk_text("kb.txt", text, params(5, 1));
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.text.chars().count() <= 5);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta gamma delta epsilon zeta eta theta";
        let c1 = chunk_text("kb.txt", text, params(12, 4));
        let c2 = chunk_text("kb.txt", text, params(12, 4));
        assert_eq!(c1, c2);
    }

    #[test]
    fn test_ids_and_indices() {
        let chunks = chunk_text("kb.txt", "abcdefghij", params(4, 1));
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i);
            assert_eq!(c.id, format!("kb.txt#{}", i));
            assert_eq!(c.hash.len(), 64);
        }
    }

    #[test]
    fn test_chunk_document_uses_source() {
        let doc = Document::new("docs/kb.txt", "hello");
        let chunks = chunk_document(&doc, params(10, 0));
        assert_eq!(chunks[0].source, "docs/kb.txt");
    }

    #[test]
    fn test_zero_size_rejected() {
        assert_eq!(ChunkParams::new(0, 0), Err(ChunkError::ZeroSize));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        assert_eq!(
            ChunkParams::new(100, 100),
            Err(ChunkError::OverlapTooLarge {
                size: 100,
                overlap: 100
            })
        );
        assert!(ChunkParams::new(100, 150).is_err());
        assert!(ChunkParams::new(100, 99).is_ok());
    }
}
