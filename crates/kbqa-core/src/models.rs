//! Core data models that flow through the setup and query pipeline.

/// A loaded knowledge base: raw text plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Source identifier, usually the file path.
    pub source: String,
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// An overlapping span of a [`Document`]'s text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Stable identifier: `"{source}#{chunk_index}"`.
    pub id: String,
    pub source: String,
    /// Position in the chunk sequence, starting at 0.
    pub chunk_index: usize,
    /// Offset of the first character, counted in chars (not bytes).
    pub offset: usize,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// A chunk paired with its similarity to a query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub score: f32,
}

/// The result of one question: generated text plus the chunks it was
/// conditioned on, in retrieval order.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<ScoredChunk>,
}
