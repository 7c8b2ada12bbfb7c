//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the only storage seam the retrieval
//! pipeline depends on, so an ANN library or a remote vector database can
//! replace the brute-force [`memory::InMemoryIndex`] without touching the
//! retriever or the QA chain.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::models::{Chunk, ScoredChunk};

/// Errors produced by a vector index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("got {vectors} vectors for {chunks} chunks")]
    LengthMismatch { chunks: usize, vectors: usize },
    #[error("vector has {got} dimensions, index holds {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Stores chunk vectors and answers nearest-neighbour queries.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`model_name`](VectorIndex::model_name) | Embedding model the stored vectors came from |
/// | [`add`](VectorIndex::add) | Store chunks with their vectors |
/// | [`query`](VectorIndex::query) | Top-k chunks by similarity, nearest first |
/// | [`len`](VectorIndex::len) | Number of stored chunks |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Returns the embedding model identifier every stored vector was
    /// computed with.
    fn model_name(&self) -> &str;

    /// Store `chunks[i]` with `vectors[i]`.
    async fn add(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<(), IndexError>;

    /// Return up to `k` chunks ordered by decreasing similarity to `vector`.
    ///
    /// An empty index yields an empty result, never an error.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError>;

    /// Number of stored chunks.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
