//! In-memory [`VectorIndex`] implementation.
//!
//! Keeps every chunk and vector in a `Vec` behind `std::sync::RwLock`.
//! Queries are brute-force cosine similarity over all stored vectors,
//! which is exact and fast enough for a single knowledge base file.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{Chunk, ScoredChunk};

use super::{IndexError, VectorIndex};

struct StoredVector {
    chunk: Chunk,
    vector: Vec<f32>,
}

#[derive(Default)]
struct State {
    entries: Vec<StoredVector>,
    dims: Option<usize>,
}

/// Brute-force in-memory index.
pub struct InMemoryIndex {
    model: String,
    state: RwLock<State>,
}

impl InMemoryIndex {
    /// Create an empty index for vectors produced by `model`.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            state: RwLock::new(State::default()),
        }
    }

    /// Dimensionality of the stored vectors, once the first one is added.
    pub fn dims(&self) -> Option<usize> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .dims
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn add(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<(), IndexError> {
        if chunks.len() != vectors.len() {
            return Err(IndexError::LengthMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let expected = state
            .dims
            .or_else(|| vectors.first().map(|v| v.len()));
        if let Some(expected) = expected {
            if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    got: bad.len(),
                });
            }
            state.dims = Some(expected);
        }

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            state.entries.push(StoredVector {
                chunk: chunk.clone(),
                vector: vector.clone(),
            });
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if state.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if let Some(expected) = state.dims {
            if vector.len() != expected {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    got: vector.len(),
                });
            }
        }

        let mut scored: Vec<ScoredChunk> = state
            .entries
            .iter()
            .map(|sv| ScoredChunk {
                chunk: sv.chunk.clone(),
                score: cosine_similarity(vector, &sv.vector),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            id: format!("kb#{}", index),
            source: "kb".to_string(),
            chunk_index: index,
            offset: 0,
            text: text.to_string(),
            hash: String::new(),
        }
    }

    #[tokio::test]
    async fn test_empty_index_returns_nothing() {
        let index = InMemoryIndex::new("test");
        assert!(index.is_empty().await);
        let results = index.query(&[1.0, 0.0], 4).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity() {
        let index = InMemoryIndex::new("test");
        index
            .add(
                &[chunk(0, "x"), chunk(1, "y"), chunk(2, "xy")],
                &[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
            )
            .await
            .unwrap();

        let results = index.query(&[1.0, 0.1], 3).await.unwrap();
        let order: Vec<usize> = results.iter().map(|r| r.chunk.chunk_index).collect();
        assert_eq!(order, [0, 2, 1]);
        assert!(results[0].score >= results[1].score);
        assert!(results[1].score >= results[2].score);
    }

    #[tokio::test]
    async fn test_query_truncates_to_k() {
        let index = InMemoryIndex::new("test");
        let chunks: Vec<Chunk> = (0..10).map(|i| chunk(i, "c")).collect();
        let vectors: Vec<Vec<f32>> = (0..10).map(|i| vec![1.0, i as f32]).collect();
        index.add(&chunks, &vectors).await.unwrap();
        assert_eq!(index.len().await, 10);
        assert_eq!(index.query(&[1.0, 0.0], 3).await.unwrap().len(), 3);
        assert!(index.query(&[1.0, 0.0], 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ties_break_by_chunk_index() {
        let index = InMemoryIndex::new("test");
        index
            .add(
                &[chunk(2, "b"), chunk(0, "a"), chunk(1, "c")],
                &[vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]],
            )
            .await
            .unwrap();
        let results = index.query(&[1.0, 0.0], 3).await.unwrap();
        let order: Vec<usize> = results.iter().map(|r| r.chunk.chunk_index).collect();
        assert_eq!(order, [0, 1, 2]);
    }

    #[tokio::test]
    async fn test_length_mismatch_rejected() {
        let index = InMemoryIndex::new("test");
        let err = index
            .add(&[chunk(0, "a"), chunk(1, "b")], &[vec![1.0]])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IndexError::LengthMismatch {
                chunks: 2,
                vectors: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let index = InMemoryIndex::new("test");
        index.add(&[chunk(0, "a")], &[vec![1.0, 0.0]]).await.unwrap();
        assert_eq!(index.dims(), Some(2));

        let err = index
            .add(&[chunk(1, "b")], &[vec![1.0, 0.0, 0.0]])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch {
                expected: 2,
                got: 3
            }
        ));

        let err = index.query(&[1.0], 1).await.unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { .. }));
    }
}
