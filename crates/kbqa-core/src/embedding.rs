//! Embedding provider trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement,
//! the offline [`HashingEmbedder`], and pure helpers for similarity
//! computation.
//!
//! Network and ONNX-backed providers (OpenAI, Ollama, fastembed, tract)
//! live in the `kbqa` app crate.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Errors produced while computing embeddings.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("{0} environment variable not set")]
    MissingCredential(String),
    #[error("embedding request failed: {0}")]
    Request(String),
    #[error("invalid embedding response: {0}")]
    MalformedResponse(String),
    #[error("embedding model error: {0}")]
    Model(String),
    #[error("embedding provider returned {got} vectors for {expected} texts")]
    CountMismatch { expected: usize, got: usize },
    #[error("embedding model '{model}' returned {got}-dimensional vectors, expected {expected}")]
    DimensionMismatch {
        model: String,
        expected: usize,
        got: usize,
    },
}

/// Maps text to fixed-length vectors.
///
/// The same instance must embed both the indexed chunks and every later
/// query; vectors from different models are not comparable.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per text in input order.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_texts(&[text.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(EmbeddingError::CountMismatch {
                expected: 1,
                got: vectors.len(),
            });
        }
        Ok(vectors.remove(0))
    }
}

/// Default dimensionality of [`HashingEmbedder`].
pub const HASHING_DEFAULT_DIMS: usize = 384;

/// Deterministic, offline feature-hashing embedder.
///
/// Lowercases the text, splits it into alphanumeric tokens, and hashes
/// each token (SHA-256) into one of `dims` signed buckets. The result is
/// L2-normalised. Texts sharing vocabulary land close together; there is
/// no semantic model behind it.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    /// Create a hashing embedder. A `dims` of zero falls back to
    /// [`HASHING_DEFAULT_DIMS`].
    pub fn new(dims: usize) -> Self {
        let dims = if dims == 0 { HASHING_DEFAULT_DIMS } else { dims };
        Self { dims }
    }

    /// Embed one text synchronously.
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dims];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        normalize_l2(vector)
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(HASHING_DEFAULT_DIMS)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hashing"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, zero vectors, or vectors of
/// different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Scale a vector to unit length. Near-zero vectors are returned as-is.
pub fn normalize_l2(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-9 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty_and_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_normalize_l2() {
        let v = normalize_l2(vec![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert_eq!(normalize_l2(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_hashing_is_deterministic_and_unit_length() {
        let e = HashingEmbedder::default();
        let a = e.embed_one("The borrow checker enforces ownership rules.");
        let b = e.embed_one("The borrow checker enforces ownership rules.");
        assert_eq!(a, b);
        assert_eq!(a.len(), HASHING_DEFAULT_DIMS);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_ignores_case_and_punctuation() {
        let e = HashingEmbedder::new(64);
        assert_eq!(e.embed_one("Hello, World!"), e.embed_one("hello world"));
    }

    #[test]
    fn test_hashing_shared_vocabulary_is_closer() {
        let e = HashingEmbedder::default();
        let q = e.embed_one("how do lifetimes work in rust");
        let near = e.embed_one("lifetimes in rust describe how long references live");
        let far = e.embed_one("the recipe needs two eggs and flour");
        assert!(cosine_similarity(&q, &near) > cosine_similarity(&q, &far));
    }

    #[test]
    fn test_hashing_zero_dims_falls_back() {
        assert_eq!(HashingEmbedder::new(0).dims(), HASHING_DEFAULT_DIMS);
    }

    #[tokio::test]
    async fn test_embed_query_default_method() {
        let e = HashingEmbedder::new(32);
        let q = e.embed_query("ownership").await.unwrap();
        assert_eq!(q, e.embed_one("ownership"));
    }
}
