//! Query-time retrieval and index construction.
//!
//! [`build_index`] embeds chunks in batches and stores them in a
//! [`VectorIndex`]. A [`Retriever`] then pairs that index with the same
//! [`Embedder`] to answer "top-k chunks for this question".

use std::sync::Arc;

use crate::embedding::{Embedder, EmbeddingError};
use crate::index::{IndexError, VectorIndex};
use crate::models::{Chunk, ScoredChunk};

/// Errors from index construction or retrieval.
#[derive(Debug, thiserror::Error)]
pub enum RetrieveError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("index was built with embedding model '{index}' but the retriever uses '{embedder}'")]
    ModelMismatch { index: String, embedder: String },
}

/// Embed `chunks` in batches of `batch_size` and add them to `index`.
///
/// Returns the number of chunks indexed. Fails if the embedder and
/// index disagree on the model, if a batch returns the wrong number of
/// vectors, or if a vector's length differs from [`Embedder::dims`].
pub async fn build_index(
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    chunks: &[Chunk],
    batch_size: usize,
) -> Result<usize, RetrieveError> {
    check_models(embedder, index)?;

    let batch_size = batch_size.max(1);
    for batch in chunks.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_texts(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                got: vectors.len(),
            }
            .into());
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != embedder.dims()) {
            return Err(EmbeddingError::DimensionMismatch {
                model: embedder.model_name().to_string(),
                expected: embedder.dims(),
                got: bad.len(),
            }
            .into());
        }
        index.add(batch, &vectors).await?;
    }
    Ok(chunks.len())
}

fn check_models(embedder: &dyn Embedder, index: &dyn VectorIndex) -> Result<(), RetrieveError> {
    if embedder.model_name() != index.model_name() {
        return Err(RetrieveError::ModelMismatch {
            index: index.model_name().to_string(),
            embedder: embedder.model_name().to_string(),
        });
    }
    Ok(())
}

/// "Given a query string, return the top-k relevant chunks."
///
/// Holds the embedder used at index build time so queries are always
/// embedded with the same model as the stored chunks.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    /// Pair an embedder with an index. Fails if the index was built with a
    /// different embedding model.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self, RetrieveError> {
        check_models(embedder.as_ref(), index.as_ref())?;
        Ok(Self { embedder, index })
    }

    pub fn index(&self) -> &dyn VectorIndex {
        self.index.as_ref()
    }

    /// Return up to `k` chunks nearest to `query`, nearest first.
    ///
    /// An empty index (or `k == 0`) yields an empty result without
    /// embedding the query.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>, RetrieveError> {
        if k == 0 || self.index.is_empty().await {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed_query(query).await?;
        Ok(self.index.query(&query_vec, k).await?)
    }
}
