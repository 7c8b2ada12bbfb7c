//! The question-answering chain.
//!
//! [`QaChain::ask`] is the whole per-question pipeline:
//!
//! 1. Retrieve the top-k chunks for the question.
//! 2. Join their text with blank lines, preserving retrieval order.
//! 3. Render the prompt template with `context` and `question`.
//! 4. Call the generator once.
//! 5. Return the trimmed answer plus the chunks it was given.
//!
//! Nothing is retried; the first failure is returned as-is.

use std::sync::Arc;

use crate::chunk::ChunkError;
use crate::embedding::EmbeddingError;
use crate::generate::{GenerationError, Generator};
use crate::index::IndexError;
use crate::models::{Answer, ScoredChunk};
use crate::prompt::{PromptError, PromptTemplate};
use crate::retrieve::{RetrieveError, Retriever};

/// Separator placed between retrieved chunks in the context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Default number of chunks handed to the generator.
pub const DEFAULT_TOP_K: usize = 4;

/// Errors surfaced by setup and by [`QaChain::ask`].
#[derive(Debug, thiserror::Error)]
pub enum QaError {
    /// Missing input, invalid parameters, or an incompletely built chain.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("vector index error: {0}")]
    Index(#[from] IndexError),
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
}

impl From<RetrieveError> for QaError {
    fn from(err: RetrieveError) -> Self {
        match err {
            RetrieveError::Embedding(e) => QaError::Embedding(e),
            RetrieveError::Index(e) => QaError::Index(e),
            mismatch @ RetrieveError::ModelMismatch { .. } => {
                QaError::Configuration(mismatch.to_string())
            }
        }
    }
}

impl From<ChunkError> for QaError {
    fn from(err: ChunkError) -> Self {
        QaError::Configuration(err.to_string())
    }
}

impl From<PromptError> for QaError {
    fn from(err: PromptError) -> Self {
        QaError::Configuration(err.to_string())
    }
}

/// Retriever + prompt template + generator, built once at startup.
pub struct QaChain {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    template: PromptTemplate,
    top_k: usize,
}

impl QaChain {
    pub fn builder() -> QaChainBuilder {
        QaChainBuilder::default()
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn generator(&self) -> &dyn Generator {
        self.generator.as_ref()
    }

    /// Answer one question.
    pub async fn ask(&self, question: &str) -> Result<Answer, QaError> {
        let sources = self.retriever.retrieve(question, self.top_k).await?;
        let prompt = self.render_prompt(question, &sources);
        let generated = self.generator.generate(&prompt).await?;
        Ok(Answer {
            text: generated.trim().to_string(),
            sources,
        })
    }

    /// Build the exact prompt sent to the generator for `question` and
    /// the given retrieved chunks.
    pub fn render_prompt(&self, question: &str, sources: &[ScoredChunk]) -> String {
        let context = sources
            .iter()
            .map(|s| s.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);
        self.template.render(&context, question)
    }
}

/// Assembles a [`QaChain`]; [`build`](QaChainBuilder::build) fails with
/// [`QaError::Configuration`] if a required part was never supplied.
#[derive(Default)]
pub struct QaChainBuilder {
    retriever: Option<Retriever>,
    generator: Option<Arc<dyn Generator>>,
    template: Option<PromptTemplate>,
    top_k: Option<usize>,
}

impl QaChainBuilder {
    pub fn retriever(mut self, retriever: Retriever) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn template(mut self, template: PromptTemplate) -> Self {
        self.template = Some(template);
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn build(self) -> Result<QaChain, QaError> {
        let retriever = self.retriever.ok_or_else(|| {
            QaError::Configuration("QA chain has no retriever; setup did not complete".into())
        })?;
        let generator = self.generator.ok_or_else(|| {
            QaError::Configuration("QA chain has no generator; setup did not complete".into())
        })?;
        let top_k = self.top_k.unwrap_or(DEFAULT_TOP_K);
        if top_k == 0 {
            return Err(QaError::Configuration("top_k must be >= 1".into()));
        }
        Ok(QaChain {
            retriever,
            generator,
            template: self.template.unwrap_or_default(),
            top_k,
        })
    }
}
