//! One-time construction of the QA chain.
//!
//! ```text
//! knowledge base ──► chunk ──► embed ──► InMemoryIndex ─┐
//!                                                       ├──► QaChain
//!                       credential ──► generator ───────┘
//! ```
//!
//! Every step is announced through a [`SetupProgress`] reporter. Any
//! failure aborts setup; nothing here is retried.

use anyhow::{Context, Result};
use std::sync::Arc;

use kbqa_core::chunk::chunk_document;
use kbqa_core::embedding::Embedder;
use kbqa_core::generate::Generator;
use kbqa_core::index::memory::InMemoryIndex;
use kbqa_core::index::VectorIndex;
use kbqa_core::models::Document;
use kbqa_core::qa::{QaChain, QaError};
use kbqa_core::retrieve::{build_index, Retriever};

use crate::config::Config;
use crate::document::load_document;
use crate::embedding::create_embedder;
use crate::generation::{create_generator, read_credential, Credential};
use crate::progress::{SetupEvent, SetupProgress};

/// Build the chain described by `config`: read the knowledge base, index
/// it with the configured embedder, and connect the configured generator.
pub async fn setup_chain(config: &Config, progress: &dyn SetupProgress) -> Result<QaChain> {
    progress.report(SetupEvent::Start);

    progress.report(SetupEvent::LoadingDocument);
    let document = load_document(&config.knowledge_base.path)?;

    let params = config.chunking.params()?;
    let chunks = chunk_document(&document, params);
    progress.report(SetupEvent::Chunked {
        chunks: chunks.len(),
    });

    progress.report(SetupEvent::Embedding);
    let embedder = create_embedder(&config.embedding)
        .await
        .context("Failed to create embedding model")?;
    tracing::info!(
        provider = %config.embedding.provider,
        model = %embedder.model_name(),
        dims = embedder.dims(),
        "embedding model ready"
    );

    let retriever = index_chunks(&chunks, embedder, config, progress).await?;

    progress.report(SetupEvent::LoadingGenerator);
    let credential = read_credential(&config.generation);
    if let Credential::Missing { var } = &credential {
        if config.generation.require_credential {
            credential
                .require()
                .map_err(|e| QaError::Configuration(e.to_string()))?;
        }
        tracing::warn!(var = %var, "generation credential not set");
        progress.report(SetupEvent::CredentialMissing { var: var.clone() });
    }
    let generator = create_generator(&config.generation, &credential)?;
    tracing::info!(
        provider = %config.generation.provider,
        model = %generator.model_name(),
        "generator ready"
    );

    finish(retriever, generator, config)
}

/// Build a chain from an already-loaded document and ready collaborators.
///
/// Runs the same chunk/index/assemble steps as [`setup_chain`] without
/// touching the filesystem, the environment, or the network.
pub async fn assemble_chain(
    document: &Document,
    config: &Config,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    progress: &dyn SetupProgress,
) -> Result<QaChain> {
    let params = config.chunking.params()?;
    let chunks = chunk_document(document, params);
    progress.report(SetupEvent::Chunked {
        chunks: chunks.len(),
    });
    let retriever = index_chunks(&chunks, embedder, config, progress).await?;
    finish(retriever, generator, config)
}

async fn index_chunks(
    chunks: &[kbqa_core::models::Chunk],
    embedder: Arc<dyn Embedder>,
    config: &Config,
    progress: &dyn SetupProgress,
) -> Result<Retriever> {
    progress.report(SetupEvent::BuildingIndex);
    let index: Arc<dyn VectorIndex> = Arc::new(InMemoryIndex::new(embedder.model_name()));
    let started = std::time::Instant::now();
    let indexed = build_index(
        embedder.as_ref(),
        index.as_ref(),
        chunks,
        config.embedding.batch_size,
    )
    .await
    .map_err(QaError::from)
    .context("Failed to build vector index")?;
    tracing::info!(
        chunks = indexed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "vector index built"
    );

    Ok(Retriever::new(embedder, index).map_err(QaError::from)?)
}

fn finish(retriever: Retriever, generator: Arc<dyn Generator>, config: &Config) -> Result<QaChain> {
    let template = config.prompt.template()?;
    Ok(QaChain::builder()
        .retriever(retriever)
        .generator(generator)
        .template(template)
        .top_k(config.retrieval.top_k)
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;
    use async_trait::async_trait;
    use kbqa_core::embedding::HashingEmbedder;
    use kbqa_core::generate::GenerationError;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FixedGenerator;

    #[async_trait]
    impl Generator for FixedGenerator {
        fn model_name(&self) -> &str {
            "fixed"
        }
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Ok("fixed answer".to_string())
        }
    }

    #[derive(Default)]
    struct RecordingProgress(Mutex<Vec<SetupEvent>>);

    impl SetupProgress for RecordingProgress {
        fn report(&self, event: SetupEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn offline_config(kb: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.knowledge_base.path = kb.to_path_buf();
        config.embedding.provider = "hashing".to_string();
        config.generation.provider = "ollama".to_string();
        config.generation.base_url = Some("http://127.0.0.1:9".to_string());
        config
    }

    #[tokio::test]
    async fn test_setup_chain_reports_steps_in_order() {
        let tmp = TempDir::new().unwrap();
        let kb = tmp.path().join("knowledge_base.txt");
        std::fs::write(&kb, "Ferris is the unofficial Rust mascot.").unwrap();

        let progress = RecordingProgress::default();
        let chain = setup_chain(&offline_config(&kb), &progress).await.unwrap();
        assert_eq!(chain.retriever().index().len().await, 1);
        assert_eq!(chain.generator().model_name(), "llama3.2");

        let events = progress.0.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                SetupEvent::Start,
                SetupEvent::LoadingDocument,
                SetupEvent::Chunked { chunks: 1 },
                SetupEvent::Embedding,
                SetupEvent::BuildingIndex,
                SetupEvent::LoadingGenerator,
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_knowledge_base_fails_before_chunking() {
        let tmp = TempDir::new().unwrap();
        let progress = RecordingProgress::default();
        let err = setup_chain(&offline_config(&tmp.path().join("missing.txt")), &progress)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("not found. Please create it."));
        assert_eq!(
            *progress.0.lock().unwrap(),
            vec![SetupEvent::Start, SetupEvent::LoadingDocument]
        );
    }

    #[tokio::test]
    async fn test_required_credential_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let kb = tmp.path().join("kb.txt");
        std::fs::write(&kb, "text").unwrap();
        let mut config = offline_config(&kb);
        config.generation.api_key_env = Some("KBQA_SETUP_TEST_UNSET_TOKEN".to_string());
        config.generation.require_credential = true;

        let err = setup_chain(&config, &SilentProgress).await.err().unwrap();
        assert!(err.to_string().contains("KBQA_SETUP_TEST_UNSET_TOKEN"));
    }

    #[tokio::test]
    async fn test_missing_credential_warns() {
        let tmp = TempDir::new().unwrap();
        let kb = tmp.path().join("kb.txt");
        std::fs::write(&kb, "text").unwrap();
        let mut config = offline_config(&kb);
        config.generation.api_key_env = Some("KBQA_SETUP_TEST_UNSET_TOKEN".to_string());

        let progress = RecordingProgress::default();
        setup_chain(&config, &progress).await.unwrap();
        assert!(progress.0.lock().unwrap().contains(&SetupEvent::CredentialMissing {
            var: "KBQA_SETUP_TEST_UNSET_TOKEN".to_string()
        }));
    }

    #[tokio::test]
    async fn test_assemble_chain_answers() {
        let config = Config::default();
        let document = Document::new("kb", "Cargo is the Rust package manager.");
        let chain = assemble_chain(
            &document,
            &config,
            Arc::new(HashingEmbedder::default()),
            Arc::new(FixedGenerator),
            &SilentProgress,
        )
        .await
        .unwrap();
        let answer = chain.ask("What is Cargo?").await.unwrap();
        assert_eq!(answer.text, "fixed answer");
        assert_eq!(answer.sources.len(), 1);
    }
}
