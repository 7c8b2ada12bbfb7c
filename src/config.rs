//! TOML configuration parsing and validation.
//!
//! Every section and field is optional; the defaults reproduce a plain
//! run against `knowledge_base.txt` with a local MiniLM embedder and the
//! Hugging Face hosted `google/flan-t5-base` model.
//!
//! ```toml
//! [knowledge_base]
//! path = "knowledge_base.txt"
//!
//! [chunking]
//! chunk_size = 1000
//! chunk_overlap = 150
//!
//! [retrieval]
//! top_k = 4
//!
//! [embedding]
//! provider = "local"
//!
//! [generation]
//! provider = "huggingface"
//! model = "google/flan-t5-base"
//! ```

use anyhow::{bail, Context, Result};
use kbqa_core::chunk::ChunkParams;
use kbqa_core::prompt::{PromptTemplate, DEFAULT_TEMPLATE};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "kbqa.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeBaseConfig {
    #[serde(default = "default_kb_path")]
    pub path: PathBuf,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            path: default_kb_path(),
        }
    }
}

fn default_kb_path() -> PathBuf {
    PathBuf::from("knowledge_base.txt")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> Result<ChunkParams> {
        ChunkParams::new(self.chunk_size, self.chunk_overlap).context("Invalid [chunking] settings")
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    150
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub show_sources: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            show_sources: false,
        }
    }
}

fn default_top_k() -> usize {
    kbqa_core::qa::DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
    /// Ollama base URL.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout_secs(),
            url: None,
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Upper bound on generated tokens.
    #[serde(default = "default_max_length")]
    pub max_length: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    /// Environment variable holding the service credential.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Treat a missing credential as a fatal setup error instead of a warning.
    #[serde(default)]
    pub require_credential: bool,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            temperature: default_temperature(),
            max_length: default_max_length(),
            timeout_secs: default_generation_timeout_secs(),
            api_key_env: None,
            require_credential: false,
            base_url: None,
        }
    }
}

fn default_generation_provider() -> String {
    "huggingface".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_length() -> u32 {
    512
}
fn default_generation_timeout_secs() -> u64 {
    120
}

impl GenerationConfig {
    /// Configured model, or the provider's default.
    pub fn model_or_default(&self) -> String {
        if let Some(model) = &self.model {
            return model.clone();
        }
        match self.provider.as_str() {
            "openai" => "gpt-4o-mini",
            "ollama" => "llama3.2",
            _ => "google/flan-t5-base",
        }
        .to_string()
    }

    /// Credential variable to read, or `None` when the provider needs none.
    pub fn api_key_env_or_default(&self) -> Option<String> {
        if let Some(var) = &self.api_key_env {
            return Some(var.clone());
        }
        match self.provider.as_str() {
            "huggingface" => Some("HUGGINGFACEHUB_API_TOKEN".to_string()),
            "openai" => Some("OPENAI_API_KEY".to_string()),
            _ => None,
        }
    }

    /// Configured base URL without a trailing slash, or the provider's default.
    pub fn base_url_or_default(&self) -> String {
        let url = match &self.base_url {
            Some(url) => url.as_str(),
            None => match self.provider.as_str() {
                "openai" => "https://api.openai.com",
                "ollama" => "http://localhost:11434",
                _ => "https://api-inference.huggingface.co",
            },
        };
        url.trim_end_matches('/').to_string()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptConfig {
    #[serde(default = "default_template")]
    pub template: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            template: default_template(),
        }
    }
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

impl PromptConfig {
    pub fn template(&self) -> Result<PromptTemplate> {
        PromptTemplate::new(self.template.clone()).context("Invalid [prompt] template")
    }
}

impl Config {
    /// Check every cross-field constraint. Called by [`load_config`] and
    /// again after command-line overrides are applied.
    pub fn validate(&self) -> Result<()> {
        self.chunking.params()?;
        self.prompt.template()?;

        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be >= 1");
        }

        match self.embedding.provider.as_str() {
            "local" | "hashing" => {}
            "openai" | "ollama" => {
                if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                    bail!(
                        "embedding.dims must be > 0 when provider is '{}'",
                        self.embedding.provider
                    );
                }
                if self.embedding.model.is_none() {
                    bail!(
                        "embedding.model must be specified when provider is '{}'",
                        self.embedding.provider
                    );
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be local, openai, ollama, or hashing.",
                other
            ),
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }

        match self.generation.provider.as_str() {
            "huggingface" | "openai" | "ollama" => {}
            other => bail!(
                "Unknown generation provider: '{}'. Must be huggingface, openai, or ollama.",
                other
            ),
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            bail!("generation.temperature must be in [0.0, 2.0]");
        }
        if self.generation.max_length == 0 {
            bail!("generation.max_length must be > 0");
        }

        Ok(())
    }
}

/// Read, parse, and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Resolve the effective config.
///
/// An explicit path must exist. Without one, [`DEFAULT_CONFIG_PATH`] is
/// used when present and built-in defaults otherwise.
pub fn resolve_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => load_config(path),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                load_config(default_path)
            } else {
                Ok(Config::default())
            }
        }
    }
}
