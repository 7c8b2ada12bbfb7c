//! Text generation trait.
//!
//! A [`Generator`] turns a rendered prompt into generated text. Hosted
//! implementations (Hugging Face, OpenAI, Ollama) live in the `kbqa` app
//! crate; the QA chain only sees this trait.

use async_trait::async_trait;

/// Failure of a single generation call.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("{0} environment variable not set")]
    MissingCredential(String),
    #[error("request to the model service failed: {0}")]
    Network(String),
    #[error("model service rejected the credentials (HTTP {status}): {body}")]
    Unauthorized { status: u16, body: String },
    #[error("model service rate limit or quota exceeded: {0}")]
    RateLimited(String),
    #[error("model service error (HTTP {status}): {body}")]
    Api { status: u16, body: String },
    #[error("malformed model response: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier (e.g. `"google/flan-t5-base"`).
    fn model_name(&self) -> &str;

    /// Generate text for `prompt`. Called once per question, never retried.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
