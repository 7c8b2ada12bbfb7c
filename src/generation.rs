//! Hosted text-generation providers.
//!
//! Each provider implements [`Generator`] over one HTTP endpoint:
//!
//! | Provider | Endpoint | Answer field |
//! |----------|----------|--------------|
//! | [`HuggingFaceGenerator`] | `POST {base}/models/{model}` | `[0].generated_text` |
//! | [`OpenAIGenerator`] | `POST {base}/v1/chat/completions` | `choices[0].message.content` |
//! | [`OllamaGenerator`] | `POST {base}/api/generate` | `response` |
//!
//! A generation call is made exactly once per question. Failures map onto
//! [`GenerationError`]: 401/403 → `Unauthorized`, 429 → `RateLimited`,
//! any other non-success status → `Api`, transport failures → `Network`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use kbqa_core::generate::{GenerationError, Generator};

use crate::config::GenerationConfig;

/// The generation credential as found in the environment at startup.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Present(String),
    Missing { var: String },
    /// The provider takes no credential.
    NotRequired,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Present(_) => f.write_str("Present(..)"),
            Credential::Missing { var } => f.debug_struct("Missing").field("var", var).finish(),
            Credential::NotRequired => f.write_str("NotRequired"),
        }
    }
}

impl Credential {
    pub fn token(&self) -> Option<&str> {
        match self {
            Credential::Present(token) => Some(token),
            _ => None,
        }
    }

    /// Fail with [`GenerationError::MissingCredential`] if the variable was unset.
    pub fn require(&self) -> Result<(), GenerationError> {
        match self {
            Credential::Missing { var } => Err(GenerationError::MissingCredential(var.clone())),
            _ => Ok(()),
        }
    }
}

/// Read the credential variable configured (or defaulted) for the provider.
/// An empty value counts as missing.
pub fn read_credential(config: &GenerationConfig) -> Credential {
    match config.api_key_env_or_default() {
        None => Credential::NotRequired,
        Some(var) => match std::env::var(&var) {
            Ok(value) if !value.trim().is_empty() => Credential::Present(value),
            _ => Credential::Missing { var },
        },
    }
}

/// Create the [`Generator`] named by `config.provider`.
pub fn create_generator(
    config: &GenerationConfig,
    credential: &Credential,
) -> Result<Arc<dyn Generator>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    let common = Common {
        model: config.model_or_default(),
        base_url: config.base_url_or_default(),
        temperature: config.temperature,
        max_length: config.max_length,
        api_key: credential.token().map(str::to_string),
        client,
    };

    match config.provider.as_str() {
        "huggingface" => Ok(Arc::new(HuggingFaceGenerator(common))),
        "openai" => Ok(Arc::new(OpenAIGenerator(common))),
        "ollama" => Ok(Arc::new(OllamaGenerator(common))),
        other => bail!("Unknown generation provider: {}", other),
    }
}

/// Settings shared by every HTTP provider.
struct Common {
    model: String,
    base_url: String,
    temperature: f32,
    max_length: u32,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl Common {
    /// POST `body` once and return the decoded JSON of a successful response.
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, GenerationError> {
        let mut request = self.client.post(url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GenerationError::Network(describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), body));
        }

        response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))
    }
}

/// Map a non-success HTTP status onto the error taxonomy.
fn status_error(status: u16, body: String) -> GenerationError {
    match status {
        401 | 403 => GenerationError::Unauthorized { status, body },
        429 => GenerationError::RateLimited(body),
        _ => GenerationError::Api { status, body },
    }
}

/// reqwest's top-level message omits the cause ("connection refused",
/// "timed out"); walk the source chain so it reaches the user.
fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = std::error::Error::source(cause);
    }
    message
}

// ============ Hugging Face Inference API ============

pub struct HuggingFaceGenerator(Common);

#[async_trait]
impl Generator for HuggingFaceGenerator {
    fn model_name(&self) -> &str {
        &self.0.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "inputs": prompt,
            "parameters": {
                "temperature": self.0.temperature,
                "max_length": self.0.max_length,
                "return_full_text": false,
            }
        });
        let url = format!("{}/models/{}", self.0.base_url, self.0.model);
        let json = self.0.post_json(&url, &body).await?;
        parse_huggingface_response(&json)
    }
}

fn parse_huggingface_response(json: &serde_json::Value) -> Result<String, GenerationError> {
    let item = match json {
        serde_json::Value::Array(items) => items.first().ok_or_else(|| {
            GenerationError::MalformedResponse("empty generation list".into())
        })?,
        other => other,
    };

    if let Some(text) = item.get("generated_text").and_then(|t| t.as_str()) {
        return Ok(text.to_string());
    }
    if let Some(error) = item.get("error") {
        let body = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(GenerationError::Api { status: 200, body });
    }
    Err(GenerationError::MalformedResponse(
        "missing generated_text".into(),
    ))
}

// ============ OpenAI Chat Completions ============

pub struct OpenAIGenerator(Common);

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.0.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "model": self.0.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.0.temperature,
            "max_tokens": self.0.max_length,
        });
        let url = format!("{}/v1/chat/completions", self.0.base_url);
        let json = self.0.post_json(&url, &body).await?;
        parse_openai_response(&json)
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<String, GenerationError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            GenerationError::MalformedResponse("missing choices[0].message.content".into())
        })
}

// ============ Ollama ============

pub struct OllamaGenerator(Common);

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.0.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "model": self.0.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.0.temperature,
                "num_predict": self.0.max_length,
            }
        });
        let url = format!("{}/api/generate", self.0.base_url);
        let json = self.0.post_json(&url, &body).await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<String, GenerationError> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(str::to_string)
        .ok_or_else(|| GenerationError::MalformedResponse("missing response".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(401, String::new()),
            GenerationError::Unauthorized { status: 401, .. }
        ));
        assert!(matches!(
            status_error(403, String::new()),
            GenerationError::Unauthorized { status: 403, .. }
        ));
        assert!(matches!(
            status_error(429, "slow down".into()),
            GenerationError::RateLimited(_)
        ));
        assert!(matches!(
            status_error(503, "loading".into()),
            GenerationError::Api { status: 503, .. }
        ));
    }

    #[test]
    fn test_parse_huggingface_list() {
        let text = parse_huggingface_response(&json!([{ "generated_text": "Paris" }])).unwrap();
        assert_eq!(text, "Paris");
    }

    #[test]
    fn test_parse_huggingface_object() {
        let text = parse_huggingface_response(&json!({ "generated_text": "Paris" })).unwrap();
        assert_eq!(text, "Paris");
    }

    #[test]
    fn test_parse_huggingface_error_object() {
        let err = parse_huggingface_response(&json!({ "error": "Model is loading" })).unwrap_err();
        match err {
            GenerationError::Api { body, .. } => assert_eq!(body, "Model is loading"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_huggingface_empty_list() {
        assert!(matches!(
            parse_huggingface_response(&json!([])),
            Err(GenerationError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_openai_response() {
        let json = json!({ "choices": [{ "message": { "role": "assistant", "content": "42" } }] });
        assert_eq!(parse_openai_response(&json).unwrap(), "42");
        assert!(parse_openai_response(&json!({ "choices": [] })).is_err());
    }

    #[test]
    fn test_parse_ollama_response() {
        assert_eq!(
            parse_ollama_response(&json!({ "response": "hi", "done": true })).unwrap(),
            "hi"
        );
        assert!(parse_ollama_response(&json!({ "done": true })).is_err());
    }

    #[test]
    fn test_read_credential() {
        let config = GenerationConfig {
            provider: "ollama".to_string(),
            ..GenerationConfig::default()
        };
        assert_eq!(read_credential(&config), Credential::NotRequired);

        let config = GenerationConfig {
            api_key_env: Some("KBQA_TEST_SURELY_UNSET_TOKEN".to_string()),
            ..GenerationConfig::default()
        };
        let credential = read_credential(&config);
        assert_eq!(
            credential,
            Credential::Missing {
                var: "KBQA_TEST_SURELY_UNSET_TOKEN".to_string()
            }
        );
        assert!(matches!(
            credential.require(),
            Err(GenerationError::MissingCredential(_))
        ));
    }

    #[test]
    fn test_credential_debug_hides_token() {
        let debug = format!("{:?}", Credential::Present("hf_secret".to_string()));
        assert!(!debug.contains("hf_secret"));
    }

    #[test]
    fn test_unknown_provider() {
        let config = GenerationConfig {
            provider: "telepathy".to_string(),
            ..GenerationConfig::default()
        };
        assert!(create_generator(&config, &Credential::NotRequired).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network_error() {
        let config = GenerationConfig {
            provider: "ollama".to_string(),
            base_url: Some("http://127.0.0.1:9".to_string()),
            timeout_secs: 5,
            ..GenerationConfig::default()
        };
        let generator = create_generator(&config, &Credential::NotRequired).unwrap();
        assert_eq!(generator.model_name(), "llama3.2");
        let err = generator.generate("hello").await.unwrap_err();
        assert!(matches!(err, GenerationError::Network(_)));
    }
}
