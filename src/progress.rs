//! Setup progress reporting.
//!
//! Startup can take a while (model download, embedding every chunk), so each
//! setup step is announced as it begins. Progress lines go to **stdout** so
//! they interleave with the conversation; diagnostics go through `tracing`
//! on stderr.

use std::io::Write;

/// A single setup step.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SetupEvent {
    /// Setup has begun.
    Start,
    /// The knowledge base file is being read.
    LoadingDocument,
    /// The document was split.
    Chunked { chunks: usize },
    /// The embedding model is being prepared.
    Embedding,
    /// Chunks are being embedded into the vector index.
    BuildingIndex,
    /// The generation client is being created.
    LoadingGenerator,
    /// The generation credential is not set; requests go out unauthenticated.
    CredentialMissing { var: String },
}

impl SetupEvent {
    /// The console line for this event.
    pub fn message(&self) -> String {
        match self {
            SetupEvent::Start => "Setting up the RAG chain...".to_string(),
            SetupEvent::LoadingDocument => "Loading knowledge base...".to_string(),
            SetupEvent::Chunked { chunks } => format!("Split document into {} chunks.", chunks),
            SetupEvent::Embedding => "Creating text embeddings...".to_string(),
            SetupEvent::BuildingIndex => "Creating vector store...".to_string(),
            SetupEvent::LoadingGenerator => "Loading LLM for generation...".to_string(),
            SetupEvent::CredentialMissing { var } => format!(
                "Warning: {var} not found. Set the {var} environment variable. \
                 Requests will be sent without credentials."
            ),
        }
    }
}

/// Receives setup events. Implementations decide where they go.
pub trait SetupProgress: Send + Sync {
    fn report(&self, event: SetupEvent);
}

/// Prints each event on its own stdout line.
pub struct StdoutProgress;

impl SetupProgress for StdoutProgress {
    fn report(&self, event: SetupEvent) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", event.message());
        let _ = out.flush();
    }
}

/// No-op reporter.
pub struct SilentProgress;

impl SetupProgress for SilentProgress {
    fn report(&self, _event: SetupEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(SetupEvent::Start.message(), "Setting up the RAG chain...");
        assert_eq!(
            SetupEvent::Chunked { chunks: 12 }.message(),
            "Split document into 12 chunks."
        );
        assert_eq!(
            SetupEvent::BuildingIndex.message(),
            "Creating vector store..."
        );
    }

    #[test]
    fn credential_warning_names_variable() {
        let msg = SetupEvent::CredentialMissing {
            var: "HUGGINGFACEHUB_API_TOKEN".to_string(),
        }
        .message();
        assert!(msg.starts_with("Warning: HUGGINGFACEHUB_API_TOKEN not found."));
    }
}
