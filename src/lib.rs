//! # kbqa
//!
//! Ask questions about a text file from the terminal.
//!
//! kbqa reads one knowledge base file, splits it into overlapping chunks,
//! embeds them into an in-memory vector index, and answers each question
//! by retrieving the closest chunks and handing them, with the question,
//! to a hosted language model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌───────────────┐
//! │ knowledge    │──▶│ Chunk+Embed │──▶│ InMemoryIndex │
//! │ base (.txt)  │   │             │   │               │
//! └──────────────┘   └─────────────┘   └───────┬───────┘
//!                                              │ top-k
//!                   ┌──────────┐         ┌─────▼─────┐
//!   question ──────▶│  repl    │────────▶│  QaChain  │──▶ Generator (HTTP)
//!                   └──────────┘         └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export HUGGINGFACEHUB_API_TOKEN=hf_...
//! kbqa                                   # reads ./knowledge_base.txt
//! kbqa --knowledge-base notes.txt --top-k 6 --show-sources
//! kbqa --config ./kbqa.toml
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`document`] | Knowledge base loading |
//! | [`embedding`] | Embedding provider implementations |
//! | [`generation`] | Hosted generation providers |
//! | [`progress`] | Setup progress reporting |
//! | [`setup`] | One-time chain construction |
//! | [`repl`] | The interactive question loop |
//! | [`logging`] | Tracing subscriber setup |
//!
//! Chunking, retrieval, and the QA chain itself live in `kbqa-core` and
//! are re-exported here.

pub mod config;
pub mod document;
pub mod embedding;
pub mod generation;
pub mod logging;
pub mod progress;
pub mod repl;
pub mod setup;

pub use kbqa_core::{chunk, index, models, prompt, qa, retrieve};
