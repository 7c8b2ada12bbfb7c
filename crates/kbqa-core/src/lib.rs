//! # kbqa Core
//!
//! Shared, I/O-free logic for kbqa: data models, chunking, the embedding
//! and vector index traits, retrieval, prompt rendering, and the
//! question-answering chain.
//!
//! This crate contains no tokio, reqwest, filesystem I/O, or other
//! runtime-specific dependencies. Concrete embedding and generation
//! providers live in the `kbqa` app crate.
//!
//! ## Data Flow
//!
//! ```text
//! Document ──▶ chunk ──▶ Embedder ──▶ VectorIndex
//!                                          │
//! question ──▶ Retriever ◀─────────────────┘
//!                 │
//!                 ▼
//!           PromptTemplate ──▶ Generator ──▶ Answer
//! ```

pub mod chunk;
pub mod embedding;
pub mod generate;
pub mod index;
pub mod models;
pub mod prompt;
pub mod qa;
pub mod retrieve;
