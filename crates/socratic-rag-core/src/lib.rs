//! # Socratic RAG Core
//!
//! Runtime-agnostic logic for Socratic RAG: data model, adapter traits,
//! prompt templates, the iterative retrieve-summarize-decide loop, answer
//! evaluation, text chunking, and the in-memory vector index.
//!
//! This crate contains no tokio, HTTP client, or filesystem I/O. Concrete
//! language-model and embedding backends live in the `socratic-rag` app
//! crate and plug in through [`llm::LanguageModel`], [`store::Embedder`],
//! and [`store::Retriever`].

pub mod chunk;
pub mod decision;
pub mod embedding;
pub mod error;
pub mod evaluator;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod prompt;
pub mod store;

pub use error::{EvalParseError, RagError};
pub use llm::{LanguageModel, Prompt};
pub use models::{Context, Decision, EvalResult, Mode, Question, RetrievedChunk, ScoredAnswer};
pub use orchestrator::{Orchestrator, DEFAULT_MAX_CYCLES};
pub use store::{Embedder, Retriever};
