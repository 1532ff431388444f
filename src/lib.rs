//! # Socratic RAG
//!
//! Retrieval-augmented question answering that decides for itself when it
//! knows enough. Each run loops over a small, bounded number of cycles:
//!
//! ```text
//!   question ──▶ can I answer? ──yes──────────────────────────┐
//!                    │ no                                     ▼
//!                    ▼                               final answer / hint
//!               keywords ──▶ retrieve ──▶ summarize ──▶ context
//!                    ▲                                    │
//!                    └────────────────────────────────────┘
//! ```
//!
//! In *hint* mode the final step produces a Socratic hint instead of the
//! answer. A separate evaluator scores answers from 1 to 10.
//!
//! The runtime-agnostic pieces (loop, prompts, evaluator, chunker, vector
//! index) live in `socratic-rag-core`. This crate adds:
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`openai`] | Chat and embedding adapters over HTTP |
//! | [`loader`] | Per-extension document loading |
//! | [`index`] | Index build pipeline and the lazily-built shared index |
//! | [`service`] | [`service::RagService`], the application entry point |

pub mod config;
pub mod index;
pub mod loader;
pub mod openai;
pub mod service;

pub use service::RagService;
