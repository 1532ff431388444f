//! Error types for the orchestration and evaluation core.

use thiserror::Error;

/// Errors surfaced to callers of the orchestrator and evaluator.
#[derive(Debug, Error)]
pub enum RagError {
    /// Empty question or answer, or an invalid run parameter.
    ///
    /// Raised before any adapter is called; never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The language model or retrieval adapter failed.
    ///
    /// Carried through unchanged; the core performs no retry of its own.
    #[error(transparent)]
    Adapter(#[from] anyhow::Error),
}

impl RagError {
    /// True for errors caused by the caller rather than a backend.
    pub fn is_client_error(&self) -> bool {
        matches!(self, RagError::InvalidInput(_))
    }
}

/// Why an evaluator response could not be turned into an [`EvalResult`](crate::models::EvalResult).
#[derive(Debug, Error)]
pub enum EvalParseError {
    #[error("evaluation is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("score {0} is outside 1..=10")]
    ScoreOutOfRange(i64),

    #[error("reason is empty")]
    EmptyReason,

    #[error("reason is {0} characters, limit is 100")]
    ReasonTooLong(usize),
}
