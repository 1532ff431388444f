//! Core data models used throughout Socratic RAG.
//!
//! These types represent the question, the per-run context, the retrieved
//! passages, and the evaluation results that flow through the
//! orchestration and scoring pipeline.

use std::fmt;

use serde::Serialize;

use crate::error::RagError;

/// A user question, trimmed and guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question(String);

impl Question {
    /// Validate and trim a raw question.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] if the text is empty after trimming.
    pub fn new(raw: &str) -> Result<Self, RagError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RagError::InvalidInput(
                "question must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Which kind of final output an orchestration run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Answer the question directly.
    Answer,
    /// Give a Socratic hint without revealing the answer.
    Hint,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Answer => f.write_str("answer"),
            Mode::Hint => f.write_str("hint"),
        }
    }
}

/// Summaries accumulated during one orchestration run.
///
/// Append-only: summaries are never removed or rewritten, so the rendered
/// length never decreases. A `Context` belongs to exactly one run and is
/// dropped when the run ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Context {
    summaries: Vec<String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a summary, even if it is empty.
    pub fn push(&mut self, summary: impl Into<String>) {
        self.summaries.push(summary.into());
    }

    /// Render as the prompt sees it: each summary prefixed with a newline.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.rendered_len());
        for s in &self.summaries {
            out.push('\n');
            out.push_str(s);
        }
        out
    }

    /// Byte length of [`render`](Context::render) without allocating.
    pub fn rendered_len(&self) -> usize {
        self.summaries.iter().map(|s| s.len() + 1).sum()
    }

    pub fn summaries(&self) -> &[String] {
        &self.summaries
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }
}

/// A passage returned by the retrieval capability.
///
/// The orchestrator only reads `text`; `source` is provenance for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub source: Option<String>,
}

impl RetrievedChunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// A chunk of a loaded document, as stored in the vector index.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    /// Provenance of the parent document (path, page, or cell).
    pub source: String,
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 of `text`, used to skip duplicate passages at index time.
    pub hash: String,
}

/// Outcome of the meta-cognition step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    CanAnswer,
    CannotAnswer,
}

/// Upper bound on the length of [`EvalResult::reason`], in characters.
pub const MAX_REASON_CHARS: usize = 100;

/// Score and short justification for a (question, answer) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvalResult {
    /// Integer score in `1..=10`.
    pub score: u8,
    /// Trimmed justification, 1 to [`MAX_REASON_CHARS`] characters.
    pub reason: String,
}

impl EvalResult {
    /// The value substituted when the model output cannot be parsed.
    pub fn fallback() -> Self {
        Self {
            score: 1,
            reason: "parse failure".to_string(),
        }
    }
}

/// The four fields the persistence layer stores for every evaluated answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredAnswer {
    pub question: String,
    pub answer: String,
    pub score: u8,
    pub reason: String,
}

impl ScoredAnswer {
    pub fn new(question: &Question, answer: String, eval: EvalResult) -> Self {
        Self {
            question: question.as_str().to_string(),
            answer,
            score: eval.score,
            reason: eval.reason,
        }
    }
}

/// What happened in a single retrieve-summarize cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleRecord {
    /// 1-based cycle number.
    pub cycle: usize,
    pub decision: Decision,
    /// Search terms produced by the keyword step (absent on early exit).
    pub keywords: Option<String>,
    /// Number of retrieved passages that were summarized.
    pub chunks_used: usize,
    pub summary: Option<String>,
}

/// Observable record of one orchestration run.
#[derive(Debug, Clone, Serialize)]
pub struct RunTrace {
    pub mode: Mode,
    /// The final generated text.
    pub output: String,
    pub cycles: Vec<CycleRecord>,
    /// True when the meta-cognition step ended the loop before `max_cycles`.
    pub early_exit: bool,
    pub context: Context,
}
