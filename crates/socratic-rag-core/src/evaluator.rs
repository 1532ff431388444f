//! Answer scoring.
//!
//! The evaluator asks the model for `{"score": <int>, "reason": "<string>"}`
//! and validates the reply before accepting it. Parsing is split in two:
//!
//! - [`parse_evaluation`] is pure and returns a tagged
//!   `Result<EvalResult, EvalParseError>`, so each failure mode is testable.
//! - [`EvalResult::from_model_output`] collapses any failure to
//!   [`EvalResult::fallback`].
//!
//! Evaluation is best-effort: malformed model output never becomes an
//! error for the caller. Adapter failures, however, still propagate.

use serde::Deserialize;
use tracing::warn;

use crate::error::{EvalParseError, RagError};
use crate::llm::LanguageModel;
use crate::models::{EvalResult, MAX_REASON_CHARS};
use crate::prompt;

#[derive(Deserialize)]
struct RawEvaluation {
    score: i64,
    reason: String,
}

/// Parse a model reply into a validated [`EvalResult`].
///
/// Accepts the bare JSON object, optionally wrapped in a single Markdown
/// code fence. The score must be an integer in `1..=10`; the reason must
/// be 1 to 100 characters after trimming.
pub fn parse_evaluation(raw: &str) -> Result<EvalResult, EvalParseError> {
    let parsed: RawEvaluation = serde_json::from_str(strip_code_fence(raw))?;

    if !(1..=10).contains(&parsed.score) {
        return Err(EvalParseError::ScoreOutOfRange(parsed.score));
    }

    let reason = parsed.reason.trim();
    let reason_chars = reason.chars().count();
    if reason_chars == 0 {
        return Err(EvalParseError::EmptyReason);
    }
    if reason_chars > MAX_REASON_CHARS {
        return Err(EvalParseError::ReasonTooLong(reason_chars));
    }

    Ok(EvalResult {
        score: parsed.score as u8,
        reason: reason.to_string(),
    })
}

/// Remove a surrounding ```` ``` ```` / ```` ```json ```` fence, if present.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = body.strip_suffix("```") else {
        return trimmed;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.trim()
}

impl EvalResult {
    /// Parse model output, substituting [`EvalResult::fallback`] on failure.
    pub fn from_model_output(raw: &str) -> Self {
        match parse_evaluation(raw) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "evaluation output rejected, using fallback score");
                EvalResult::fallback()
            }
        }
    }
}

/// Score an answer to a question with one model call.
///
/// # Errors
///
/// - [`RagError::InvalidInput`] if either string is blank (no model call).
/// - [`RagError::Adapter`] if the model call itself fails.
pub async fn evaluate<L>(llm: &L, question: &str, answer: &str) -> Result<EvalResult, RagError>
where
    L: LanguageModel + ?Sized,
{
    let question = question.trim();
    let answer = answer.trim();
    if question.is_empty() || answer.is_empty() {
        return Err(RagError::InvalidInput(
            "question and answer are both required".to_string(),
        ));
    }

    let raw = llm.complete(&prompt::evaluation(question, answer)).await?;
    Ok(EvalResult::from_model_output(&raw))
}
