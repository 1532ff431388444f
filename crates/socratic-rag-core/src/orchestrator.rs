//! Iterative retrieve-summarize-decide loop.
//!
//! One run of the orchestrator walks a fixed state sequence, at most
//! `max_cycles` times:
//!
//! ```text
//!   ┌──────────────┐  can answer
//!   │ meta-cognize │────────────────────────────┐
//!   └──────┬───────┘                            │
//!          │ cannot answer                      │
//!          ▼                                    │
//!   ┌──────────────┐   ┌──────────┐   ┌───────────┐
//!   │   keywords   │──▶│ retrieve │──▶│ summarize │
//!   └──────────────┘   └──────────┘   └─────┬─────┘
//!          ▲                                │ append to context
//!          └──── next cycle (< max_cycles) ─┘
//!                                           │
//!                                           ▼
//!                                   ┌──────────────┐
//!                                   │ final answer │
//!                                   │   or hint    │
//!                                   └──────────────┘
//! ```
//!
//! Every call is awaited before the next step starts, because each prompt
//! depends on the previous output. Adapter errors end the run immediately
//! and propagate as [`RagError::Adapter`]; no partial answer is produced.
//! A blank final generation is reported the same way, so a successful run
//! always yields non-empty text.
//!
//! A run issues at most `3 * max_cycles + 1` model calls and at most
//! `max_cycles` retrieval calls.

use anyhow::anyhow;
use tracing::{debug, info};

use crate::decision::classify_decision;
use crate::error::RagError;
use crate::llm::{LanguageModel, Prompt};
use crate::models::{Context, CycleRecord, Decision, Mode, Question, RunTrace};
use crate::prompt;
use crate::store::Retriever;

/// Cycle limit used when the caller has no preference.
pub const DEFAULT_MAX_CYCLES: usize = 3;

/// Passages requested from the retriever per cycle.
pub const DEFAULT_RETRIEVAL_K: usize = 10;

/// Hard cap on passages summarized per cycle, regardless of how many the
/// retriever returned.
pub const SNIPPET_LIMIT: usize = 5;

/// Drives one question through the loop against borrowed adapters.
///
/// Holds no per-run state: each call to [`run`](Orchestrator::run) starts
/// from an empty [`Context`], so one orchestrator can serve concurrent runs.
pub struct Orchestrator<'a, L: ?Sized, R: ?Sized> {
    llm: &'a L,
    retriever: &'a R,
    retrieval_k: usize,
}

impl<'a, L, R> Orchestrator<'a, L, R>
where
    L: LanguageModel + ?Sized,
    R: Retriever + ?Sized,
{
    pub fn new(llm: &'a L, retriever: &'a R) -> Self {
        Self {
            llm,
            retriever,
            retrieval_k: DEFAULT_RETRIEVAL_K,
        }
    }

    /// Number of passages to request per retrieval (clamped to at least 1).
    pub fn with_retrieval_k(mut self, k: usize) -> Self {
        self.retrieval_k = k.max(1);
        self
    }

    /// Run the loop and return the trimmed final text.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] if `question` is blank or `max_cycles`
    ///   is 0. No adapter is called in that case.
    /// - [`RagError::Adapter`] if any model or retrieval call fails.
    pub async fn run(
        &self,
        question: &str,
        mode: Mode,
        max_cycles: usize,
    ) -> Result<String, RagError> {
        Ok(self.run_with_trace(question, mode, max_cycles).await?.output)
    }

    /// Like [`run`](Orchestrator::run), but also returns what each cycle did.
    pub async fn run_with_trace(
        &self,
        question: &str,
        mode: Mode,
        max_cycles: usize,
    ) -> Result<RunTrace, RagError> {
        let question = Question::new(question)?;
        if max_cycles == 0 {
            return Err(RagError::InvalidInput(
                "max_cycles must be at least 1".to_string(),
            ));
        }
        let q = question.as_str();

        let mut context = Context::new();
        let mut cycles = Vec::with_capacity(max_cycles);
        let mut early_exit = false;

        for cycle in 1..=max_cycles {
            let raw = self
                .complete(&prompt::meta_cognition(q, &context.render()))
                .await?;
            let decision = classify_decision(&raw);
            debug!(cycle, ?decision, raw = %raw, "meta-cognition");

            if decision == Decision::CanAnswer {
                cycles.push(CycleRecord {
                    cycle,
                    decision,
                    keywords: None,
                    chunks_used: 0,
                    summary: None,
                });
                early_exit = true;
                break;
            }

            // Keywords always come from the question, never the context.
            let keywords = self.complete(&prompt::keyword_extraction(q)).await?;
            debug!(cycle, keywords = %keywords, "extracted keywords");

            let mut passages = self.retriever.retrieve(&keywords, self.retrieval_k).await?;
            passages.truncate(SNIPPET_LIMIT);
            let snippets = passages
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            debug!(cycle, passages = passages.len(), "retrieved");

            let summary = self.complete(&prompt::summarize(&snippets)).await?;
            debug!(cycle, summary = %summary, "summarized");

            context.push(summary.clone());
            cycles.push(CycleRecord {
                cycle,
                decision,
                keywords: Some(keywords),
                chunks_used: passages.len(),
                summary: Some(summary),
            });
        }

        let rendered = context.render();
        let final_prompt = match mode {
            Mode::Answer => prompt::final_answer(&rendered, q),
            Mode::Hint => prompt::final_hint(&rendered, q),
        };
        let output = self.complete(&final_prompt).await?;
        if output.is_empty() {
            return Err(RagError::Adapter(anyhow!(
                "model returned an empty final response"
            )));
        }

        info!(
            %mode,
            cycles = cycles.len(),
            early_exit,
            context_len = context.rendered_len(),
            "orchestration finished"
        );

        Ok(RunTrace {
            mode,
            output,
            cycles,
            early_exit,
            context,
        })
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, RagError> {
        let text = self.llm.complete(prompt).await?;
        Ok(text.trim().to_string())
    }
}
