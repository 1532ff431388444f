//! The application service: configured adapters wired to the core loop.
//!
//! [`RagService`] is what the CLI (or any other front end) talks to. It owns
//! the answering model, the evaluator model, and a [`LazyRetriever`] over the
//! process-wide [`SharedIndex`]. Each operation is an independent run; runs
//! share only the read-only index.

use std::sync::Arc;

use anyhow::Context as _;
use tracing::info;

use socratic_rag_core::evaluator;
use socratic_rag_core::models::RunTrace;
use socratic_rag_core::{
    Embedder, EvalResult, LanguageModel, Mode, Orchestrator, Prompt, Question, RagError,
    ScoredAnswer,
};

use crate::config::Config;
use crate::index::{IndexSettings, IndexStats, LazyRetriever, SharedIndex};
use crate::openai::{OpenAiChat, OpenAiEmbedder};

pub struct RagService<E> {
    llm: Arc<dyn LanguageModel>,
    evaluator: Arc<dyn LanguageModel>,
    index: Arc<SharedIndex<E>>,
    retriever: LazyRetriever<E>,
    retrieval_k: usize,
    max_cycles: usize,
}

impl RagService<OpenAiEmbedder> {
    /// Build the OpenAI-backed service. Requires `OPENAI_API_KEY`.
    ///
    /// Nothing is loaded or embedded here; the index is built on first use
    /// or by [`warm_up`](RagService::warm_up).
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let llm = OpenAiChat::from_config(&config.llm).context("Failed to create chat model")?;
        let evaluator = OpenAiChat::from_config(&config.evaluator)
            .context("Failed to create evaluator model")?;
        let embedder = OpenAiEmbedder::from_config(&config.embedding)
            .context("Failed to create embedding model")?;
        Self::new(config, Arc::new(llm), Arc::new(evaluator), embedder)
    }
}

impl<E: Embedder + 'static> RagService<E> {
    pub fn new(
        config: &Config,
        llm: Arc<dyn LanguageModel>,
        evaluator: Arc<dyn LanguageModel>,
        embedder: E,
    ) -> anyhow::Result<Self> {
        let params = config.retrieval.search_params()?;
        let index = Arc::new(SharedIndex::new(
            IndexSettings::from_config(config),
            Arc::new(embedder),
        ));
        let retriever = LazyRetriever::new(Arc::clone(&index), params);
        Ok(Self {
            llm,
            evaluator,
            index,
            retriever,
            retrieval_k: config.retrieval.k,
            max_cycles: config.orchestrator.max_cycles,
        })
    }

    /// Default cycle budget used by [`answer`](Self::answer) and [`hint`](Self::hint).
    pub fn max_cycles(&self) -> usize {
        self.max_cycles
    }

    pub async fn answer(&self, question: &str) -> Result<String, RagError> {
        self.run(question, Mode::Answer, self.max_cycles).await
    }

    pub async fn hint(&self, question: &str) -> Result<String, RagError> {
        self.run(question, Mode::Hint, self.max_cycles).await
    }

    pub async fn run(
        &self,
        question: &str,
        mode: Mode,
        max_cycles: usize,
    ) -> Result<String, RagError> {
        Ok(self.run_with_trace(question, mode, max_cycles).await?.output)
    }

    pub async fn run_with_trace(
        &self,
        question: &str,
        mode: Mode,
        max_cycles: usize,
    ) -> Result<RunTrace, RagError> {
        Orchestrator::new(self.llm.as_ref(), &self.retriever)
            .with_retrieval_k(self.retrieval_k)
            .run_with_trace(question, mode, max_cycles)
            .await
    }

    pub async fn evaluate(&self, question: &str, answer: &str) -> Result<EvalResult, RagError> {
        evaluator::evaluate(self.evaluator.as_ref(), question, answer).await
    }

    /// Answer a question, then score the answer.
    pub async fn answer_and_evaluate(&self, question: &str) -> Result<ScoredAnswer, RagError> {
        self.answer_and_evaluate_with(question, self.max_cycles).await
    }

    /// [`answer_and_evaluate`](Self::answer_and_evaluate) with an explicit cycle budget.
    pub async fn answer_and_evaluate_with(
        &self,
        question: &str,
        max_cycles: usize,
    ) -> Result<ScoredAnswer, RagError> {
        let question = Question::new(question)?;
        let answer = self
            .run(question.as_str(), Mode::Answer, max_cycles)
            .await?;
        let eval = self.evaluate(question.as_str(), &answer).await?;
        info!(score = eval.score, "answer evaluated");
        Ok(ScoredAnswer::new(&question, answer, eval))
    }

    /// One direct completion, no retrieval.
    pub async fn chat(&self, message: &str) -> Result<String, RagError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(RagError::InvalidInput("message must not be empty".to_string()));
        }
        let reply = self.llm.complete(&Prompt::user(message)).await?;
        Ok(reply.trim().to_string())
    }

    /// Build the index now instead of on the first question.
    pub async fn warm_up(&self) -> anyhow::Result<IndexStats> {
        self.index.stats().await
    }

    pub fn is_index_built(&self) -> bool {
        self.index.is_built()
    }

    /// Synchronous entry point for callers without an async runtime.
    ///
    /// Spins up a current-thread runtime for the one run. Must not be called
    /// from inside a tokio runtime.
    pub fn run_blocking(
        &self,
        question: &str,
        mode: Mode,
        max_cycles: usize,
    ) -> Result<String, RagError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start runtime")?;
        runtime.block_on(self.run(question, mode, max_cycles))
    }
}
