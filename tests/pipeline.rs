//! End-to-end runs over real files with scripted model adapters.
//!
//! Documents are loaded, chunked, embedded with a deterministic hashing
//! embedder, and indexed exactly as in production; only the network-backed
//! models are replaced.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use socratic_rag::config::{parse_config, Config};
use socratic_rag::index::{IndexSettings, SharedIndex};
use socratic_rag::RagService;
use socratic_rag_core::{Embedder, EvalResult, LanguageModel, Mode, Prompt, RagError};

const DIMS: usize = 64;

/// Bag-of-words embedder: each lowercase word bumps one hashed dimension.
#[derive(Default)]
struct HashEmbedder {
    texts_embedded: AtomicUsize,
}

fn bucket(word: &str) -> usize {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in word.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    (h % DIMS as u64) as usize
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-64"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; DIMS];
                for word in t
                    .to_lowercase()
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                {
                    v[bucket(word)] += 1.0;
                }
                v
            })
            .collect())
    }
}

/// Answers like a model that knows only what the context tells it.
#[derive(Default)]
struct ContextBoundModel {
    calls: AtomicUsize,
}

#[async_trait]
impl LanguageModel for ContextBoundModel {
    fn model_name(&self) -> &str {
        "context-bound"
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let user = prompt.user.as_str();
        let knows_paris = user.contains("Paris");

        let reply = if prompt.system.is_some() {
            if knows_paris {
                "CAN_ANSWER"
            } else {
                "CANNOT_ANSWER"
            }
        } else if user.starts_with("Question: ") {
            "capital France"
        } else if user.starts_with("Search results:") {
            if knows_paris {
                "France's capital is Paris."
            } else {
                "Nothing relevant."
            }
        } else if user.contains("Do not give the answer directly") {
            "Which city hosts the French government?"
        } else if user.starts_with("Summarized context so far:") {
            if knows_paris {
                " Paris \n"
            } else {
                "I don't know."
            }
        } else {
            return Ok(format!("echo: {}", user));
        };
        Ok(reply.to_string())
    }
}

struct CannedEvaluator(&'static str);

#[async_trait]
impl LanguageModel for CannedEvaluator {
    fn model_name(&self) -> &str {
        "canned"
    }
    async fn complete(&self, _prompt: &Prompt) -> Result<String> {
        Ok(self.0.to_string())
    }
}

fn write_corpus(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("france.md"),
        "# France\n\nParis is the capital of France. It sits on the Seine.",
    )
    .unwrap();
    fs::write(
        dir.join("rust.txt"),
        "Rust guarantees memory safety through ownership and borrowing.",
    )
    .unwrap();
    fs::write(dir.join("cooking.py"), "# boil pasta in salted water\nprint('pasta')").unwrap();
}

fn config_for(dir: &Path) -> Config {
    parse_config(&format!(
        "[data]\ndir = \"{}\"\n\n[embedding]\nbatch_size = 2\n",
        dir.display()
    ))
    .unwrap()
}

struct Harness {
    _tmp: TempDir,
    llm: Arc<ContextBoundModel>,
    service: RagService<HashEmbedder>,
}

fn harness_with_evaluator(evaluator: Arc<dyn LanguageModel>) -> Harness {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    write_corpus(&data);
    let llm = Arc::new(ContextBoundModel::default());
    let service = RagService::new(
        &config_for(&data),
        llm.clone(),
        evaluator,
        HashEmbedder::default(),
    )
    .unwrap();
    Harness {
        _tmp: tmp,
        llm,
        service,
    }
}

fn harness() -> Harness {
    harness_with_evaluator(Arc::new(CannedEvaluator(
        r#"{"score": 9, "reason": "correct"}"#,
    )))
}

#[tokio::test]
async fn test_answer_from_documents() {
    let h = harness();
    assert!(!h.service.is_index_built());

    let answer = h.service.answer("What is the capital of France?").await.unwrap();
    assert_eq!(answer, "Paris");
    assert!(h.service.is_index_built());
    // decide, keywords, summarize, decide, final
    assert_eq!(h.llm.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_trace_records_cycles() {
    let h = harness();
    let trace = h
        .service
        .run_with_trace("What is the capital of France?", Mode::Answer, 3)
        .await
        .unwrap();
    assert_eq!(trace.output, "Paris");
    assert!(trace.early_exit);
    assert_eq!(trace.cycles.len(), 2);
    assert_eq!(trace.cycles[0].keywords.as_deref(), Some("capital France"));
    assert_eq!(trace.cycles[0].chunks_used, 3);
    assert_eq!(trace.context.summaries(), ["France's capital is Paris.".to_string()]);
}

#[tokio::test]
async fn test_hint_mode() {
    let h = harness();
    let hint = h.service.hint("What is the capital of France?").await.unwrap();
    assert_eq!(hint, "Which city hosts the French government?");
}

#[tokio::test]
async fn test_single_cycle_budget_still_answers() {
    let h = harness();
    let answer = h
        .service
        .run("What is the capital of France?", Mode::Answer, 1)
        .await
        .unwrap();
    assert_eq!(answer, "Paris");
    // decide, keywords, summarize, final
    assert_eq!(h.llm.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_answer_and_evaluate() {
    let h = harness();
    let scored = h
        .service
        .answer_and_evaluate("  What is the capital of France?  ")
        .await
        .unwrap();
    assert_eq!(scored.question, "What is the capital of France?");
    assert_eq!(scored.answer, "Paris");
    assert_eq!(scored.score, 9);
    assert_eq!(scored.reason, "correct");
}

#[tokio::test]
async fn test_malformed_evaluation_falls_back() {
    let h = harness_with_evaluator(Arc::new(CannedEvaluator("9/10, great answer")));
    let eval = h.service.evaluate("Q?", "A.").await.unwrap();
    assert_eq!(eval, EvalResult::fallback());
    assert_eq!(eval.score, 1);
    assert_eq!(eval.reason, "parse failure");
}

#[tokio::test]
async fn test_blank_question_touches_nothing() {
    let h = harness();
    let err = h.service.answer("   ").await.unwrap_err();
    assert!(matches!(err, RagError::InvalidInput(_)));
    assert!(!h.service.is_index_built());
    assert_eq!(h.llm.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_chat_is_direct() {
    let h = harness();
    assert_eq!(h.service.chat(" hello ").await.unwrap(), "echo: hello");
    assert!(!h.service.is_index_built());
    assert!(matches!(
        h.service.chat("").await,
        Err(RagError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_warm_up_reports_stats() {
    let h = harness();
    let stats = h.service.warm_up().await.unwrap();
    assert_eq!(stats.documents, 3);
    assert_eq!(stats.chunks, 3);
    assert_eq!(stats.indexed, 3);
}

#[test]
fn test_run_blocking() {
    let h = harness();
    let answer = h
        .service
        .run_blocking("What is the capital of France?", Mode::Answer, 3)
        .unwrap();
    assert_eq!(answer, "Paris");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_index_builds_once_under_concurrency() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    write_corpus(&data);
    let embedder = Arc::new(HashEmbedder::default());
    let shared = Arc::new(SharedIndex::new(
        IndexSettings::from_config(&config_for(&data)),
        embedder.clone(),
    ));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let shared = shared.clone();
        handles.push(tokio::spawn(async move { shared.get().await.map(|i| i.len()) }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 3);
    }

    assert_eq!(embedder.texts_embedded.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_failed_build_is_retried() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("later");
    let shared = SharedIndex::new(
        IndexSettings::from_config(&config_for(&data)),
        Arc::new(HashEmbedder::default()),
    );

    assert!(shared.get().await.is_err());
    assert!(!shared.is_built());

    write_corpus(&data);
    assert_eq!(shared.get().await.unwrap().len(), 3);
    assert!(shared.is_built());
}

#[tokio::test]
async fn test_retrieval_failure_surfaces_as_adapter_error() {
    let tmp = TempDir::new().unwrap();
    let llm: Arc<dyn LanguageModel> = Arc::new(ContextBoundModel::default());
    let service = RagService::new(
        &config_for(&tmp.path().join("missing")),
        llm.clone(),
        llm,
        HashEmbedder::default(),
    )
    .unwrap();

    let err = service.answer("What is the capital of France?").await.unwrap_err();
    assert!(matches!(err, RagError::Adapter(_)));
    assert!(err.to_string().contains("does not exist"));
}

/// Decides it can answer, then replies with whitespace to everything else.
struct BlankModel;

#[async_trait]
impl LanguageModel for BlankModel {
    fn model_name(&self) -> &str {
        "blank"
    }
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        if prompt.system.is_some() {
            return Ok("CAN_ANSWER".to_string());
        }
        Ok("   \n".to_string())
    }
}

#[tokio::test]
async fn test_blank_final_answer_is_adapter_error() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    write_corpus(&data);
    let service = RagService::new(
        &config_for(&data),
        Arc::new(BlankModel),
        Arc::new(CannedEvaluator(r#"{"score": 9, "reason": "correct"}"#)),
        HashEmbedder::default(),
    )
    .unwrap();

    let err = service
        .answer_and_evaluate("What is the capital of France?")
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Adapter(_)));
    assert!(!err.is_client_error());
    assert!(err.to_string().contains("empty final response"));
}

#[tokio::test]
async fn test_duplicate_documents_embedded_once() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    write_corpus(&data);
    fs::copy(data.join("france.md"), data.join("france-copy.md")).unwrap();

    let embedder = Arc::new(HashEmbedder::default());
    let shared = SharedIndex::new(
        IndexSettings::from_config(&config_for(&data)),
        embedder.clone(),
    );

    let stats = shared.stats().await.unwrap();
    assert_eq!(stats.documents, 4);
    assert_eq!(stats.chunks, 4);
    assert_eq!(stats.indexed, 3);
    assert_eq!(embedder.texts_embedded.load(Ordering::SeqCst), 3);
}
