//! TOML configuration.
//!
//! Everything except `[data]` has defaults, so the smallest valid file is:
//!
//! ```toml
//! [data]
//! dir = "./data"
//! ```
//!
//! See `config/srag.example.toml` for every key.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use socratic_rag_core::store::{SearchParams, SearchStrategy};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub data: DataConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default = "LlmConfig::evaluator_default")]
    pub evaluator: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    /// Directory scanned for source documents.
    pub dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    800
}
fn default_chunk_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Passages requested per retrieval.
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_fetch_k")]
    pub fetch_k: usize,
    #[serde(default = "default_lambda_mult")]
    pub lambda_mult: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            k: default_k(),
            fetch_k: default_fetch_k(),
            lambda_mult: default_lambda_mult(),
        }
    }
}

fn default_strategy() -> String {
    "mmr".to_string()
}
fn default_k() -> usize {
    10
}
fn default_fetch_k() -> usize {
    40
}
fn default_lambda_mult() -> f32 {
    0.5
}

impl RetrievalConfig {
    /// Convert to core search parameters. Assumes the config was validated.
    pub fn search_params(&self) -> Result<SearchParams> {
        Ok(SearchParams {
            strategy: self.strategy.parse::<SearchStrategy>()?,
            fetch_k: self.fetch_k,
            lambda_mult: self.lambda_mult,
        })
    }
}

/// Chat-completion settings. Used for both `[llm]` and `[evaluator]`.
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_chat_model(),
            temperature: 0.0,
            base_url: default_base_url(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Evaluator defaults: a tighter budget than the answering model.
    fn evaluator_default() -> Self {
        Self {
            max_retries: 3,
            timeout_secs: 20,
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dims")]
    pub dims: usize,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dims: default_embedding_dims(),
            base_url: default_base_url(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-large".to_string()
}
fn default_embedding_dims() -> usize {
    3072
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct OrchestratorConfig {
    #[serde(default = "default_max_cycles")]
    pub max_cycles: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_cycles: default_max_cycles(),
        }
    }
}

fn default_max_cycles() -> usize {
    socratic_rag_core::DEFAULT_MAX_CYCLES
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Chunking
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        bail!("chunking.chunk_overlap must be < chunking.chunk_size");
    }

    // Retrieval
    if config.retrieval.k < 1 {
        bail!("retrieval.k must be >= 1");
    }
    if config.retrieval.fetch_k < config.retrieval.k {
        bail!("retrieval.fetch_k must be >= retrieval.k");
    }
    if !(0.0..=1.0).contains(&config.retrieval.lambda_mult) {
        bail!("retrieval.lambda_mult must be in [0.0, 1.0]");
    }
    if let Err(e) = config.retrieval.strategy.parse::<SearchStrategy>() {
        bail!("retrieval.strategy: {}", e);
    }

    // Orchestrator
    if config.orchestrator.max_cycles < 1 {
        bail!("orchestrator.max_cycles must be >= 1");
    }

    // Models
    for (section, llm) in [("llm", &config.llm), ("evaluator", &config.evaluator)] {
        check_provider(section, &llm.provider)?;
        if !(0.0..=2.0).contains(&llm.temperature) {
            bail!("{}.temperature must be in [0.0, 2.0]", section);
        }
    }
    check_provider("embedding", &config.embedding.provider)?;
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.dims == 0 {
        bail!("embedding.dims must be > 0");
    }

    Ok(config)
}

fn check_provider(section: &str, provider: &str) -> Result<()> {
    match provider {
        "openai" => Ok(()),
        other => bail!(
            "Unknown {} provider: '{}'. Only openai is supported.",
            section,
            other
        ),
    }
}
