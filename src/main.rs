//! # Socratic RAG CLI (`srag`)
//!
//! ## Usage
//!
//! ```bash
//! srag --config ./config/srag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `srag ask "<question>"` | Answer from the indexed documents |
//! | `srag hint "<question>"` | Give a Socratic hint instead of the answer |
//! | `srag evaluate --question .. --answer ..` | Score an answer from 1 to 10 |
//! | `srag chat "<message>"` | One direct completion, no retrieval |
//! | `srag index` | Build the index and report counts |
//!
//! Logs go to stderr (`-v`, `-vv`, `-vvv`, or `RUST_LOG`); results go to
//! stdout. Invalid input exits with status 2, any other failure with 1.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use socratic_rag::config::{self, Config};
use socratic_rag::index::{prepare_chunks, IndexSettings};
use socratic_rag::RagService;
use socratic_rag_core::{Mode, Question, RagError};

#[derive(Parser)]
#[command(
    name = "srag",
    about = "Socratic RAG: retrieval-augmented answers and hints from your own documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/srag.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question from the indexed documents.
    Ask {
        question: String,

        /// Maximum retrieve/summarize cycles (defaults to `[orchestrator] max_cycles`).
        #[arg(long)]
        max_cycles: Option<usize>,

        /// Also score the answer and print a JSON record.
        #[arg(long)]
        evaluate: bool,

        /// Print a JSON trace of every cycle instead of the bare answer.
        #[arg(long, conflicts_with = "evaluate")]
        trace: bool,
    },

    /// Give a Socratic hint that leads toward the answer without stating it.
    Hint {
        question: String,

        #[arg(long)]
        max_cycles: Option<usize>,

        #[arg(long)]
        trace: bool,
    },

    /// Score an answer to a question. Prints `{"score", "reason"}` JSON.
    Evaluate {
        #[arg(long)]
        question: String,

        #[arg(long)]
        answer: String,
    },

    /// Send one message straight to the chat model.
    Chat { message: String },

    /// Load, chunk, and embed the data directory, then report counts.
    Index {
        /// Load and chunk only; no embedding calls.
        #[arg(long)]
        dry_run: bool,
    },
}

fn init_tracing(verbose: u8) {
    let filter = if verbose == 0 {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    } else {
        match verbose {
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            match e.downcast_ref::<RagError>() {
                Some(err) if err.is_client_error() => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Ask {
            question,
            max_cycles,
            evaluate,
            trace,
        } => {
            let question = Question::new(&question)?;
            check_cycles(max_cycles)?;
            let cfg = config::load_config(&cli.config)?;
            let service = RagService::from_config(&cfg)?;
            let cycles = max_cycles.unwrap_or_else(|| service.max_cycles());

            if evaluate {
                let scored = service
                    .answer_and_evaluate_with(question.as_str(), cycles)
                    .await?;
                println!("{}", serde_json::to_string_pretty(&scored)?);
            } else if trace {
                let run = service
                    .run_with_trace(question.as_str(), Mode::Answer, cycles)
                    .await?;
                println!("{}", serde_json::to_string_pretty(&run)?);
            } else {
                println!(
                    "{}",
                    service.run(question.as_str(), Mode::Answer, cycles).await?
                );
            }
        }
        Commands::Hint {
            question,
            max_cycles,
            trace,
        } => {
            let question = Question::new(&question)?;
            check_cycles(max_cycles)?;
            let cfg = config::load_config(&cli.config)?;
            let service = RagService::from_config(&cfg)?;
            let cycles = max_cycles.unwrap_or_else(|| service.max_cycles());

            if trace {
                let run = service
                    .run_with_trace(question.as_str(), Mode::Hint, cycles)
                    .await?;
                println!("{}", serde_json::to_string_pretty(&run)?);
            } else {
                println!(
                    "{}",
                    service.run(question.as_str(), Mode::Hint, cycles).await?
                );
            }
        }
        Commands::Evaluate { question, answer } => {
            let question = Question::new(&question)?;
            if answer.trim().is_empty() {
                return Err(RagError::InvalidInput("answer must not be empty".to_string()).into());
            }
            let cfg = config::load_config(&cli.config)?;
            let service = RagService::from_config(&cfg)?;
            let eval = service.evaluate(question.as_str(), &answer).await?;
            println!("{}", serde_json::to_string_pretty(&eval)?);
        }
        Commands::Chat { message } => {
            if message.trim().is_empty() {
                return Err(RagError::InvalidInput("message must not be empty".to_string()).into());
            }
            let cfg = config::load_config(&cli.config)?;
            let service = RagService::from_config(&cfg)?;
            println!("{}", service.chat(&message).await?);
        }
        Commands::Index { dry_run } => {
            let cfg = config::load_config(&cli.config)?;
            run_index(&cfg, dry_run).await?;
        }
    }

    Ok(())
}

fn check_cycles(max_cycles: Option<usize>) -> Result<(), RagError> {
    match max_cycles {
        Some(0) => Err(RagError::InvalidInput(
            "max_cycles must be at least 1".to_string(),
        )),
        _ => Ok(()),
    }
}

async fn run_index(cfg: &Config, dry_run: bool) -> Result<()> {
    if dry_run {
        let settings = IndexSettings::from_config(cfg);
        let (documents, chunks) =
            tokio::task::spawn_blocking(move || prepare_chunks(&settings)).await??;
        println!("index (dry-run)");
        println!("  documents: {}", documents);
        println!("  chunks: {}", chunks.len());
        return Ok(());
    }

    let service = RagService::from_config(cfg)?;
    let stats = service.warm_up().await?;
    println!("index");
    println!("  documents: {}", stats.documents);
    println!("  chunks: {}", stats.chunks);
    println!("  indexed: {}", stats.indexed);
    Ok(())
}
