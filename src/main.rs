//! # kbqa CLI
//!
//! Builds the QA chain from `knowledge_base.txt` (or the configured file)
//! and then answers questions typed on stdin until `exit`.
//!
//! ## Usage
//!
//! ```bash
//! kbqa [--config ./kbqa.toml] [--knowledge-base <path>] [--top-k <n>] [--show-sources]
//! ```
//!
//! Without a `--config` flag, `./kbqa.toml` is used if it exists and
//! built-in defaults otherwise. Setup failures exit with status 1.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use kbqa::config::{resolve_config, Config};
use kbqa::logging::{init_tracing, LogFormat};
use kbqa::progress::StdoutProgress;
use kbqa::qa::QaChain;
use kbqa::repl::{run_loop, ReplOptions, READY_MESSAGE};
use kbqa::setup::setup_chain;

/// Ask questions about a text file.
///
/// Splits the knowledge base into chunks, indexes them locally, and answers
/// each question with a hosted language model conditioned on the most
/// relevant chunks.
#[derive(Parser)]
#[command(name = "kbqa", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./kbqa.toml` when that file exists.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Knowledge base file to answer questions from.
    #[arg(long)]
    knowledge_base: Option<PathBuf>,

    /// Number of chunks given to the model per question.
    #[arg(long)]
    top_k: Option<usize>,

    /// Print the retrieved chunks under each answer.
    #[arg(long)]
    show_sources: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(path) = &self.knowledge_base {
            config.knowledge_base.path = path.clone();
        }
        if let Some(top_k) = self.top_k {
            config.retrieval.top_k = top_k;
        }
        if self.show_sources {
            config.retrieval.show_sources = true;
        }
    }
}

async fn prepare(cli: &Cli) -> anyhow::Result<(QaChain, Config)> {
    let mut config = resolve_config(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;
    let chain = setup_chain(&config, &StdoutProgress).await?;
    Ok((chain, config))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing(LogFormat::from_env());
    let cli = Cli::parse();

    let (chain, config) = match prepare(&cli).await {
        Ok(ready) => ready,
        Err(e) => {
            println!("Error during setup: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("{}", READY_MESSAGE);

    let options = ReplOptions {
        show_sources: config.retrieval.show_sources,
    };
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    match run_loop(&chain, stdin.lock(), &mut stdout, &options).await {
        Ok(summary) => {
            tracing::info!(
                questions = summary.questions,
                answered = summary.answered,
                failed = summary.failed,
                "session finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "console I/O failed");
            ExitCode::FAILURE
        }
    }
}
