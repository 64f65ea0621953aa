use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pdfqa_ai::index::LockStatus;
use pdfqa_core::config::PdfqaConfig;
use pdfqa_core::pdf::PdfInput;
use pdfqa_lib::{ollama_client, PdfQa};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pdfqa", version, about = "Ask questions about your PDF documents")]
struct Cli {
    /// TOML config file (defaults are used when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Index directory, overrides `index_location` from the config
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    /// Completion model, overrides `completion_model`
    #[arg(long, global = true)]
    model: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract text from PDFs and rebuild the index from scratch
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Answer a question, from the documents when they are relevant
    Ask {
        #[arg(required = true)]
        question: Vec<String>,

        /// Number of chunks to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Show what the stored index contains
    Status,
    /// Check that the model server is reachable
    Health,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "pdfqa=debug,pdfqa_lib=debug,pdfqa_ai=debug,pdfqa_core=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = PdfqaConfig::load(cli.config.as_deref())?;
    if let Some(index) = cli.index {
        config.index_location = index;
    }
    if let Some(model) = cli.model {
        config.completion_model = model;
    }
    config.validate()?;

    match cli.command {
        Command::Ingest { files } => {
            let mut docs = Vec::with_capacity(files.len());
            for path in &files {
                let bytes = fs::read(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                docs.push(PdfInput::new(path.display().to_string(), bytes));
            }
            let app = PdfQa::with_ollama(config)?;
            let summary = app.ingest_pdfs(&docs)?;
            println!(
                "Indexed {} chunk(s) from {} document(s) ({} page(s) with text) into {}",
                summary.chunk_count,
                summary.documents,
                summary.pages_with_text,
                summary.index_location
            );
        }
        Command::Ask { question, top_k } => {
            let app = PdfQa::with_ollama(config)?;
            let question = question.join(" ");
            let top_k = top_k.unwrap_or(app.config().top_k).clamp(1, 50);
            println!("{}", app.ask_with_top_k(&question, top_k));
        }
        Command::Status => {
            let app = PdfQa::with_ollama(config)?;
            let status = app.status()?;
            if status.manifest.is_none() {
                println!("No index at {}", app.config().index_location.display());
            }
            match status.lock {
                LockStatus::Unlocked => {}
                LockStatus::Held { .. } => println!("An ingestion is currently running"),
                LockStatus::Stale { pid } => println!(
                    "Lock left by exited process {pid}; the next ingest will reclaim it"
                ),
            }
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Health => {
            ollama_client(&config)?.health_check()?;
            println!("Model server reachable at {}", config.ollama_url);
        }
    }
    Ok(())
}
