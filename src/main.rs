//! # passage-qa CLI (`pqa`)
//!
//! The `pqa` binary is the primary interface for passage-qa. It provides
//! commands for database initialization, corpus ingestion, asking questions
//! from the terminal, and starting the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! pqa --config ./config/qa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pqa init` | Create the SQLite database and run schema migrations |
//! | `pqa ingest` | Extract, chunk, index, and embed the PDF corpus |
//! | `pqa ask "<question>"` | Answer a question from the terminal |
//! | `pqa serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! pqa init --config ./config/qa.toml
//!
//! # Rebuild the corpus from sources.json
//! pqa ingest --config ./config/qa.toml
//!
//! # Ask with the fused ranking (default)
//! pqa ask "What protection is required in zone 4?"
//!
//! # Compare against raw vector retrieval
//! pqa ask "What protection is required in zone 4?" --mode baseline
//!
//! # Start the HTTP server
//! pqa serve --config ./config/qa.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use passage_qa::{config, ingest, migrate, server, service::QaService};

/// passage-qa CLI: extractive question answering over local document
/// corpora with hybrid retrieval.
#[derive(Parser)]
#[command(
    name = "pqa",
    about = "Extractive question answering with hybrid (keyword + semantic) retrieval",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/qa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (sources, chunks, chunk_vectors, chunks_fts). Idempotent.
    Init,

    /// Ingest the PDF corpus.
    ///
    /// Reads the sources manifest, extracts per-page text, chunks with
    /// page tracking, rebuilds the FTS index, and embeds every chunk.
    /// Fully replaces the previous corpus.
    Ingest {
        /// Show source and chunk counts without writing to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Answer a question from the terminal.
    Ask {
        /// The natural language question.
        question: String,

        /// Number of contexts to retrieve (clamped to 1..=20).
        #[arg(long)]
        k: Option<i64>,

        /// Search mode: `hybrid` (fused ranking) or `baseline` (raw vector).
        #[arg(long, default_value = "hybrid")]
        mode: String,
    },

    /// Start the HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and exposes
    /// `POST /ask` and `GET /health`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { dry_run } => {
            ingest::run_ingest(&cfg, dry_run).await?;
        }
        Commands::Ask { question, k, mode } => {
            let question = question.trim().to_string();
            if question.is_empty() {
                anyhow::bail!("question must not be empty");
            }
            let service = QaService::connect(&cfg).await?;
            let k = k.unwrap_or(cfg.retrieval.answer_top_k);
            let payload = service.ask(&question, k, &mode).await?;
            print_payload(&payload);
        }
        Commands::Serve => {
            let service = Arc::new(QaService::connect(&cfg).await?);
            server::run_server(&cfg, service).await?;
        }
    }

    Ok(())
}

fn print_payload(payload: &passage_qa::models::AnswerPayload) {
    match &payload.answer {
        Some(answer) => println!("{}", answer),
        None => println!("(no answer: confidence below threshold)"),
    }
    println!();
    for (i, ctx) in payload.contexts.iter().enumerate() {
        let pages = match (ctx.page_start, ctx.page_end) {
            (Some(a), Some(b)) if a != b => format!(" pp. {}-{}", a, b),
            (Some(a), _) => format!(" p. {}", a),
            _ => String::new(),
        };
        println!(
            "{}. [{:.4}] {} / chunk {}{}",
            i + 1,
            ctx.score,
            ctx.source_title,
            ctx.chunk_index,
            pages
        );
        let excerpt: String = ctx.text.chars().take(160).collect();
        println!("    \"{}\"", excerpt.replace('\n', " "));
    }
}
