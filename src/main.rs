//! # Voice Retrieval CLI (`vr`)
//!
//! Manage and query the writing-sample collection from the shell.
//!
//! ## Usage
//!
//! ```bash
//! vr --config ./config/vr.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vr init` | Resolve the backend and create the collection |
//! | `vr status` | Configured vs. serving backend, health, document count |
//! | `vr add <paths..>` | Split text files into passages and store them |
//! | `vr query "<text>"` | Ranked passages for a prompt |
//! | `vr clear` | Remove every document from the collection |
//!
//! Results are printed to stdout as JSON. Logs go to stderr; set
//! `RUST_LOG=debug` for more detail.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use voice_retrieval::chunk::{split_passages, DEFAULT_MAX_CHARS};
use voice_retrieval::config;
use voice_retrieval::retrieval::Retrieval;
use voice_retrieval::Document;

/// Voice Retrieval CLI: store writing samples and retrieve the passages
/// closest to a prompt.
#[derive(Parser)]
#[command(
    name = "vr",
    version,
    about = "Store writing samples and retrieve passages in your own voice"
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/vr.toml`. A missing file means built-in
    /// defaults: the flat-file backend under `./vector_store`.
    #[arg(long, global = true, default_value = "./config/vr.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the backend and create the collection if needed.
    Init,

    /// Show configured and serving backend, health, and document count.
    Status,

    /// Add text files as writing samples.
    ///
    /// Each file is split on paragraph boundaries into passages of at most
    /// `--max-chars` characters; every passage becomes one document tagged
    /// with its source path.
    Add {
        /// Files to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Maximum passage length in characters.
        #[arg(long, default_value_t = DEFAULT_MAX_CHARS)]
        max_chars: usize,
    },

    /// Retrieve the passages most relevant to a prompt.
    Query {
        /// Prompt text.
        query: String,

        /// Number of results (defaults to `store.default_results`).
        #[arg(short = 'n', long)]
        n_results: Option<usize>,
    },

    /// Remove every document from the collection.
    Clear,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_passages(path: &Path, max_chars: usize) -> Result<Vec<Document>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read sample: {}", path.display()))?;
    let source = path.display().to_string();
    let docs = split_passages(&text, max_chars)
        .into_iter()
        .enumerate()
        .map(|(index, passage)| {
            Document::new(uuid::Uuid::new_v4().to_string(), passage)
                .with_metadata("source", source.clone())
                .with_metadata("passage", index)
        })
        .collect();
    Ok(docs)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let configured = cfg.store.kind();
    let retrieval = Retrieval::from_config(cfg);

    match cli.command {
        Commands::Init => {
            retrieval.init().await?;
            let info = retrieval.get_or_create_collection().await?;
            print_json(&json!({
                "backend": retrieval.backend_kind().await?,
                "collection": info.name,
                "count": info.count,
            }))?;
        }
        Commands::Status => {
            let serving = retrieval.backend_kind().await?;
            let info = retrieval.get_or_create_collection().await?;
            print_json(&json!({
                "configured": configured,
                "backend": serving,
                "degraded": serving != configured,
                "healthy": retrieval.health_check().await,
                "collection": info.name,
                "count": info.count,
            }))?;
        }
        Commands::Add { paths, max_chars } => {
            let mut docs = Vec::new();
            for path in &paths {
                docs.extend(read_passages(path, max_chars)?);
            }
            retrieval
                .add_documents(&docs)
                .await
                .context("Failed to add documents")?;
            let info = retrieval.get_or_create_collection().await?;
            print_json(&json!({
                "files": paths.len(),
                "added": docs.len(),
                "count": info.count,
            }))?;
        }
        Commands::Query { query, n_results } => {
            let result = retrieval
                .query_documents(&query, n_results)
                .await
                .context("Query failed")?;
            print_json(&serde_json::to_value(&result)?)?;
        }
        Commands::Clear => {
            retrieval.clear_collection().await?;
            print_json(&json!({ "cleared": true }))?;
        }
    }

    retrieval.factory().reset().await;
    Ok(())
}
