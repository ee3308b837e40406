//! `csharp-rag` command line interface
//!
//! ```bash
//! csharp-rag ingest ./MySolution
//! csharp-rag search "retry with backoff" --document Services/ --limit 5
//! csharp-rag delete ./MySolution src/Legacy/OldClient.cs
//! csharp-rag stats
//! csharp-rag config
//! ```
//!
//! Exits with 2 on invalid input or configuration, 75 when a retry may help
//! (embedding timeout, store unreachable) and 1 on any other failure.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use csharp_rag::client::{DataIngestor, ProgressCallback};
use csharp_rag::{CodeIndexClient, Config, IngestionProgress};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "csharp-rag",
    version,
    about = "Incremental ingestion and semantic search of C# codebases"
)]
struct Cli {
    /// Path to configuration file (TOML)
    #[arg(long, global = true, env = "CSHARP_RAG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize the store with the C# files under ROOT
    Ingest {
        root: PathBuf,

        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove one document and its chunks
    Delete {
        root: PathBuf,

        /// Path relative to ROOT, or an absolute path inside it
        relative_path: String,
    },

    /// Search ingested chunks
    Search {
        query: String,

        /// Only documents whose relative path contains this text
        #[arg(long)]
        document: Option<String>,

        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show document and chunk counts
    Stats,

    /// Print the effective configuration
    Config,
}

/// Resolve a user-supplied document path to the stored `/`-separated form
fn relative_to_root(root: &Path, path: &str) -> Result<String> {
    let candidate = Path::new(path);
    if !candidate.is_absolute() {
        return Ok(path.replace('\\', "/"));
    }
    let root = CodeIndexClient::normalize_root(root)?;
    let relative = candidate
        .strip_prefix(&root)
        .with_context(|| format!("{} is not inside {}", path, root.display()))?;
    Ok(csharp_rag::indexer::normalize_path(relative))
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing current document");
            child.cancel();
        }
    });
    token
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(csharp_rag::error::exit_status(&e))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!("csharp-rag {}", csharp_rag::version_info());

    match cli.command {
        Commands::Ingest { root, json } => {
            let client = CodeIndexClient::with_config(config).await?;
            let token = cancel_on_ctrl_c();
            let on_progress = |p: &IngestionProgress| {
                tracing::debug!("{:.0}% done", p.fraction() * 100.0);
            };
            let report = client
                .ingest(&root, Some(&on_progress as &ProgressCallback), &token)
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{} succeeded, {} failed, {} deleted, {} unchanged, {} chunks in {} ms{}",
                    report.succeeded,
                    report.failed,
                    report.deleted,
                    report.unchanged,
                    report.chunks_created,
                    report.duration_ms,
                    if report.cancelled { " (cancelled)" } else { "" }
                );
                for error in &report.errors {
                    println!("  error: {}", error);
                }
            }
        }
        Commands::Delete {
            root,
            relative_path,
        } => {
            let relative_path = relative_to_root(&root, &relative_path)?;
            let store = CodeIndexClient::open_store(&config).await?;
            let removed = DataIngestor::new(store.clone())
                .delete_document_and_chunks(&relative_path)
                .await?;
            store.flush().await?;
            println!("Removed {} document record(s) for {}", removed, relative_path);
        }
        Commands::Search {
            query,
            document,
            limit,
            json,
        } => {
            let client = CodeIndexClient::with_config(config).await?;
            let results = client.search(&query, document.as_deref(), limit).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                println!("No results");
            } else {
                for result in &results {
                    let chunk = &result.chunk;
                    println!(
                        "{:.3}  {}  {}.{}{}",
                        result.score,
                        result.relative_path,
                        if chunk.namespace.is_empty() {
                            chunk.type_name.clone()
                        } else {
                            format!("{}.{}", chunk.namespace, chunk.type_name)
                        },
                        chunk.method_name.as_deref().unwrap_or("<type>"),
                        if chunk.oversized { " [oversized]" } else { "" }
                    );
                    for line in chunk.snippet.lines() {
                        println!("    {}", line);
                    }
                    println!();
                }
            }
        }
        Commands::Stats => {
            let store = CodeIndexClient::open_store(&config).await?;
            let stats = store.statistics().await?;
            println!("documents: {}", stats.documents);
            println!("chunks:    {}", stats.chunks);
        }
        Commands::Config => {
            print!(
                "{}",
                toml::to_string_pretty(&config).context("Failed to serialize configuration")?
            );
        }
    }

    Ok(())
}
