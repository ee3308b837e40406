//! # csharp-rag - Incremental C# Codebase Ingestion for RAG
//!
//! Breaks C# source files into self-contained, declaration-aware snippets,
//! bounds every snippet to the embedding model's token budget, embeds it and
//! keeps a vector store in sync with the source tree across runs.
//!
//! ## Key Features
//!
//! - **Declaration-Aware Chunking**: tree-sitter C# grammar; one chunk per
//!   member, wrapped in its usings, namespace and type signature
//! - **Token-Bounded Splitting**: recursive line packing with a 5-line overlap
//! - **Incremental Sync**: SHA-256 fingerprints; unchanged files cost no work
//! - **Failure Isolation**: a failed document is rolled back, the run continues
//! - **Dual Database Support**: LanceDB (embedded, default) or Qdrant (external server)
//!
//! ## Architecture
//!
//! ```text
//! source tree ──> FileWalker ──> change detector ──> new / modified / deleted
//!                                                         │
//!                           DataIngestor (per document) <─┘
//!                                  │
//!      declaration extractor ──> chunk builder ──> splitter ──> FastEmbed
//!                                                                   │
//!                                                 LanceDB / Qdrant <┘
//! ```
//!
//! ## Modules
//!
//! - [`client`]: library facade and the ingestion coordinator
//! - [`indexer`]: file walking, change detection, parsing, chunking and splitting
//! - [`embedding`]: FastEmbed embeddings and tokenizer-based token counting
//! - [`vector_db`]: document/chunk store abstraction (LanceDB, Qdrant, in-memory)
//! - [`search`]: semantic search over ingested chunks
//! - [`config`]: configuration management with environment variable support
//! - [`types`]: documents, chunks and run reports
//! - [`error`]: error types
//! - [`paths`]: platform-specific data, cache and config locations
//!
//! ## Usage Example
//!
//! ```no_run
//! use csharp_rag::CodeIndexClient;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = CodeIndexClient::new().await?;
//!     let report = client
//!         .ingest("./MySolution", None, &CancellationToken::new())
//!         .await?;
//!     println!("{} succeeded, {} failed", report.succeeded, report.failed);
//!     Ok(())
//! }
//! ```

/// Library facade, ingestion sources and the ingestion coordinator
pub mod client;

/// Configuration management with environment variable overrides
pub mod config;

/// Embedding generation and token counting
pub mod embedding;

/// Error types and utilities
pub mod error;

/// File walking, change detection, declaration parsing and chunking
pub mod indexer;

/// Platform-specific paths
pub mod paths;

/// Semantic search over ingested chunks
pub mod search;

/// Documents, chunks and reporting types
pub mod types;

/// Document/chunk store abstraction supporting LanceDB and Qdrant
pub mod vector_db;

pub use client::CodeIndexClient;
pub use config::Config;
pub use error::RagError;
pub use types::{Chunk, Document, IngestionProgress, IngestionReport, SearchResult};

/// Version string with build metadata, for `--version` output
pub fn version_info() -> String {
    format!(
        "{} (commit {}, built {}, {} backend)",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("VECTOR_DB_BACKEND")
    )
}
