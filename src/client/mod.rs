//! Library facade for csharp-rag
//!
//! Wires configuration to the concrete collaborators (tree-sitter extractor,
//! HuggingFace tokenizer, FastEmbed model and vector store) and exposes
//! ingestion, deletion, search and statistics.

use crate::config::Config;
use crate::embedding::{EmbeddingProvider, FastEmbedManager, HfTokenCounter, TokenCounter};
use crate::error::ValidationError;
use crate::indexer::{CSharpDeclarationExtractor, CodeSplitter, FileWalker};
use crate::search::SemanticSearch;
use crate::types::{IngestionReport, SearchResult, StoreStatistics};
use crate::vector_db::{LanceVectorStore, VectorStore};

#[cfg(feature = "qdrant-backend")]
use crate::vector_db::QdrantVectorStore;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub mod ingestion;
pub mod source;

pub use ingestion::{DataIngestor, ProgressCallback};
pub use source::{CodeDirectorySource, IngestionSource};

/// Main client for ingesting C# sources and searching them
///
/// # Example
///
/// ```no_run
/// use csharp_rag::CodeIndexClient;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = CodeIndexClient::new().await?;
///
///     let report = client
///         .ingest("/path/to/solution", None, &CancellationToken::new())
///         .await?;
///     println!("{} documents updated", report.succeeded);
///
///     for hit in client.search("retry policy", None, None).await? {
///         println!("{:.2} {} {}", hit.score, hit.relative_path, hit.chunk.type_name);
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct CodeIndexClient {
    config: Arc<Config>,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    splitter: Arc<CodeSplitter>,
    // Serializes runs that mutate the store
    write_lock: Arc<Mutex<()>>,
}

impl CodeIndexClient {
    /// Create a client from the default configuration sources
    pub async fn new() -> Result<Self> {
        let config = Config::new().context("Failed to load configuration")?;
        Self::with_config(config).await
    }

    /// Create a client with the shipped collaborators for `config`
    pub async fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        tracing::info!("Initializing client");
        tracing::debug!("Vector DB backend: {}", config.vector_db.backend);
        tracing::debug!("Embedding model: {}", config.embedding.model_name);
        tracing::debug!("Token budget: {}", config.chunking.max_tokens);

        let counter: Arc<dyn TokenCounter> = Arc::new(
            HfTokenCounter::from_config(&config.tokenizer)
                .context("Failed to load tokenizer vocabulary")?,
        );

        let model_name = config.embedding.model_name.clone();
        let cache_dir = crate::paths::PlatformPaths::default_model_cache_dir();
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(
            tokio::task::spawn_blocking(move || {
                FastEmbedManager::from_model_name(&model_name, Some(cache_dir))
            })
            .await
            .context("Embedding model loader panicked")?
            .context("Failed to initialize embedding provider")?,
        );

        let store = Self::open_store(&config).await?;

        Self::from_parts(config, store, counter, embedder)
    }

    /// Assemble a client from explicit collaborators
    pub fn from_parts(
        config: Config,
        store: Arc<dyn VectorStore>,
        counter: Arc<dyn TokenCounter>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let splitter = CodeSplitter::new(
            Arc::new(CSharpDeclarationExtractor),
            counter,
            Arc::clone(&embedder),
            config.chunking.max_tokens,
            config.chunking.overlap_lines,
            config.embedding.timeout_secs,
        )?
        .with_prompt_prefix(config.tokenizer.prompt_prefix.clone());

        Ok(Self {
            config: Arc::new(config),
            store,
            embedder,
            splitter: Arc::new(splitter),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Open the configured vector store without loading any model
    pub async fn open_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
        match config.vector_db.backend.as_str() {
            #[cfg(feature = "qdrant-backend")]
            "qdrant" => {
                tracing::info!(
                    "Using Qdrant vector database backend at {}",
                    config.vector_db.qdrant_url
                );
                Ok(Arc::new(
                    QdrantVectorStore::from_config(&config.vector_db)
                        .await
                        .context("Failed to initialize Qdrant vector database")?,
                ))
            }
            #[cfg(not(feature = "qdrant-backend"))]
            "qdrant" => anyhow::bail!(
                "The qdrant backend requires building with the 'qdrant-backend' feature"
            ),
            _ => {
                tracing::info!(
                    "Using LanceDB vector database backend at {}",
                    config.vector_db.lancedb_path.display()
                );
                Ok(Arc::new(
                    LanceVectorStore::from_config(&config.vector_db)
                        .await
                        .context("Failed to initialize LanceDB vector database")?,
                ))
            }
        }
    }

    /// Canonical form of a source root
    pub fn normalize_root(path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ValidationError::PathNotFound(path.display().to_string()).into());
        }
        std::fs::canonicalize(path)
            .with_context(|| format!("Failed to canonicalize path: {}", path.display()))
    }

    /// Source for the C# files under `root`, filtered by the config
    pub fn source(&self, root: impl AsRef<Path>) -> Result<CodeDirectorySource> {
        let root = Self::normalize_root(root)?;
        let walker = FileWalker::from_config(&root, &self.config.source)?;
        Ok(CodeDirectorySource::new(walker, Arc::clone(&self.splitter)))
    }

    pub fn ingestor(&self) -> DataIngestor {
        DataIngestor::new(Arc::clone(&self.store))
    }

    /// Synchronize the store with the C# files under `root`
    pub async fn ingest(
        &self,
        root: impl AsRef<Path>,
        progress: Option<&ProgressCallback>,
        cancel_token: &CancellationToken,
    ) -> Result<IngestionReport> {
        let source = self.source(root)?;
        let _guard = self.write_lock.lock().await;
        self.ingestor()
            .ingest_all(&source, progress, cancel_token)
            .await
    }

    /// Remove one document and its chunks by relative path
    pub async fn delete_document(&self, relative_path: &str) -> Result<usize> {
        if relative_path.trim().is_empty() {
            return Err(ValidationError::Empty("relative path".to_string()).into());
        }
        let relative_path = relative_path.replace('\\', "/");
        let _guard = self.write_lock.lock().await;
        let removed = self
            .ingestor()
            .delete_document_and_chunks(&relative_path)
            .await?;
        self.store.flush().await?;
        Ok(removed)
    }

    /// Semantic search; `limit` defaults to the configured one
    pub async fn search(
        &self,
        query: &str,
        document_filter: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        SemanticSearch::new(
            Arc::clone(&self.store),
            Arc::clone(&self.embedder),
            self.config.embedding.timeout_secs,
        )
        .with_min_score(self.config.search.min_score)
        .search(
            query,
            document_filter,
            limit.unwrap_or(self.config.search.limit),
        )
        .await
    }

    pub async fn statistics(&self) -> Result<StoreStatistics> {
        self.store
            .statistics()
            .await
            .context("Failed to get statistics")
    }

    /// Get the configuration used by this client
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the embedding dimension used by this client
    pub fn embedding_dimension(&self) -> usize {
        self.embedder.dimension()
    }
}

#[cfg(test)]
mod tests;
