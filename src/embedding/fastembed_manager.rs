use super::EmbeddingProvider;
use crate::error::{ConfigError, EmbeddingError};
use anyhow::{Context, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Mutex;

/// FastEmbed-based embedding provider
pub struct FastEmbedManager {
    // `TextEmbedding::embed` needs `&mut self`
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

/// Map a configured model name to the FastEmbed model and its dimension
pub fn resolve_model(name: &str) -> Result<(EmbeddingModel, usize), ConfigError> {
    let key = name.trim().to_lowercase();
    let key = key.strip_prefix("baai/").unwrap_or(&key);
    let key = key.strip_prefix("nomic-ai/").unwrap_or(key);
    let key = key.strip_prefix("sentence-transformers/").unwrap_or(key);

    match key {
        "all-minilm-l6-v2" => Ok((EmbeddingModel::AllMiniLML6V2, 384)),
        "all-minilm-l12-v2" => Ok((EmbeddingModel::AllMiniLML12V2, 384)),
        "bge-small-en-v1.5" => Ok((EmbeddingModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" => Ok((EmbeddingModel::BGEBaseENV15, 768)),
        "bge-large-en-v1.5" => Ok((EmbeddingModel::BGELargeENV15, 1024)),
        "nomic-embed-text-v1" => Ok((EmbeddingModel::NomicEmbedTextV1, 768)),
        "nomic-embed-text-v1.5" => Ok((EmbeddingModel::NomicEmbedTextV15, 768)),
        _ => Err(ConfigError::InvalidValue {
            key: "embedding.model_name".to_string(),
            reason: format!(
                "unknown model '{}'; supported: all-MiniLM-L6-v2, all-MiniLM-L12-v2, \
                 bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
                 nomic-embed-text-v1, nomic-embed-text-v1.5",
                name
            ),
        }),
    }
}

impl FastEmbedManager {
    /// Small 384-dim model (all-MiniLM-L6-v2), handy for tests and quick runs
    pub fn new() -> Result<Self> {
        Self::from_model_name("all-MiniLM-L6-v2", None)
    }

    /// Create a manager for a configured model name, caching downloads in `cache_dir`
    pub fn from_model_name(name: &str, cache_dir: Option<PathBuf>) -> Result<Self> {
        let (model, dimension) = resolve_model(name)?;
        tracing::info!("Initializing FastEmbed model: {:?} ({} dims)", model, dimension);

        let mut options = InitOptions::new(model).with_show_download_progress(true);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }

        let embedding_model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::InitializationFailed(format!("{}: {:#}", name, e)))?;

        Ok(Self {
            model: Mutex::new(embedding_model),
            model_name: name.to_string(),
            dimension,
        })
    }
}

impl EmbeddingProvider for FastEmbedManager {
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        tracing::debug!("Generating embeddings for {} texts", texts.len());

        let mut model = self
            .model
            .lock()
            .map_err(|_| anyhow::anyhow!("embedding model lock poisoned"))?;
        let embeddings = model
            .embed(texts, None)
            .context("Failed to generate embeddings")?;

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
