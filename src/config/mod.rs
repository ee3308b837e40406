/// Configuration system for csharp-rag
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ConfigError, RagError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Vector database configuration
    #[serde(default)]
    pub vector_db: VectorDbConfig,

    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Tokenizer used to measure chunk sizes
    #[serde(default)]
    pub tokenizer: TokenizerConfig,

    /// Token budget and overlap for the splitter
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Which files under the root are ingested
    #[serde(default)]
    pub source: SourceConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDbConfig {
    /// Database backend: "lancedb" or "qdrant"
    #[serde(default = "default_db_backend")]
    pub backend: String,

    /// LanceDB data directory path
    #[serde(default = "default_lancedb_path")]
    pub lancedb_path: PathBuf,

    /// Qdrant server URL
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,

    /// Table/collection holding document records
    #[serde(default = "default_documents_collection")]
    pub documents_collection: String,

    /// Table/collection holding chunk records and their vectors
    #[serde(default = "default_chunks_collection")]
    pub chunks_collection: String,
}

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name (e.g., "all-MiniLM-L6-v2", "nomic-embed-text-v1.5")
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Timeout in seconds for a single embedding call
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// HuggingFace `tokenizer.json` matching the embedding model
    #[serde(default = "default_vocab_path")]
    pub vocab_path: PathBuf,

    /// Task prompt for models that expect one (e.g. `search_document: `)
    ///
    /// Counted by the tokenizer and prepended to every chunk sent to the
    /// embedding model. Stored snippets never carry it.
    #[serde(default)]
    pub prompt_prefix: String,

    /// Count special tokens (BOS/EOS, CLS/SEP) as part of the budget
    #[serde(default = "default_add_special_tokens")]
    pub add_special_tokens: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum tokens per emitted chunk
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Lines of the previous window repeated at the start of the next
    #[serde(default = "default_overlap_lines")]
    pub overlap_lines: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Glob matched against each file's path relative to the root
    #[serde(default = "default_include_pattern")]
    pub include_pattern: String,

    /// Path substrings that exclude a file (matched on `/`-separated paths)
    #[serde(default = "default_exclude_fragments")]
    pub exclude_fragments: Vec<String>,

    /// Maximum file size to ingest (in bytes)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default minimum similarity score (0.0 to 1.0)
    #[serde(default = "default_min_score")]
    pub min_score: f32,

    /// Default result limit
    #[serde(default = "default_result_limit")]
    pub limit: usize,
}

// Default value functions
fn default_db_backend() -> String {
    #[cfg(feature = "qdrant-backend")]
    return "qdrant".to_string();
    #[cfg(not(feature = "qdrant-backend"))]
    return "lancedb".to_string();
}

fn default_lancedb_path() -> PathBuf {
    crate::paths::PlatformPaths::default_lancedb_path()
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".to_string()
}

fn default_documents_collection() -> String {
    "csharp_documents".to_string()
}

fn default_chunks_collection() -> String {
    "csharp_chunks".to_string()
}

fn default_model_name() -> String {
    "nomic-embed-text-v1.5".to_string()
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_vocab_path() -> PathBuf {
    crate::paths::PlatformPaths::default_vocab_path()
}

fn default_add_special_tokens() -> bool {
    true
}

fn default_max_tokens() -> usize {
    256
}

fn default_overlap_lines() -> usize {
    5
}

fn default_include_pattern() -> String {
    "**/*.cs".to_string()
}

fn default_exclude_fragments() -> Vec<String> {
    vec![
        ".g.cs".to_string(),
        "/obj/".to_string(),
        "/AssemblyInfo.cs".to_string(),
        "/packages/".to_string(),
    ]
}

fn default_max_file_size() -> usize {
    1_048_576 // 1 MB
}

fn default_min_score() -> f32 {
    0.0
}

fn default_result_limit() -> usize {
    10
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            backend: default_db_backend(),
            lancedb_path: default_lancedb_path(),
            qdrant_url: default_qdrant_url(),
            documents_collection: default_documents_collection(),
            chunks_collection: default_chunks_collection(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            vocab_path: default_vocab_path(),
            prompt_prefix: String::new(),
            add_special_tokens: default_add_special_tokens(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            overlap_lines: default_overlap_lines(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            include_pattern: default_include_pattern(),
            exclude_fragments: default_exclude_fragments(),
            max_file_size: default_max_file_size(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            limit: default_result_limit(),
        }
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> RagError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
    .into()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, RagError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or create default
    pub fn load_or_default() -> Result<Self, RagError> {
        let config_path = crate::paths::PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), RagError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), RagError> {
        if self.vector_db.backend != "lancedb" && self.vector_db.backend != "qdrant" {
            return Err(invalid(
                "vector_db.backend",
                format!(
                    "must be 'lancedb' or 'qdrant', got '{}'",
                    self.vector_db.backend
                ),
            ));
        }

        if self.vector_db.documents_collection.trim().is_empty() {
            return Err(invalid("vector_db.documents_collection", "must not be empty"));
        }

        if self.vector_db.chunks_collection.trim().is_empty() {
            return Err(invalid("vector_db.chunks_collection", "must not be empty"));
        }

        if self.vector_db.documents_collection == self.vector_db.chunks_collection {
            return Err(invalid(
                "vector_db.chunks_collection",
                "must differ from vector_db.documents_collection",
            ));
        }

        if self.embedding.timeout_secs == 0 {
            return Err(invalid("embedding.timeout_secs", "must be greater than 0"));
        }

        if self.chunking.max_tokens == 0 {
            return Err(invalid("chunking.max_tokens", "must be greater than 0"));
        }

        if self.source.include_pattern.trim().is_empty() {
            return Err(invalid("source.include_pattern", "must not be empty"));
        }

        if let Err(e) = globset::Glob::new(&self.source.include_pattern) {
            return Err(invalid("source.include_pattern", e.to_string()));
        }

        if self.source.max_file_size == 0 {
            return Err(invalid("source.max_file_size", "must be greater than 0"));
        }

        if !(0.0..=1.0).contains(&self.search.min_score) {
            return Err(invalid(
                "search.min_score",
                format!("must be between 0.0 and 1.0, got {}", self.search.min_score),
            ));
        }

        if self.search.limit == 0 {
            return Err(invalid("search.limit", "must be greater than 0"));
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(backend) = std::env::var("CSHARP_RAG_DB_BACKEND") {
            self.vector_db.backend = backend;
        }

        if let Ok(path) = std::env::var("CSHARP_RAG_LANCEDB_PATH") {
            self.vector_db.lancedb_path = PathBuf::from(path);
        }

        if let Ok(url) = std::env::var("CSHARP_RAG_QDRANT_URL") {
            self.vector_db.qdrant_url = url;
        }

        if let Ok(model) = std::env::var("CSHARP_RAG_MODEL") {
            self.embedding.model_name = model;
        }

        if let Ok(path) = std::env::var("CSHARP_RAG_VOCAB_PATH") {
            self.tokenizer.vocab_path = PathBuf::from(path);
        }

        if let Ok(prefix) = std::env::var("CSHARP_RAG_PROMPT_PREFIX") {
            self.tokenizer.prompt_prefix = prefix;
        }

        if let Ok(max_tokens) = std::env::var("CSHARP_RAG_MAX_TOKENS")
            && let Ok(value) = max_tokens.parse()
        {
            self.chunking.max_tokens = value;
        }

        if let Ok(overlap) = std::env::var("CSHARP_RAG_OVERLAP_LINES")
            && let Ok(value) = overlap.parse()
        {
            self.chunking.overlap_lines = value;
        }

        if let Ok(min_score) = std::env::var("CSHARP_RAG_MIN_SCORE")
            && let Ok(score) = min_score.parse()
        {
            self.search.min_score = score;
        }
    }

    /// Create a new Config with defaults and environment overrides
    pub fn new() -> Result<Self, RagError> {
        let mut config = Self::load_or_default()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit file (when given) and apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, RagError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::load_or_default()?,
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests;
