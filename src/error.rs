/// Centralized error types for csharp-rag using thiserror
///
/// Domain errors are grouped per collaborator so the ingestion coordinator can
/// tell a startup failure (configuration) from a per-document failure.
use thiserror::Error;

/// Main error type for the ingestion system
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector database error: {0}")]
    VectorDb(#[from] VectorDbError),

    #[error("Indexing error: {0}")]
    Indexing(#[from] IndexingError),

    #[error("Chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors related to embedding generation and token counting
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Failed to initialize embedding model: {0}")]
    InitializationFailed(String),

    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),

    #[error("Embedding generation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding provider returned no vector for the input")]
    MissingVector,

    #[error("Failed to count tokens: {0}")]
    TokenizationFailed(String),
}

/// Errors related to vector database operations
#[derive(Error, Debug)]
pub enum VectorDbError {
    #[error("Failed to connect to vector database: {0}")]
    ConnectionFailed(String),

    #[error("Failed to create collection '{collection}': {reason}")]
    CollectionCreationFailed { collection: String, reason: String },

    #[error("Collection '{0}' not found")]
    CollectionNotFound(String),

    #[error("Failed to store records: {0}")]
    StoreFailed(String),

    #[error("Failed to query records: {0}")]
    QueryFailed(String),

    #[error("Failed to search embeddings: {0}")]
    SearchFailed(String),

    #[error("Failed to delete records: {0}")]
    DeleteFailed(String),
}

/// Errors related to walking and fingerprinting the source tree
#[derive(Error, Debug)]
pub enum IndexingError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Path is not a directory: {0}")]
    NotADirectory(String),

    #[error("Failed to walk directory: {0}")]
    WalkFailed(String),

    #[error("Failed to read file '{file}': {reason}")]
    FileReadFailed { file: String, reason: String },

    #[error("File is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("Indexing was cancelled")]
    Cancelled,
}

/// Errors related to declaration extraction and chunk construction
#[derive(Error, Debug)]
pub enum ChunkingError {
    #[error("Failed to parse code: {0}")]
    ParseFailed(String),

    #[error("Invalid token budget: {0}")]
    InvalidTokenBudget(String),
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Tokenizer vocabulary not found at: {0}")]
    VocabularyNotFound(String),
}

/// Errors related to input validation
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Path does not exist: {0}")]
    PathNotFound(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Empty {0}")]
    Empty(String),
}

impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        RagError::Other(format!("{:#}", err))
    }
}

impl RagError {
    /// Check if this is a user error (validation, bad config value) vs system error
    pub fn is_user_error(&self) -> bool {
        match self {
            RagError::Validation(_) => true,
            RagError::Config(e) => e.is_user_error(),
            _ => false,
        }
    }

    /// Check if this error is retryable
    ///
    /// The coordinator never retries on its own; a later run may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            RagError::VectorDb(e) => e.is_retryable(),
            RagError::Embedding(e) => e.is_retryable(),
            RagError::Io(_) => true,
            _ => false,
        }
    }
}

impl EmbeddingError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, EmbeddingError::Timeout(_))
    }
}

impl VectorDbError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, VectorDbError::ConnectionFailed(_))
    }
}

impl ConfigError {
    pub fn is_user_error(&self) -> bool {
        matches!(self, ConfigError::InvalidValue { .. })
    }
}

/// Exit status for a command that failed with `err`
///
/// Walks the whole context chain, since domain errors usually sit below
/// `anyhow` context. User errors give 2, retryable ones 75 (`EX_TEMPFAIL`),
/// anything else 1.
pub fn exit_status(err: &anyhow::Error) -> u8 {
    let mut retryable = false;
    for cause in err.chain() {
        let (user, retry) = if let Some(e) = cause.downcast_ref::<RagError>() {
            (e.is_user_error(), e.is_retryable())
        } else if cause.is::<ValidationError>() {
            (true, false)
        } else if let Some(e) = cause.downcast_ref::<ConfigError>() {
            (e.is_user_error(), false)
        } else if let Some(e) = cause.downcast_ref::<EmbeddingError>() {
            (false, e.is_retryable())
        } else if let Some(e) = cause.downcast_ref::<VectorDbError>() {
            (false, e.is_retryable())
        } else {
            (false, cause.is::<std::io::Error>())
        };
        if user {
            return 2;
        }
        retryable |= retry;
    }
    if retryable { 75 } else { 1 }
}
