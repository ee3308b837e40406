use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One tracked source file.
///
/// `relative_path` is the natural key: at most one live document exists per
/// path. A document is never updated in place; a changed file gets a new
/// record with a new id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Time-ordered unique identifier (UUIDv7)
    pub id: Uuid,
    /// Path relative to the ingested root, always `/`-separated
    pub relative_path: String,
    /// Lowercase hex SHA-256 of the file bytes
    pub content_hash: String,
    /// Unix timestamp (seconds) when this record was created
    pub indexed_at: i64,
}

impl Document {
    /// Create a fresh document record with a new time-ordered id
    pub fn new(relative_path: impl Into<String>, content_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            relative_path: relative_path.into(),
            content_hash: content_hash.into(),
            indexed_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// One retrievable, embedded snippet owned by a [`Document`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    /// Owning document
    pub document_id: Uuid,
    /// Namespace of the enclosing file, empty for the global namespace
    pub namespace: String,
    /// Name of the class/interface/struct/enum the snippet came from
    pub type_name: String,
    /// Member identifier, when the member has one
    pub method_name: Option<String>,
    pub snippet: String,
    pub token_count: usize,
    pub embedding: Vec<f32>,
    /// A single source line that alone exceeds the token budget
    #[serde(default)]
    pub oversized: bool,
}

/// How a document differs from the persisted index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Path not present in the persisted index
    New,
    /// Path present with a different fingerprint
    Modified,
}

/// Progress snapshot emitted after each processed document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionProgress {
    /// Documents handled so far (deleted + new/modified)
    pub processed: usize,
    /// Documents this run has to handle
    pub total: usize,
    /// Failures so far
    pub errors: usize,
    /// Path of the document that was just handled
    pub relative_path: String,
}

impl IngestionProgress {
    /// Completed fraction in `0.0..=1.0`
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }
}

/// Final tally of an ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionReport {
    /// New or modified documents that were (re)built
    pub documents_total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Documents removed because their file disappeared
    pub deleted: usize,
    /// Files skipped because their fingerprint matched
    pub unchanged: usize,
    pub chunks_created: usize,
    pub duration_ms: u64,
    /// Per-document failure messages (non-fatal)
    #[serde(default)]
    pub errors: Vec<String>,
    /// The run was stopped by its cancellation token
    #[serde(default)]
    pub cancelled: bool,
}

impl IngestionReport {
    /// Number of documents handled, excluding unchanged ones
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed + self.deleted
    }
}

/// A chunk returned by similarity search, resolved to its document path
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub chunk: Chunk,
    /// Path of the owning document, empty if the document record is gone
    pub relative_path: String,
    /// Similarity score (higher is closer)
    pub score: f32,
}

/// Record counts of a vector store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStatistics {
    pub documents: usize,
    pub chunks: usize,
}

#[cfg(test)]
mod tests;
