// LanceDB is the default embedded vector database
pub mod lance_client;
pub use lance_client::LanceVectorStore;

// In-memory store for tests and dry runs
pub mod memory_client;
pub use memory_client::InMemoryVectorStore;

// Qdrant is optional (requires external server)
#[cfg(feature = "qdrant-backend")]
pub mod qdrant_client;
#[cfg(feature = "qdrant-backend")]
pub use qdrant_client::QdrantVectorStore;

use crate::types::{Chunk, Document, StoreStatistics};
use anyhow::Result;
use uuid::Uuid;

/// Which document records a query selects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFilter {
    All,
    /// Exact relative path
    RelativePath(String),
    /// Relative path contains the substring
    PathContains(String),
}

impl DocumentFilter {
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            DocumentFilter::All => true,
            DocumentFilter::RelativePath(path) => document.relative_path == *path,
            DocumentFilter::PathContains(fragment) => document.relative_path.contains(fragment),
        }
    }
}

/// Which chunk records a query selects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkFilter {
    All,
    /// Chunks owned by any of these documents
    DocumentIds(Vec<Uuid>),
}

impl ChunkFilter {
    pub fn matches(&self, chunk: &Chunk) -> bool {
        match self {
            ChunkFilter::All => true,
            ChunkFilter::DocumentIds(ids) => ids.contains(&chunk.document_id),
        }
    }
}

/// Persisted document and chunk records
///
/// Ownership between documents and chunks is not enforced here; callers
/// delete a document's chunks themselves.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the document and chunk collections if needed
    async fn ensure_exists(&self, dimension: usize) -> Result<()>;

    async fn get_documents(
        &self,
        filter: &DocumentFilter,
        limit: Option<usize>,
    ) -> Result<Vec<Document>>;

    async fn upsert_documents(&self, documents: &[Document]) -> Result<()>;

    /// Returns the number of records removed when the backend reports it
    async fn delete_documents(&self, ids: &[Uuid]) -> Result<usize>;

    async fn get_chunks(&self, filter: &ChunkFilter, limit: Option<usize>) -> Result<Vec<Chunk>>;

    async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<()>;

    async fn delete_chunks(&self, ids: &[Uuid]) -> Result<usize>;

    /// Remove every chunk owned by the given documents
    async fn delete_chunks_of_documents(&self, document_ids: &[Uuid]) -> Result<usize> {
        if document_ids.is_empty() {
            return Ok(0);
        }
        let chunks = self
            .get_chunks(&ChunkFilter::DocumentIds(document_ids.to_vec()), None)
            .await?;
        let ids: Vec<Uuid> = chunks.iter().map(|c| c.id).collect();
        self.delete_chunks(&ids).await
    }

    /// Nearest chunks to `vector`, best first, with a similarity score
    async fn search_chunks(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        filter: &ChunkFilter,
    ) -> Result<Vec<(Chunk, f32)>>;

    async fn statistics(&self) -> Result<StoreStatistics>;

    /// Flush/save changes to disk
    async fn flush(&self) -> Result<()>;
}
