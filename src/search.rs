//! Similarity search over ingested chunks

use crate::embedding::{EmbeddingProvider, embed_with_timeout};
use crate::error::ValidationError;
use crate::types::SearchResult;
use crate::vector_db::{ChunkFilter, DocumentFilter, VectorStore};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Embeds a query and returns the closest chunks
pub struct SemanticSearch {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    timeout_secs: u64,
    min_score: f32,
}

impl SemanticSearch {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            store,
            embedder,
            timeout_secs,
            min_score: 0.0,
        }
    }

    /// Drop results scoring below `min_score`
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Top `limit` chunks for `query`, best first
    ///
    /// `document_filter` restricts the search to documents whose relative
    /// path contains it. A filter that matches no document yields no results.
    pub async fn search(
        &self,
        query: &str,
        document_filter: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(ValidationError::Empty("query".to_string()).into());
        }
        if limit == 0 {
            return Ok(vec![]);
        }

        let filter = match document_filter {
            Some(fragment) => DocumentFilter::PathContains(fragment.to_string()),
            None => DocumentFilter::All,
        };
        let documents = self
            .store
            .get_documents(&filter, None)
            .await
            .context("Failed to resolve document filter")?;

        let chunk_filter = match document_filter {
            Some(_) if documents.is_empty() => {
                tracing::debug!("No document matches {:?}", document_filter);
                return Ok(vec![]);
            }
            Some(_) => ChunkFilter::DocumentIds(documents.iter().map(|d| d.id).collect()),
            None => ChunkFilter::All,
        };

        let vector = embed_with_timeout(
            Arc::clone(&self.embedder),
            query.to_string(),
            self.timeout_secs,
        )
        .await
        .context("Failed to generate query embedding")?;

        let hits = self
            .store
            .search_chunks(vector, limit, &chunk_filter)
            .await
            .context("Failed to search")?;

        let paths: HashMap<_, _> = documents
            .into_iter()
            .map(|d| (d.id, d.relative_path))
            .collect();

        let results: Vec<SearchResult> = hits
            .into_iter()
            .filter(|(_, score)| *score >= self.min_score)
            .map(|(chunk, score)| SearchResult {
                relative_path: paths.get(&chunk.document_id).cloned().unwrap_or_default(),
                chunk,
                score,
            })
            .collect();

        tracing::debug!("Query {:?} returned {} results", query, results.len());
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, Document};
    use crate::vector_db::InMemoryVectorStore;
    use uuid::Uuid;

    /// Maps "north"/"east" onto unit vectors
    struct CompassEmbedder;

    impl EmbeddingProvider for CompassEmbedder {
        fn embed_batch(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.contains("north") {
                        vec![0.0, 1.0]
                    } else {
                        vec![1.0, 0.0]
                    }
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "compass"
        }
    }

    fn chunk(document: &Document, snippet: &str, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: Uuid::now_v7(),
            document_id: document.id,
            namespace: "Maps".into(),
            type_name: "Compass".into(),
            method_name: Some(snippet.into()),
            snippet: snippet.into(),
            token_count: 1,
            embedding,
            oversized: false,
        }
    }

    async fn fixture() -> SemanticSearch {
        let store = Arc::new(InMemoryVectorStore::new());
        let north = Document::new("src/North/Heading.cs", "n");
        let east = Document::new("src/East/Heading.cs", "e");
        store
            .upsert_documents(&[north.clone(), east.clone()])
            .await
            .unwrap();
        store
            .upsert_chunks(&[
                chunk(&north, "GoNorth", vec![0.0, 1.0]),
                chunk(&east, "GoEast", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();
        SemanticSearch::new(store, Arc::new(CompassEmbedder), 5)
    }

    #[tokio::test]
    async fn test_search_ranks_and_resolves_paths() {
        let search = fixture().await;
        let results = search.search("go north", None, 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.snippet, "GoNorth");
        assert_eq!(results[0].relative_path, "src/North/Heading.cs");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_search_with_document_filter() {
        let search = fixture().await;
        let results = search.search("go north", Some("East/"), 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].relative_path, "src/East/Heading.cs");
    }

    #[tokio::test]
    async fn test_search_filter_without_match() {
        let search = fixture().await;
        assert!(search.search("go north", Some("West/"), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_min_score() {
        let search = fixture().await.with_min_score(0.5);
        let results = search.search("go north", None, 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.snippet, "GoNorth");
    }

    #[tokio::test]
    async fn test_search_rejects_empty_query() {
        let search = fixture().await;
        let err = search.search("   ", None, 10).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ValidationError>(),
            Some(ValidationError::Empty(_))
        ));
        assert!(search.search("north", None, 0).await.unwrap().is_empty());
    }
}
