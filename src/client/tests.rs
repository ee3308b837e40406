use super::*;
use crate::error::EmbeddingError;
use crate::vector_db::InMemoryVectorStore;
use std::fs;
use tempfile::TempDir;

struct WordCounter;

impl TokenCounter for WordCounter {
    fn count_tokens(&self, text: &str) -> Result<usize, EmbeddingError> {
        Ok(text.split_whitespace().count())
    }
}

/// Deterministic vectors from the byte sum of the text
struct ByteSumEmbedder;

impl EmbeddingProvider for ByteSumEmbedder {
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let sum: u32 = t.bytes().map(u32::from).sum();
                vec![1.0, (sum % 97) as f32 / 97.0, (t.len() % 13) as f32]
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        3
    }

    fn model_name(&self) -> &str {
        "byte-sum"
    }
}

const ORDER_SERVICE: &str = r#"using System;

namespace Shop.Services
{
    public class OrderService
    {
        public void Place() { }

        public void Cancel() { }
    }
}
"#;

fn create_test_client() -> (CodeIndexClient, Arc<InMemoryVectorStore>) {
    let store = Arc::new(InMemoryVectorStore::new());
    let client = CodeIndexClient::from_parts(
        Config::default(),
        store.clone(),
        Arc::new(WordCounter),
        Arc::new(ByteSumEmbedder),
    )
    .unwrap();
    (client, store)
}

fn write_solution() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let services = temp_dir.path().join("src").join("Services");
    fs::create_dir_all(&services).unwrap();
    fs::write(services.join("OrderService.cs"), ORDER_SERVICE).unwrap();
    temp_dir
}

#[test]
fn test_from_parts_rejects_zero_budget() {
    let mut config = Config::default();
    config.chunking.max_tokens = 0;
    let result = CodeIndexClient::from_parts(
        config,
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(WordCounter),
        Arc::new(ByteSumEmbedder),
    );
    assert!(result.is_err());
}

#[test]
fn test_accessors() {
    let (client, _store) = create_test_client();
    assert_eq!(client.embedding_dimension(), 3);
    assert_eq!(client.config().chunking.max_tokens, 256);
    let _cloned = client.clone();
}

#[test]
fn test_normalize_root_nonexistent() {
    let err = CodeIndexClient::normalize_root("/nonexistent/path/12345").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ValidationError>(),
        Some(ValidationError::PathNotFound(_))
    ));
}

#[test]
fn test_normalize_root_is_absolute() {
    let temp_dir = TempDir::new().unwrap();
    let normalized = CodeIndexClient::normalize_root(temp_dir.path()).unwrap();
    assert!(normalized.is_absolute());
}

#[tokio::test]
async fn test_ingest_search_and_stats() {
    let (client, _store) = create_test_client();
    let solution = write_solution();

    let report = client
        .ingest(solution.path(), None, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.chunks_created, 2);

    let stats = client.statistics().await.unwrap();
    assert_eq!(stats.documents, 1);
    assert_eq!(stats.chunks, 2);

    let hits = client.search("Place an order", None, None).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.relative_path == "src/Services/OrderService.cs"));
    assert!(hits.iter().all(|h| h.chunk.namespace == "Shop.Services"));
}

#[tokio::test]
async fn test_ingest_missing_root() {
    let (client, _store) = create_test_client();
    let result = client
        .ingest("/nonexistent/path/12345", None, &CancellationToken::new())
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_delete_document_normalizes_separators() {
    let (client, store) = create_test_client();
    let solution = write_solution();
    client
        .ingest(solution.path(), None, &CancellationToken::new())
        .await
        .unwrap();

    let removed = client
        .delete_document("src\\Services\\OrderService.cs")
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(store.statistics().await.unwrap(), StoreStatistics::default());
}

#[tokio::test]
async fn test_delete_document_rejects_empty_path() {
    let (client, _store) = create_test_client();
    assert!(client.delete_document("  ").await.is_err());
}

/// Records embedded texts, one fixed vector each
struct RecordingEmbedder {
    texts: std::sync::Mutex<Vec<String>>,
}

impl EmbeddingProvider for RecordingEmbedder {
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let vectors = texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect();
        self.texts.lock().unwrap().extend(texts);
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        3
    }

    fn model_name(&self) -> &str {
        "recording"
    }
}

#[tokio::test]
async fn test_configured_prompt_prefix_reaches_embedder() {
    let mut config = Config::default();
    config.tokenizer.prompt_prefix = "search_document: ".to_string();
    let embedder = Arc::new(RecordingEmbedder {
        texts: std::sync::Mutex::new(vec![]),
    });
    let store = Arc::new(InMemoryVectorStore::new());
    let client =
        CodeIndexClient::from_parts(config, store.clone(), Arc::new(WordCounter), embedder.clone())
            .unwrap();
    let solution = write_solution();

    client
        .ingest(solution.path(), None, &CancellationToken::new())
        .await
        .unwrap();

    {
        let texts = embedder.texts.lock().unwrap();
        assert_eq!(texts.len(), 2);
        assert!(texts.iter().all(|t| t.starts_with("search_document: using System;")));
    }

    let chunks = store
        .get_chunks(&crate::vector_db::ChunkFilter::All, None)
        .await
        .unwrap();
    assert!(chunks.iter().all(|c| c.snippet.starts_with("using System;")));
}
