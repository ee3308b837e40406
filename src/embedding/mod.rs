mod fastembed_manager;
mod token_counter;

pub use fastembed_manager::FastEmbedManager;
pub use token_counter::HfTokenCounter;

use crate::error::EmbeddingError;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

/// Trait for embedding generation
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a batch of text
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Get the dimension of the embeddings
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Measures text in the embedding model's tokens
///
/// Must be deterministic: the splitter relies on the same text always
/// producing the same count.
pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, text: &str) -> Result<usize, EmbeddingError>;
}

/// Embed one text on the blocking pool with timeout protection
///
/// The returned vector is checked against the provider's dimension.
pub async fn embed_with_timeout(
    provider: Arc<dyn EmbeddingProvider>,
    text: String,
    timeout_secs: u64,
) -> Result<Vec<f32>, EmbeddingError> {
    let expected = provider.dimension();
    let embed_future = tokio::task::spawn_blocking(move || provider.embed_batch(vec![text]));

    let vectors = match tokio::time::timeout(Duration::from_secs(timeout_secs), embed_future).await
    {
        Ok(Ok(Ok(vectors))) => vectors,
        Ok(Ok(Err(e))) => return Err(EmbeddingError::GenerationFailed(format!("{:#}", e))),
        Ok(Err(e)) => {
            return Err(EmbeddingError::GenerationFailed(format!(
                "Embedding task panicked: {}",
                e
            )));
        }
        Err(_) => return Err(EmbeddingError::Timeout(timeout_secs)),
    };

    let vector = vectors
        .into_iter()
        .next()
        .ok_or(EmbeddingError::MissingVector)?;

    if vector.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }

    Ok(vector)
}
