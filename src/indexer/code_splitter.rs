use super::ast_parser::DeclarationExtractor;
use super::chunker::{CandidateChunk, ChunkBuilder};
use super::splitter::RecursiveSplitter;
use crate::embedding::{EmbeddingProvider, TokenCounter, embed_with_timeout};
use crate::error::{ChunkingError, EmbeddingError, IndexingError};
use crate::types::Chunk;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Helper macro to check for cancellation and return early if cancelled
macro_rules! check_cancelled {
    ($cancel_token:expr) => {
        if $cancel_token.is_cancelled() {
            tracing::info!("Chunking cancelled");
            return Err(IndexingError::Cancelled.into());
        }
    };
}

/// Turns one document's source into embedded, token-bounded chunks
///
/// Runs declaration extraction, chunk building and splitting, then embeds
/// every leaf window as it is produced. Any embedding failure fails the
/// whole document.
pub struct CodeSplitter {
    extractor: Arc<dyn DeclarationExtractor>,
    builder: ChunkBuilder,
    counter: Arc<dyn TokenCounter>,
    embedder: Arc<dyn EmbeddingProvider>,
    max_tokens: usize,
    overlap_lines: usize,
    timeout_secs: u64,
    prompt_prefix: String,
}

impl CodeSplitter {
    pub fn new(
        extractor: Arc<dyn DeclarationExtractor>,
        counter: Arc<dyn TokenCounter>,
        embedder: Arc<dyn EmbeddingProvider>,
        max_tokens: usize,
        overlap_lines: usize,
        timeout_secs: u64,
    ) -> Result<Self, ChunkingError> {
        if max_tokens == 0 {
            return Err(ChunkingError::InvalidTokenBudget(
                "max_tokens must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            extractor,
            builder: ChunkBuilder::new(),
            counter,
            embedder,
            max_tokens,
            overlap_lines,
            timeout_secs,
            prompt_prefix: String::new(),
        })
    }

    /// Task prompt sent ahead of every chunk; stored snippets stay unprefixed
    ///
    /// Must match the prefix the token counter measures with.
    pub fn with_prompt_prefix(mut self, prompt_prefix: impl Into<String>) -> Self {
        self.prompt_prefix = prompt_prefix.into();
        self
    }

    pub fn embedding_dimension(&self) -> usize {
        self.embedder.dimension()
    }

    /// Candidate chunks before splitting
    pub fn candidates(
        &self,
        source: &str,
        document_id: Uuid,
    ) -> Result<Vec<CandidateChunk>, ChunkingError> {
        let tree = self.extractor.extract(source)?;
        if tree.has_syntax_errors {
            tracing::warn!(
                "Document {} has syntax errors, chunking recovered declarations only",
                document_id
            );
        }
        Ok(self.builder.build(&tree, document_id))
    }

    /// Build, split and embed every chunk of one document
    pub async fn split_document(
        &self,
        source: &str,
        document_id: Uuid,
        cancel_token: &CancellationToken,
    ) -> Result<Vec<Chunk>> {
        let candidates = self
            .candidates(source, document_id)
            .context("Failed to extract declarations")?;

        let splitter =
            RecursiveSplitter::new(self.counter.as_ref(), self.max_tokens, self.overlap_lines)?;

        let mut chunks = Vec::new();
        for candidate in &candidates {
            check_cancelled!(cancel_token);

            for window in splitter.split(&candidate.text) {
                let window = window.with_context(|| {
                    format!("Failed to measure chunk of {}", candidate.type_name)
                })?;
                check_cancelled!(cancel_token);

                let input = format!("{}{}", self.prompt_prefix, window.text);
                let embedding = self.embed(input).await.with_context(|| {
                    format!(
                        "Failed to embed chunk of {}.{}",
                        candidate.type_name,
                        candidate.method_name.as_deref().unwrap_or("")
                    )
                })?;

                chunks.push(Chunk {
                    id: Uuid::now_v7(),
                    document_id: candidate.document_id,
                    namespace: candidate.namespace.clone(),
                    type_name: candidate.type_name.clone(),
                    method_name: candidate.method_name.clone(),
                    snippet: window.text,
                    token_count: window.token_count,
                    embedding,
                    oversized: window.oversized,
                });
            }
        }

        tracing::debug!(
            "Document {}: {} candidates, {} chunks",
            document_id,
            candidates.len(),
            chunks.len()
        );

        Ok(chunks)
    }

    /// Embed one text on the blocking pool with timeout protection
    pub async fn embed(&self, text: String) -> Result<Vec<f32>, EmbeddingError> {
        embed_with_timeout(Arc::clone(&self.embedder), text, self.timeout_secs).await
    }
}
