//! Where ingested documents come from

use crate::error::IndexingError;
use crate::indexer::{
    ChangeSet, CodeSplitter, FileWalker, PendingDocument, detect_changes, fingerprint_files,
};
use crate::types::{Chunk, Document};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A corpus the ingestion coordinator can synchronize with a store
#[async_trait::async_trait]
pub trait IngestionSource: Send + Sync {
    /// Human-readable name for logs
    fn describe(&self) -> String;

    /// Width of the vectors this source produces
    fn embedding_dimension(&self) -> usize;

    /// Diff the current corpus against the persisted documents
    async fn changes(
        &self,
        persisted: &[Document],
        cancel_token: &CancellationToken,
    ) -> Result<ChangeSet>;

    /// Build the embedded chunks of one new or modified document
    async fn chunks(
        &self,
        pending: &PendingDocument,
        cancel_token: &CancellationToken,
    ) -> Result<Vec<Chunk>>;
}

/// A directory of C# source files
pub struct CodeDirectorySource {
    walker: FileWalker,
    splitter: Arc<CodeSplitter>,
}

impl CodeDirectorySource {
    pub fn new(walker: FileWalker, splitter: Arc<CodeSplitter>) -> Self {
        Self { walker, splitter }
    }

    pub fn root(&self) -> &Path {
        self.walker.root()
    }
}

/// Decode file bytes, dropping a UTF-8 byte order mark
pub(crate) fn decode_source(relative_path: &str, bytes: Vec<u8>) -> Result<String, IndexingError> {
    let text = String::from_utf8(bytes)
        .map_err(|_| IndexingError::InvalidUtf8(relative_path.to_string()))?;
    Ok(match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    })
}

#[async_trait::async_trait]
impl IngestionSource for CodeDirectorySource {
    fn describe(&self) -> String {
        self.walker.root().display().to_string()
    }

    fn embedding_dimension(&self) -> usize {
        self.splitter.embedding_dimension()
    }

    async fn changes(
        &self,
        persisted: &[Document],
        cancel_token: &CancellationToken,
    ) -> Result<ChangeSet> {
        let walker = self.walker.clone().with_cancellation(cancel_token.clone());

        // Walking and hashing are blocking work
        let fingerprints = tokio::task::spawn_blocking(move || -> Result<_> {
            let files = walker.walk()?;
            Ok(fingerprint_files(files))
        })
        .await
        .context("File scan task panicked")??;

        let changes = detect_changes(fingerprints, persisted);
        tracing::info!(
            "{}: {} new or modified, {} deleted, {} unchanged, {} unreadable",
            self.describe(),
            changes.new_or_modified.len(),
            changes.deleted.len(),
            changes.unchanged,
            changes.unreadable.len()
        );
        Ok(changes)
    }

    async fn chunks(
        &self,
        pending: &PendingDocument,
        cancel_token: &CancellationToken,
    ) -> Result<Vec<Chunk>> {
        let relative_path = &pending.document.relative_path;
        let bytes = tokio::fs::read(&pending.path)
            .await
            .map_err(|e| IndexingError::FileReadFailed {
                file: relative_path.clone(),
                reason: e.to_string(),
            })?;
        let source = decode_source(relative_path, bytes)?;

        self.splitter
            .split_document(&source, pending.document.id, cancel_token)
            .await
            .with_context(|| format!("Failed to chunk {}", relative_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_source_strips_bom() {
        let mut bytes = "\u{feff}".as_bytes().to_vec();
        bytes.extend_from_slice(b"class A {}");
        assert_eq!(decode_source("A.cs", bytes).unwrap(), "class A {}");
    }

    #[test]
    fn test_decode_source_rejects_invalid_utf8() {
        let err = decode_source("Bad.cs", vec![0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, IndexingError::InvalidUtf8(path) if path == "Bad.cs"));
    }
}
