//! Synchronizes a persisted store with an ingestion source
//!
//! Documents are handled one at a time. Each new or modified document is
//! rebuilt from scratch (delete, then recreate), and any failure part way
//! through rolls that document back so it leaves no records behind.

use super::source::IngestionSource;
use crate::indexer::PendingDocument;
use crate::types::{ChangeKind, Document, IngestionProgress, IngestionReport};
use crate::vector_db::{DocumentFilter, VectorStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Callback invoked after every handled document
pub type ProgressCallback = dyn Fn(&IngestionProgress) + Send + Sync;

/// Running counters for one ingestion run
struct RunState<'a> {
    report: IngestionReport,
    total: usize,
    progress: Option<&'a ProgressCallback>,
}

impl RunState<'_> {
    fn notify(&self, relative_path: &str) {
        let progress = IngestionProgress {
            processed: self.report.processed(),
            total: self.total,
            errors: self.report.failed,
            relative_path: relative_path.to_string(),
        };
        tracing::info!(
            "[{}/{}] {} ({} errors)",
            progress.processed,
            progress.total,
            relative_path,
            progress.errors
        );
        if let Some(callback) = self.progress {
            callback(&progress);
        }
    }

    fn fail(&mut self, relative_path: &str, error: &anyhow::Error) {
        tracing::warn!("Failed to ingest {}: {:#}", relative_path, error);
        self.report.failed += 1;
        self.report
            .errors
            .push(format!("{}: {:#}", relative_path, error));
    }
}

/// Drives per-document ingestion against one store
pub struct DataIngestor {
    store: Arc<dyn VectorStore>,
}

impl DataIngestor {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Bring the store in line with the source
    ///
    /// Per-document failures are counted in the report and never abort the
    /// run. Errors are returned only when the run cannot start, e.g. the
    /// store is unreachable or the source root is missing.
    pub async fn ingest_all(
        &self,
        source: &dyn IngestionSource,
        progress: Option<&ProgressCallback>,
        cancel_token: &CancellationToken,
    ) -> Result<IngestionReport> {
        let start = Instant::now();
        tracing::info!("Ingesting {}", source.describe());

        self.store
            .ensure_exists(source.embedding_dimension())
            .await
            .context("Failed to prepare vector store")?;

        let persisted = self
            .store
            .get_documents(&DocumentFilter::All, None)
            .await
            .context("Failed to load persisted documents")?;

        let changes = source
            .changes(&persisted, cancel_token)
            .await
            .context("Failed to detect changes")?;

        let mut state = RunState {
            report: IngestionReport {
                documents_total: changes.new_or_modified.len() + changes.unreadable.len(),
                unchanged: changes.unchanged,
                ..Default::default()
            },
            total: changes.work_total() + changes.unreadable.len(),
            progress,
        };

        for (relative_path, reason) in &changes.unreadable {
            state.fail(relative_path, &anyhow::anyhow!("unreadable file: {}", reason));
            state.notify(relative_path);
        }

        for document in &changes.deleted {
            if cancel_token.is_cancelled() {
                state.report.cancelled = true;
                break;
            }
            match self.remove_documents(std::slice::from_ref(document)).await {
                Ok(_) => {
                    tracing::info!("Removed deleted document {}", document.relative_path);
                    state.report.deleted += 1;
                }
                Err(e) => state.fail(&document.relative_path, &e),
            }
            state.notify(&document.relative_path);
        }

        for pending in &changes.new_or_modified {
            if state.report.cancelled || cancel_token.is_cancelled() {
                state.report.cancelled = true;
                break;
            }
            let relative_path = &pending.document.relative_path;

            match self.ingest_document(source, pending, cancel_token).await {
                Ok(chunk_count) => {
                    tracing::info!(
                        "{} {} ({} chunks)",
                        match pending.kind {
                            ChangeKind::New => "Added",
                            ChangeKind::Modified => "Updated",
                        },
                        relative_path,
                        chunk_count
                    );
                    state.report.succeeded += 1;
                    state.report.chunks_created += chunk_count;
                }
                Err(e) => {
                    self.rollback(&pending.document, &mut state.report).await;
                    if cancel_token.is_cancelled() {
                        tracing::info!("Ingestion cancelled while processing {}", relative_path);
                        state.report.cancelled = true;
                        break;
                    }
                    state.fail(relative_path, &e);
                }
            }
            state.notify(relative_path);
        }

        if let Err(e) = self.store.flush().await {
            tracing::warn!("Failed to flush vector store: {:#}", e);
            state.report.errors.push(format!("flush: {:#}", e));
        }

        let mut report = state.report;
        report.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Ingestion of {} finished in {} ms: {} succeeded, {} failed, {} deleted, {} unchanged{}",
            source.describe(),
            report.duration_ms,
            report.succeeded,
            report.failed,
            report.deleted,
            report.unchanged,
            if report.cancelled { " (cancelled)" } else { "" }
        );
        Ok(report)
    }

    /// Remove one document and its chunks by path, whatever the filesystem says
    ///
    /// Returns how many document records were removed; more than one only
    /// when a previous crash left duplicates behind.
    pub async fn delete_document_and_chunks(&self, relative_path: &str) -> Result<usize> {
        let documents = self
            .store
            .get_documents(&DocumentFilter::RelativePath(relative_path.to_string()), None)
            .await
            .with_context(|| format!("Failed to look up {}", relative_path))?;

        if documents.is_empty() {
            tracing::info!("No document recorded for {}", relative_path);
            return Ok(0);
        }

        self.remove_documents(&documents).await?;
        tracing::info!(
            "Deleted {} document record(s) for {}",
            documents.len(),
            relative_path
        );
        Ok(documents.len())
    }

    /// Rebuild one document; returns its chunk count
    async fn ingest_document(
        &self,
        source: &dyn IngestionSource,
        pending: &PendingDocument,
        cancel_token: &CancellationToken,
    ) -> Result<usize> {
        let document = &pending.document;

        // Clears the superseded record and leftovers of an earlier failed run
        self.delete_document_and_chunks(&document.relative_path)
            .await?;

        self.store
            .upsert_documents(std::slice::from_ref(document))
            .await
            .context("Failed to store document record")?;

        let chunks = source.chunks(pending, cancel_token).await?;

        self.store
            .upsert_chunks(&chunks)
            .await
            .context("Failed to store chunks")?;

        Ok(chunks.len())
    }

    /// Chunks first, then document records
    async fn remove_documents(&self, documents: &[Document]) -> Result<()> {
        let ids: Vec<Uuid> = documents.iter().map(|d| d.id).collect();
        self.store
            .delete_chunks_of_documents(&ids)
            .await
            .context("Failed to delete chunks")?;
        self.store
            .delete_documents(&ids)
            .await
            .context("Failed to delete document records")?;
        Ok(())
    }

    async fn rollback(&self, document: &Document, report: &mut IngestionReport) {
        if let Err(e) = self.remove_documents(std::slice::from_ref(document)).await {
            tracing::warn!(
                "Rollback of {} failed, it will be cleaned up next run: {:#}",
                document.relative_path,
                e
            );
            report
                .errors
                .push(format!("{}: rollback failed: {:#}", document.relative_path, e));
        }
    }
}
