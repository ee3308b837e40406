//! In-memory [`VectorStore`] for tests and throwaway runs.
//!
//! Records live behind `std::sync::RwLock`. Vector search is brute-force
//! cosine similarity over every stored chunk.

use crate::error::VectorDbError;
use crate::types::{Chunk, Document, StoreStatistics};
use crate::vector_db::{ChunkFilter, DocumentFilter, VectorStore};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;

pub struct InMemoryVectorStore {
    documents: RwLock<HashMap<Uuid, Document>>,
    chunks: RwLock<Vec<Chunk>>,
    dimension: RwLock<Option<usize>>,
    /// Write calls that changed something
    mutations: AtomicUsize,
    fail_chunk_writes: AtomicBool,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            chunks: RwLock::new(Vec::new()),
            dimension: RwLock::new(None),
            mutations: AtomicUsize::new(0),
            fail_chunk_writes: AtomicBool::new(false),
        }
    }

    /// Number of write calls that inserted or removed records
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    /// Make every following `upsert_chunks` call fail
    pub fn set_fail_chunk_writes(&self, fail: bool) {
        self.fail_chunk_writes.store(fail, Ordering::SeqCst);
    }

    fn record_mutation(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> VectorDbError {
    VectorDbError::QueryFailed("in-memory store lock poisoned".to_string())
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[async_trait::async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_exists(&self, dimension: usize) -> Result<()> {
        let mut current = self.dimension.write().map_err(poisoned)?;
        match *current {
            Some(existing) if existing != dimension => Err(
                crate::error::EmbeddingError::DimensionMismatch {
                    expected: existing,
                    actual: dimension,
                }
                .into(),
            ),
            _ => {
                *current = Some(dimension);
                Ok(())
            }
        }
    }

    async fn get_documents(
        &self,
        filter: &DocumentFilter,
        limit: Option<usize>,
    ) -> Result<Vec<Document>> {
        let documents = self.documents.read().map_err(poisoned)?;
        let mut selected: Vec<Document> = documents
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        selected.sort_by(|a, b| {
            a.relative_path
                .cmp(&b.relative_path)
                .then_with(|| a.id.cmp(&b.id))
        });
        if let Some(limit) = limit {
            selected.truncate(limit);
        }
        Ok(selected)
    }

    async fn upsert_documents(&self, documents: &[Document]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let mut stored = self.documents.write().map_err(poisoned)?;
        for document in documents {
            stored.insert(document.id, document.clone());
        }
        self.record_mutation();
        Ok(())
    }

    async fn delete_documents(&self, ids: &[Uuid]) -> Result<usize> {
        let mut stored = self.documents.write().map_err(poisoned)?;
        let removed = ids.iter().filter(|id| stored.remove(id).is_some()).count();
        if removed > 0 {
            self.record_mutation();
        }
        Ok(removed)
    }

    async fn get_chunks(&self, filter: &ChunkFilter, limit: Option<usize>) -> Result<Vec<Chunk>> {
        let chunks = self.chunks.read().map_err(poisoned)?;
        let selected = chunks.iter().filter(|c| filter.matches(c)).cloned();
        Ok(match limit {
            Some(limit) => selected.take(limit).collect(),
            None => selected.collect(),
        })
    }

    async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        if self.fail_chunk_writes.load(Ordering::SeqCst) {
            return Err(VectorDbError::StoreFailed("chunk writes disabled".to_string()).into());
        }
        let mut stored = self.chunks.write().map_err(poisoned)?;
        stored.retain(|existing| !chunks.iter().any(|c| c.id == existing.id));
        stored.extend(chunks.iter().cloned());
        self.record_mutation();
        Ok(())
    }

    async fn delete_chunks(&self, ids: &[Uuid]) -> Result<usize> {
        let mut stored = self.chunks.write().map_err(poisoned)?;
        let before = stored.len();
        stored.retain(|c| !ids.contains(&c.id));
        let removed = before - stored.len();
        if removed > 0 {
            self.record_mutation();
        }
        Ok(removed)
    }

    async fn search_chunks(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        filter: &ChunkFilter,
    ) -> Result<Vec<(Chunk, f32)>> {
        let chunks = self.chunks.read().map_err(poisoned)?;
        let mut scored: Vec<(Chunk, f32)> = chunks
            .iter()
            .filter(|c| filter.matches(c))
            .map(|c| (c.clone(), cosine_similarity(&vector, &c.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn statistics(&self) -> Result<StoreStatistics> {
        Ok(StoreStatistics {
            documents: self.documents.read().map_err(poisoned)?.len(),
            chunks: self.chunks.read().map_err(poisoned)?.len(),
        })
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
