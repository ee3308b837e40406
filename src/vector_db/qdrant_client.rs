use super::{ChunkFilter, DocumentFilter, VectorStore};
use crate::config::VectorDbConfig;
use crate::error::VectorDbError;
use crate::types::{Chunk, Document, StoreStatistics};
use anyhow::{Context, Result};
use qdrant_client::qdrant::vectors_config::Config;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointId, PointStruct, PointsIdsList, RetrievedPoint, ScrollPointsBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, Value, VectorParams, VectorsConfig, point_id::PointIdOptions,
    vectors_output::VectorsOptions,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

/// Points per scroll page
const SCROLL_PAGE: u32 = 256;

/// Qdrant store (requires a running server)
///
/// Document records sit in their own collection with a one-element
/// placeholder vector; chunk vectors use cosine distance.
pub struct QdrantVectorStore {
    client: Qdrant,
    documents_collection: String,
    chunks_collection: String,
}

impl QdrantVectorStore {
    /// Create a new Qdrant client with default local configuration
    pub async fn new() -> Result<Self> {
        Self::from_config(&VectorDbConfig::default()).await
    }

    pub async fn from_config(config: &VectorDbConfig) -> Result<Self> {
        tracing::info!("Connecting to Qdrant at {}", config.qdrant_url);

        let client = Qdrant::from_url(&config.qdrant_url)
            .build()
            .map_err(|e| VectorDbError::ConnectionFailed(e.to_string()))
            .context("Failed to create Qdrant client")?;

        Ok(Self {
            client,
            documents_collection: config.documents_collection.clone(),
            chunks_collection: config.chunks_collection.clone(),
        })
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let collections = self
            .client
            .list_collections()
            .await
            .context("Failed to list collections")?;

        Ok(collections.collections.iter().any(|c| c.name == name))
    }

    async fn create_if_missing(&self, name: &str, size: u64, distance: Distance) -> Result<()> {
        if self.collection_exists(name).await? {
            tracing::debug!("Collection '{}' already exists", name);
            return Ok(());
        }

        tracing::info!("Creating collection '{}' with dimension {}", name, size);
        self.client
            .create_collection(CreateCollectionBuilder::new(name).vectors_config(
                VectorsConfig {
                    config: Some(Config::Params(VectorParams {
                        size,
                        distance: distance.into(),
                        ..Default::default()
                    })),
                },
            ))
            .await
            .map_err(|e| VectorDbError::CollectionCreationFailed {
                collection: name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    /// Page through every point matching `filter`
    async fn scroll_all(
        &self,
        collection: &str,
        filter: Option<Filter>,
        with_vectors: bool,
        limit: Option<usize>,
    ) -> Result<Vec<RetrievedPoint>> {
        if !self.collection_exists(collection).await? {
            return Ok(vec![]);
        }

        let mut points = Vec::new();
        let mut offset: Option<PointId> = None;
        loop {
            let mut request = ScrollPointsBuilder::new(collection)
                .limit(SCROLL_PAGE)
                .with_payload(true)
                .with_vectors(with_vectors);
            if let Some(filter) = filter.clone() {
                request = request.filter(filter);
            }
            if let Some(offset) = offset.take() {
                request = request.offset(offset);
            }

            let page = self
                .client
                .scroll(request)
                .await
                .map_err(|e| VectorDbError::QueryFailed(e.to_string()))?;
            points.extend(page.result);

            if limit.is_some_and(|limit| points.len() >= limit) {
                break;
            }
            match page.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }
        Ok(points)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        if !self.collection_exists(collection).await? {
            return Ok(0);
        }
        let response = self
            .client
            .count(CountPointsBuilder::new(collection).exact(true))
            .await
            .context("Failed to count points")?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }

    async fn delete_selected(&self, collection: &str, selector: Selection) -> Result<usize> {
        if !self.collection_exists(collection).await? {
            return Ok(0);
        }

        let before = self.count(collection).await?;
        let request = match selector {
            Selection::Ids(ids) => DeletePointsBuilder::new(collection)
                .points(PointsIdsList {
                    ids: ids.iter().map(|id| PointId::from(id.to_string())).collect(),
                })
                .wait(true),
            Selection::Filter(filter) => DeletePointsBuilder::new(collection)
                .points(filter)
                .wait(true),
        };
        self.client
            .delete_points(request)
            .await
            .map_err(|e| VectorDbError::DeleteFailed(e.to_string()))?;
        let after = self.count(collection).await?;
        Ok(before.saturating_sub(after))
    }
}

enum Selection {
    Ids(Vec<Uuid>),
    Filter(Filter),
}

fn chunk_filter(filter: &ChunkFilter) -> Option<Filter> {
    match filter {
        ChunkFilter::All => None,
        ChunkFilter::DocumentIds(ids) => Some(Filter::must([Condition::matches(
            "document_id",
            ids.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
        )])),
    }
}

fn point_uuid(id: Option<&PointId>) -> Result<Uuid> {
    match id.and_then(|p| p.point_id_options.as_ref()) {
        Some(PointIdOptions::Uuid(value)) => {
            Uuid::parse_str(value).with_context(|| format!("Invalid point id '{}'", value))
        }
        other => anyhow::bail!("Unexpected point id {:?}", other),
    }
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Result<String> {
    payload
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .with_context(|| format!("Missing '{}' in payload", key))
}

fn document_payload(document: &Document) -> Result<Payload> {
    json!({
        "relative_path": document.relative_path,
        "content_hash": document.content_hash,
        "indexed_at": document.indexed_at,
    })
    .try_into()
    .map_err(|e| VectorDbError::StoreFailed(format!("invalid payload: {}", e)).into())
}

fn chunk_payload(chunk: &Chunk) -> Result<Payload> {
    json!({
        "document_id": chunk.document_id.to_string(),
        "namespace": chunk.namespace,
        "type_name": chunk.type_name,
        "method_name": chunk.method_name,
        "snippet": chunk.snippet,
        "token_count": chunk.token_count,
        "oversized": chunk.oversized,
    })
    .try_into()
    .map_err(|e| VectorDbError::StoreFailed(format!("invalid payload: {}", e)).into())
}

fn document_from_payload(id: Uuid, payload: &HashMap<String, Value>) -> Result<Document> {
    Ok(Document {
        id,
        relative_path: payload_str(payload, "relative_path")?,
        content_hash: payload_str(payload, "content_hash")?,
        indexed_at: payload
            .get("indexed_at")
            .and_then(|v| v.as_integer())
            .unwrap_or_default(),
    })
}

fn chunk_from_payload(
    id: Uuid,
    payload: &HashMap<String, Value>,
    embedding: Vec<f32>,
) -> Result<Chunk> {
    let document_id = payload_str(payload, "document_id")?;
    Ok(Chunk {
        id,
        document_id: Uuid::parse_str(&document_id)
            .with_context(|| format!("Invalid document id '{}'", document_id))?,
        namespace: payload_str(payload, "namespace")?,
        type_name: payload_str(payload, "type_name")?,
        method_name: payload
            .get("method_name")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        snippet: payload_str(payload, "snippet")?,
        token_count: payload
            .get("token_count")
            .and_then(|v| v.as_integer())
            .unwrap_or_default() as usize,
        embedding,
        oversized: payload
            .get("oversized")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
    })
}

#[allow(deprecated)]
fn dense_vector(options: Option<VectorsOptions>) -> Vec<f32> {
    match options {
        Some(VectorsOptions::Vector(vector)) => vector.data,
        _ => vec![],
    }
}

#[async_trait::async_trait]
impl VectorStore for QdrantVectorStore {
    async fn ensure_exists(&self, dimension: usize) -> Result<()> {
        self.create_if_missing(&self.documents_collection, 1, Distance::Dot)
            .await?;
        self.create_if_missing(&self.chunks_collection, dimension as u64, Distance::Cosine)
            .await
    }

    async fn get_documents(
        &self,
        filter: &DocumentFilter,
        limit: Option<usize>,
    ) -> Result<Vec<Document>> {
        let server_filter = match filter {
            DocumentFilter::RelativePath(path) => Some(Filter::must([Condition::matches(
                "relative_path",
                path.clone(),
            )])),
            _ => None,
        };
        let page_limit = match filter {
            DocumentFilter::PathContains(_) => None,
            _ => limit,
        };

        let points = self
            .scroll_all(&self.documents_collection, server_filter, false, page_limit)
            .await?;

        let mut documents = Vec::with_capacity(points.len());
        for point in &points {
            let document = document_from_payload(point_uuid(point.id.as_ref())?, &point.payload)?;
            if filter.matches(&document) {
                documents.push(document);
            }
        }
        if let Some(limit) = limit {
            documents.truncate(limit);
        }
        Ok(documents)
    }

    async fn upsert_documents(&self, documents: &[Document]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let points = documents
            .iter()
            .map(|d| Ok(PointStruct::new(d.id.to_string(), vec![1.0], document_payload(d)?)))
            .collect::<Result<Vec<_>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.documents_collection, points).wait(true))
            .await
            .map_err(|e| VectorDbError::StoreFailed(e.to_string()))?;
        Ok(())
    }

    async fn delete_documents(&self, ids: &[Uuid]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.delete_selected(&self.documents_collection, Selection::Ids(ids.to_vec()))
            .await
    }

    async fn get_chunks(&self, filter: &ChunkFilter, limit: Option<usize>) -> Result<Vec<Chunk>> {
        if matches!(filter, ChunkFilter::DocumentIds(ids) if ids.is_empty()) {
            return Ok(vec![]);
        }
        let points = self
            .scroll_all(&self.chunks_collection, chunk_filter(filter), true, limit)
            .await?;

        let mut chunks = Vec::with_capacity(points.len());
        for point in points {
            let id = point_uuid(point.id.as_ref())?;
            let embedding = dense_vector(point.vectors.and_then(|v| v.vectors_options));
            chunks.push(chunk_from_payload(id, &point.payload, embedding)?);
        }
        if let Some(limit) = limit {
            chunks.truncate(limit);
        }
        Ok(chunks)
    }

    async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let points = chunks
            .iter()
            .map(|c| {
                Ok(PointStruct::new(
                    c.id.to_string(),
                    c.embedding.clone(),
                    chunk_payload(c)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.chunks_collection, points).wait(true))
            .await
            .map_err(|e| VectorDbError::StoreFailed(e.to_string()))?;

        tracing::debug!("Stored {} chunks", chunks.len());
        Ok(())
    }

    async fn delete_chunks(&self, ids: &[Uuid]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.delete_selected(&self.chunks_collection, Selection::Ids(ids.to_vec()))
            .await
    }

    async fn delete_chunks_of_documents(&self, document_ids: &[Uuid]) -> Result<usize> {
        if document_ids.is_empty() {
            return Ok(0);
        }
        let Some(filter) = chunk_filter(&ChunkFilter::DocumentIds(document_ids.to_vec())) else {
            return Ok(0);
        };
        self.delete_selected(&self.chunks_collection, Selection::Filter(filter))
            .await
    }

    async fn search_chunks(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        filter: &ChunkFilter,
    ) -> Result<Vec<(Chunk, f32)>> {
        if matches!(filter, ChunkFilter::DocumentIds(ids) if ids.is_empty()) {
            return Ok(vec![]);
        }
        if !self.collection_exists(&self.chunks_collection).await? {
            return Ok(vec![]);
        }

        let mut request = SearchPointsBuilder::new(&self.chunks_collection, vector, top_k as u64)
            .with_payload(true)
            .with_vectors(true);
        if let Some(filter) = chunk_filter(filter) {
            request = request.filter(filter);
        }

        let response = self
            .client
            .search_points(request)
            .await
            .map_err(|e| VectorDbError::SearchFailed(e.to_string()))?;

        let mut results = Vec::with_capacity(response.result.len());
        for point in response.result {
            let id = point_uuid(point.id.as_ref())?;
            let embedding = dense_vector(point.vectors.and_then(|v| v.vectors_options));
            results.push((chunk_from_payload(id, &point.payload, embedding)?, point.score));
        }
        Ok(results)
    }

    async fn statistics(&self) -> Result<StoreStatistics> {
        Ok(StoreStatistics {
            documents: self.count(&self.documents_collection).await?,
            chunks: self.count(&self.chunks_collection).await?,
        })
    }

    async fn flush(&self) -> Result<()> {
        // Writes are issued with wait=true
        Ok(())
    }
}
