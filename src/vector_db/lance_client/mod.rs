//! LanceDB vector store client
//!
//! Documents and chunks live in two tables of one embedded database. Only
//! the chunks table carries a vector column.

use crate::config::VectorDbConfig;
use crate::error::{EmbeddingError, VectorDbError};
use crate::types::{Chunk, Document, StoreStatistics};
use crate::vector_db::{ChunkFilter, DocumentFilter, VectorStore};
use anyhow::{Context, Result};
use arrow_array::{
    Array, BooleanArray, FixedSizeListArray, Float32Array, Int64Array, RecordBatch,
    RecordBatchIterator, StringArray, UInt32Array, types::Float32Type,
};
use arrow_schema::{DataType, Field, Schema};
use futures::stream::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use std::sync::Arc;
use uuid::Uuid;

/// Ids per `IN (...)` clause
const FILTER_BATCH: usize = 256;

/// LanceDB vector store (embedded, no server required)
pub struct LanceVectorStore {
    connection: Connection,
    documents_table: String,
    chunks_table: String,
    db_path: String,
}

impl LanceVectorStore {
    /// Create a new store with default path and table names
    pub async fn new() -> Result<Self> {
        Self::from_config(&VectorDbConfig::default()).await
    }

    pub async fn from_config(config: &VectorDbConfig) -> Result<Self> {
        Self::with_tables(
            &config.lancedb_path.to_string_lossy(),
            &config.documents_collection,
            &config.chunks_collection,
        )
        .await
    }

    /// Create a new store at a custom path with default table names
    pub async fn with_path(db_path: &str) -> Result<Self> {
        let defaults = VectorDbConfig::default();
        Self::with_tables(
            db_path,
            &defaults.documents_collection,
            &defaults.chunks_collection,
        )
        .await
    }

    pub async fn with_tables(
        db_path: &str,
        documents_table: &str,
        chunks_table: &str,
    ) -> Result<Self> {
        tracing::info!("Connecting to LanceDB at: {}", db_path);

        let connection = lancedb::connect(db_path)
            .execute()
            .await
            .map_err(|e| VectorDbError::ConnectionFailed(e.to_string()))
            .context("Failed to connect to LanceDB")?;

        Ok(Self {
            connection,
            documents_table: documents_table.to_string(),
            chunks_table: chunks_table.to_string(),
            db_path: db_path.to_string(),
        })
    }

    /// Get default database path (public for CLI version info)
    pub fn default_lancedb_path() -> String {
        crate::paths::PlatformPaths::default_lancedb_path()
            .to_string_lossy()
            .to_string()
    }

    fn documents_schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("relative_path", DataType::Utf8, false),
            Field::new("content_hash", DataType::Utf8, false),
            Field::new("indexed_at", DataType::Int64, false),
        ]))
    }

    fn chunks_schema(dimension: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension as i32,
                ),
                false,
            ),
            Field::new("id", DataType::Utf8, false),
            Field::new("document_id", DataType::Utf8, false),
            Field::new("namespace", DataType::Utf8, false),
            Field::new("type_name", DataType::Utf8, false),
            Field::new("method_name", DataType::Utf8, true),
            Field::new("snippet", DataType::Utf8, false),
            Field::new("token_count", DataType::UInt32, false),
            Field::new("oversized", DataType::Boolean, false),
        ]))
    }

    async fn has_table(&self, name: &str) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .context("Failed to list tables")?;
        Ok(table_names.iter().any(|t| t == name))
    }

    async fn open(&self, name: &str) -> Result<Table> {
        self.connection
            .open_table(name)
            .execute()
            .await
            .map_err(|_| VectorDbError::CollectionNotFound(name.to_string()))
            .with_context(|| format!("Failed to open table '{}'", name))
    }

    /// Open a table, or `None` when it was never created
    async fn open_if_exists(&self, name: &str) -> Result<Option<Table>> {
        if self.has_table(name).await? {
            Ok(Some(self.open(name).await?))
        } else {
            Ok(None)
        }
    }

    async fn create_if_missing(&self, name: &str, schema: Arc<Schema>) -> Result<()> {
        if self.has_table(name).await? {
            tracing::debug!("Table '{}' already exists", name);
            return Ok(());
        }

        let empty_batch = RecordBatch::new_empty(schema.clone());
        let batches = RecordBatchIterator::new(vec![empty_batch].into_iter().map(Ok), schema);

        self.connection
            .create_table(name, Box::new(batches))
            .execute()
            .await
            .map_err(|e| VectorDbError::CollectionCreationFailed {
                collection: name.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!("Created table '{}'", name);
        Ok(())
    }

    /// Vector width of an existing chunks table
    async fn chunks_dimension(table: &Table) -> Result<Option<usize>> {
        let schema = table.schema().await.context("Failed to read table schema")?;
        Ok(schema.field_with_name("vector").ok().and_then(|field| {
            match field.data_type() {
                DataType::FixedSizeList(_, size) => Some(*size as usize),
                _ => None,
            }
        }))
    }

    fn documents_batch(documents: &[Document]) -> Result<RecordBatch> {
        let id_array = StringArray::from(
            documents
                .iter()
                .map(|d| d.id.to_string())
                .collect::<Vec<_>>(),
        );
        let path_array = StringArray::from(
            documents
                .iter()
                .map(|d| d.relative_path.as_str())
                .collect::<Vec<_>>(),
        );
        let hash_array = StringArray::from(
            documents
                .iter()
                .map(|d| d.content_hash.as_str())
                .collect::<Vec<_>>(),
        );
        let indexed_at_array =
            Int64Array::from(documents.iter().map(|d| d.indexed_at).collect::<Vec<_>>());

        RecordBatch::try_new(
            Self::documents_schema(),
            vec![
                Arc::new(id_array),
                Arc::new(path_array),
                Arc::new(hash_array),
                Arc::new(indexed_at_array),
            ],
        )
        .context("Failed to create document RecordBatch")
    }

    fn chunks_batch(chunks: &[Chunk], dimension: usize) -> Result<RecordBatch> {
        if let Some(chunk) = chunks.iter().find(|c| c.embedding.len() != dimension) {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dimension,
                actual: chunk.embedding.len(),
            }
            .into());
        }

        let vector_array = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
            chunks
                .iter()
                .map(|c| Some(c.embedding.iter().copied().map(Some))),
            dimension as i32,
        );
        let id_array =
            StringArray::from(chunks.iter().map(|c| c.id.to_string()).collect::<Vec<_>>());
        let document_id_array = StringArray::from(
            chunks
                .iter()
                .map(|c| c.document_id.to_string())
                .collect::<Vec<_>>(),
        );
        let namespace_array =
            StringArray::from(chunks.iter().map(|c| c.namespace.as_str()).collect::<Vec<_>>());
        let type_name_array =
            StringArray::from(chunks.iter().map(|c| c.type_name.as_str()).collect::<Vec<_>>());
        let method_name_array = StringArray::from(
            chunks
                .iter()
                .map(|c| c.method_name.as_deref())
                .collect::<Vec<_>>(),
        );
        let snippet_array =
            StringArray::from(chunks.iter().map(|c| c.snippet.as_str()).collect::<Vec<_>>());
        let token_count_array = UInt32Array::from(
            chunks
                .iter()
                .map(|c| c.token_count as u32)
                .collect::<Vec<_>>(),
        );
        let oversized_array =
            BooleanArray::from(chunks.iter().map(|c| c.oversized).collect::<Vec<_>>());

        RecordBatch::try_new(
            Self::chunks_schema(dimension),
            vec![
                Arc::new(vector_array),
                Arc::new(id_array),
                Arc::new(document_id_array),
                Arc::new(namespace_array),
                Arc::new(type_name_array),
                Arc::new(method_name_array),
                Arc::new(snippet_array),
                Arc::new(token_count_array),
                Arc::new(oversized_array),
            ],
        )
        .context("Failed to create chunk RecordBatch")
    }

    fn parse_documents(batches: &[RecordBatch]) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for batch in batches {
            let ids = string_column(batch, "id")?;
            let paths = string_column(batch, "relative_path")?;
            let hashes = string_column(batch, "content_hash")?;
            let indexed_at = batch
                .column_by_name("indexed_at")
                .context("Missing indexed_at column")?
                .as_any()
                .downcast_ref::<Int64Array>()
                .context("Invalid indexed_at type")?;

            for i in 0..batch.num_rows() {
                documents.push(Document {
                    id: parse_uuid(ids.value(i))?,
                    relative_path: paths.value(i).to_string(),
                    content_hash: hashes.value(i).to_string(),
                    indexed_at: indexed_at.value(i),
                });
            }
        }
        Ok(documents)
    }

    /// Decode chunk rows; the score column is present only for vector queries
    fn parse_chunks(batches: &[RecordBatch]) -> Result<Vec<(Chunk, Option<f32>)>> {
        let mut chunks = Vec::new();
        for batch in batches {
            let vectors = batch
                .column_by_name("vector")
                .context("Missing vector column")?
                .as_any()
                .downcast_ref::<FixedSizeListArray>()
                .context("Invalid vector type")?;
            let ids = string_column(batch, "id")?;
            let document_ids = string_column(batch, "document_id")?;
            let namespaces = string_column(batch, "namespace")?;
            let type_names = string_column(batch, "type_name")?;
            let method_names = string_column(batch, "method_name")?;
            let snippets = string_column(batch, "snippet")?;
            let token_counts = batch
                .column_by_name("token_count")
                .context("Missing token_count column")?
                .as_any()
                .downcast_ref::<UInt32Array>()
                .context("Invalid token_count type")?;
            let oversized = batch
                .column_by_name("oversized")
                .context("Missing oversized column")?
                .as_any()
                .downcast_ref::<BooleanArray>()
                .context("Invalid oversized type")?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

            for i in 0..batch.num_rows() {
                let vector = vectors.value(i);
                let embedding = vector
                    .as_any()
                    .downcast_ref::<Float32Array>()
                    .context("Invalid vector item type")?
                    .values()
                    .to_vec();

                let chunk = Chunk {
                    id: parse_uuid(ids.value(i))?,
                    document_id: parse_uuid(document_ids.value(i))?,
                    namespace: namespaces.value(i).to_string(),
                    type_name: type_names.value(i).to_string(),
                    method_name: if method_names.is_null(i) {
                        None
                    } else {
                        Some(method_names.value(i).to_string())
                    },
                    snippet: snippets.value(i).to_string(),
                    token_count: token_counts.value(i) as usize,
                    embedding,
                    oversized: oversized.value(i),
                };
                // Cosine distance is 1 - similarity
                let score = distances.map(|d| 1.0 - d.value(i));
                chunks.push((chunk, score));
            }
        }
        Ok(chunks)
    }

    /// Delete rows whose `column` is one of `ids`, in batches
    async fn delete_where_in(&self, table_name: &str, column: &str, ids: &[Uuid]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let Some(table) = self.open_if_exists(table_name).await? else {
            return Ok(0);
        };

        let before = table.count_rows(None).await.context("Failed to count rows")?;
        for batch in ids.chunks(FILTER_BATCH) {
            table
                .delete(&in_filter(column, batch))
                .await
                .map_err(|e| VectorDbError::DeleteFailed(e.to_string()))?;
        }
        let after = table.count_rows(None).await.context("Failed to count rows")?;

        tracing::debug!(
            "Deleted {} rows from '{}'",
            before.saturating_sub(after),
            table_name
        );
        Ok(before.saturating_sub(after))
    }

    async fn add_batch(&self, table_name: &str, batch: RecordBatch) -> Result<()> {
        let table = self.open(table_name).await?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![batch].into_iter().map(Ok), schema);

        table
            .add(Box::new(batches))
            .execute()
            .await
            .map_err(|e| VectorDbError::StoreFailed(e.to_string()))?;
        Ok(())
    }
}

/// Quote a string literal for a LanceDB SQL filter
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn in_filter(column: &str, ids: &[Uuid]) -> String {
    let values: Vec<String> = ids.iter().map(|id| quote(&id.to_string())).collect();
    format!("{} IN ({})", column, values.join(", "))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .with_context(|| format!("Missing {} column", name))?
        .as_any()
        .downcast_ref::<StringArray>()
        .with_context(|| format!("Invalid {} type", name))
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).with_context(|| format!("Invalid id '{}'", value))
}

#[async_trait::async_trait]
impl VectorStore for LanceVectorStore {
    async fn ensure_exists(&self, dimension: usize) -> Result<()> {
        tracing::info!(
            "Initializing LanceDB with dimension {} at {}",
            dimension,
            self.db_path
        );

        self.create_if_missing(&self.documents_table, Self::documents_schema())
            .await?;
        self.create_if_missing(&self.chunks_table, Self::chunks_schema(dimension))
            .await?;

        let table = self.open(&self.chunks_table).await?;
        if let Some(existing) = Self::chunks_dimension(&table).await?
            && existing != dimension
        {
            return Err(EmbeddingError::DimensionMismatch {
                expected: existing,
                actual: dimension,
            })
            .with_context(|| {
                format!(
                    "Table '{}' was created for another embedding model",
                    self.chunks_table
                )
            });
        }
        Ok(())
    }

    async fn get_documents(
        &self,
        filter: &DocumentFilter,
        limit: Option<usize>,
    ) -> Result<Vec<Document>> {
        let Some(table) = self.open_if_exists(&self.documents_table).await? else {
            return Ok(vec![]);
        };

        let mut query = table.query();
        match filter {
            DocumentFilter::All => {}
            DocumentFilter::RelativePath(path) => {
                query = query.only_if(format!("relative_path = {}", quote(path)));
            }
            // Substring matching stays in Rust so LIKE wildcards in paths are literal
            DocumentFilter::PathContains(_) => {}
        }
        let apply_limit_here = !matches!(filter, DocumentFilter::PathContains(_));
        if let (Some(limit), true) = (limit, apply_limit_here) {
            query = query.limit(limit);
        }

        let batches: Vec<RecordBatch> = query
            .execute()
            .await
            .map_err(|e| VectorDbError::QueryFailed(e.to_string()))?
            .try_collect()
            .await
            .context("Failed to collect documents")?;

        let mut documents: Vec<Document> = Self::parse_documents(&batches)?
            .into_iter()
            .filter(|d| filter.matches(d))
            .collect();
        if let Some(limit) = limit {
            documents.truncate(limit);
        }
        Ok(documents)
    }

    async fn upsert_documents(&self, documents: &[Document]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = documents.iter().map(|d| d.id).collect();
        self.delete_where_in(&self.documents_table, "id", &ids)
            .await?;
        self.add_batch(&self.documents_table, Self::documents_batch(documents)?)
            .await?;

        tracing::debug!("Stored {} document records", documents.len());
        Ok(())
    }

    async fn delete_documents(&self, ids: &[Uuid]) -> Result<usize> {
        self.delete_where_in(&self.documents_table, "id", ids).await
    }

    async fn get_chunks(&self, filter: &ChunkFilter, limit: Option<usize>) -> Result<Vec<Chunk>> {
        let Some(table) = self.open_if_exists(&self.chunks_table).await? else {
            return Ok(vec![]);
        };

        let mut chunks = Vec::new();
        let id_batches: Vec<Option<&[Uuid]>> = match filter {
            ChunkFilter::All => vec![None],
            ChunkFilter::DocumentIds(ids) if ids.is_empty() => return Ok(vec![]),
            ChunkFilter::DocumentIds(ids) => ids.chunks(FILTER_BATCH).map(Some).collect(),
        };

        for ids in id_batches {
            let mut query = table.query();
            if let Some(ids) = ids {
                query = query.only_if(in_filter("document_id", ids));
            }
            if let Some(limit) = limit {
                query = query.limit(limit);
            }

            let batches: Vec<RecordBatch> = query
                .execute()
                .await
                .map_err(|e| VectorDbError::QueryFailed(e.to_string()))?
                .try_collect()
                .await
                .context("Failed to collect chunks")?;
            chunks.extend(Self::parse_chunks(&batches)?.into_iter().map(|(c, _)| c));
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
        let dimension = chunks[0].embedding.len();
        let batch = Self::chunks_batch(chunks, dimension)?;

        let ids: Vec<Uuid> = chunks.iter().map(|c| c.id).collect();
        self.delete_where_in(&self.chunks_table, "id", &ids).await?;
        self.add_batch(&self.chunks_table, batch).await?;

        tracing::debug!("Stored {} chunks", chunks.len());
        Ok(())
    }

    async fn delete_chunks(&self, ids: &[Uuid]) -> Result<usize> {
        self.delete_where_in(&self.chunks_table, "id", ids).await
    }

    async fn delete_chunks_of_documents(&self, document_ids: &[Uuid]) -> Result<usize> {
        self.delete_where_in(&self.chunks_table, "document_id", document_ids)
            .await
    }

    async fn search_chunks(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        filter: &ChunkFilter,
    ) -> Result<Vec<(Chunk, f32)>> {
        let Some(table) = self.open_if_exists(&self.chunks_table).await? else {
            return Ok(vec![]);
        };

        let mut query = table
            .vector_search(vector)
            .map_err(|e| VectorDbError::SearchFailed(e.to_string()))?
            .distance_type(DistanceType::Cosine)
            .limit(top_k);

        match filter {
            ChunkFilter::All => {}
            ChunkFilter::DocumentIds(ids) if ids.is_empty() => return Ok(vec![]),
            ChunkFilter::DocumentIds(ids) => {
                query = query.only_if(in_filter("document_id", ids));
            }
        }

        let batches: Vec<RecordBatch> = query
            .execute()
            .await
            .map_err(|e| VectorDbError::SearchFailed(e.to_string()))?
            .try_collect()
            .await
            .context("Failed to collect search results")?;

        let mut results: Vec<(Chunk, f32)> = Self::parse_chunks(&batches)?
            .into_iter()
            .map(|(chunk, score)| (chunk, score.unwrap_or(0.0)))
            .collect();
        results.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(results)
    }

    async fn statistics(&self) -> Result<StoreStatistics> {
        let mut stats = StoreStatistics::default();
        if let Some(table) = self.open_if_exists(&self.documents_table).await? {
            stats.documents = table
                .count_rows(None)
                .await
                .context("Failed to count documents")?;
        }
        if let Some(table) = self.open_if_exists(&self.chunks_table).await? {
            stats.chunks = table
                .count_rows(None)
                .await
                .context("Failed to count chunks")?;
        }
        Ok(stats)
    }

    async fn flush(&self) -> Result<()> {
        // LanceDB persists automatically, no explicit flush needed
        Ok(())
    }
}
