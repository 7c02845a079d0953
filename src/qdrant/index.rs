//! [`SemanticIndex`] implementation storing one Qdrant point per chunk.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::config::get_config;
use crate::embedding::{EmbeddingClient, get_embedding_client};
use crate::index::{FilterValue, IndexEntry, IndexError, IndexPage, SearchHit, SemanticIndex};
use crate::qdrant::client::QdrantService;
use crate::qdrant::filters::{
    build_search_filter, entry_filter, entry_heads_filter, stale_chunks_filter,
};
use crate::qdrant::payload::{
    ChunkPayload, build_payload, compute_entry_id, compute_point_id, current_timestamp_rfc3339,
    entry_from_payload,
};
use crate::qdrant::types::PointInsert;

/// Semantic index backed by a Qdrant collection and an embedding provider.
pub struct QdrantIndex {
    service: QdrantService,
    collection: String,
    embedder: Box<dyn EmbeddingClient>,
}

impl QdrantIndex {
    /// Wrap an existing service, collection name, and embedder.
    pub fn new(
        service: QdrantService,
        collection: impl Into<String>,
        embedder: Box<dyn EmbeddingClient>,
    ) -> Self {
        Self {
            service,
            collection: collection.into(),
            embedder,
        }
    }

    /// Build the index from the global configuration and make sure the collection exists.
    pub async fn connect() -> Result<Self, IndexError> {
        let config = get_config();
        let service = QdrantService::new(&config.qdrant_url, config.qdrant_api_key.clone())?;
        let index = Self::new(
            service,
            config.qdrant_collection_name.clone(),
            get_embedding_client()?,
        );
        index.ensure_collection().await?;
        Ok(index)
    }

    /// Create the collection and its payload indexes when missing.
    pub async fn ensure_collection(&self) -> Result<(), IndexError> {
        self.service
            .create_collection_if_not_exists(&self.collection, self.embedder.dimension() as u64)
            .await?;
        self.service.ensure_payload_indexes(&self.collection).await?;
        Ok(())
    }
}

#[async_trait]
impl SemanticIndex for QdrantIndex {
    async fn add(
        &self,
        namespace: &str,
        key: &str,
        chunks: &[String],
        metadata: &Map<String, Value>,
        filter_values: &[FilterValue],
    ) -> Result<String, IndexError> {
        if chunks.is_empty() {
            return Err(IndexError::InvalidRequest(format!(
                "no chunks supplied for {namespace}:{key}"
            )));
        }

        let entry_id = compute_entry_id(namespace, key);
        let vectors = self.embedder.generate_embeddings(chunks.to_vec()).await?;
        if vectors.len() != chunks.len() {
            return Err(IndexError::InvalidRequest(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let timestamp = current_timestamp_rfc3339();
        let points = chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(chunk_index, (text, vector))| PointInsert {
                id: compute_point_id(&entry_id, chunk_index).to_string(),
                vector,
                payload: build_payload(&ChunkPayload {
                    namespace,
                    entry_key: key,
                    entry_id: &entry_id,
                    chunk_index,
                    text,
                    filter_values,
                    metadata,
                    timestamp: &timestamp,
                }),
            })
            .collect();

        // Chunk point ids are deterministic, so the upsert overwrites the previous entry in place;
        // only trailing chunks of a longer previous version remain to be removed.
        let written = self.service.upsert_points(&self.collection, points).await?;
        self.service
            .delete_points(
                &self.collection,
                stale_chunks_filter(namespace, &entry_id, chunks.len()),
            )
            .await?;

        tracing::debug!(namespace, key, entry_id = %entry_id, chunks = written, "Index entry written");
        Ok(entry_id)
    }

    async fn list_entries(
        &self,
        namespace: &str,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<IndexPage, IndexError> {
        let offset = cursor
            .map(|cursor| {
                serde_json::from_str::<Value>(&cursor)
                    .map_err(|error| IndexError::InvalidRequest(format!("bad cursor: {error}")))
            })
            .transpose()?;

        let page = self
            .service
            .scroll_page(&self.collection, entry_heads_filter(namespace), offset, limit)
            .await?;

        let entries: Vec<IndexEntry> = page
            .points
            .iter()
            .filter_map(|(point_id, payload)| {
                let entry = entry_from_payload(payload);
                if entry.is_none() {
                    tracing::warn!(point_id = %point_id, "Skipping point without entry identity");
                }
                entry
            })
            .collect();

        Ok(IndexPage {
            entries,
            next_cursor: page.next_offset.map(|offset| offset.to_string()),
        })
    }

    async fn delete(&self, namespace: &str, entry_id: &str) -> Result<(), IndexError> {
        self.service
            .delete_points(&self.collection, entry_filter(namespace, entry_id))
            .await?;
        Ok(())
    }

    async fn search(
        &self,
        namespace: &str,
        query: &str,
        filter_values: &[FilterValue],
        limit: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        let mut vectors = self
            .embedder
            .generate_embeddings(vec![query.to_string()])
            .await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| IndexError::InvalidRequest("embedder returned no vector".into()))?;

        let points = self
            .service
            .search_points(
                &self.collection,
                vector,
                Some(build_search_filter(namespace, filter_values)),
                limit,
            )
            .await?;

        Ok(points
            .into_iter()
            .filter_map(|point| {
                let payload = point.payload?;
                let text = |field: &str| {
                    payload
                        .get(field)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                Some(SearchHit {
                    entry_id: text("entry_id"),
                    key: text("entry_key"),
                    chunk_index: payload
                        .get("chunk_index")
                        .and_then(Value::as_u64)
                        .unwrap_or_default() as usize,
                    text: text("text"),
                    score: point.score,
                })
            })
            .collect())
    }
}
