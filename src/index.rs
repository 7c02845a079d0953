//! Contract of the semantic index that stores bill text chunks.
//!
//! Ingestion only calls [`SemanticIndex::add`]. Listing and deletion serve the consistency
//! sweeper, and search serves downstream query features. Entries are addressed by a
//! `(namespace, key)` pair; re-adding a key replaces the previous entry.

use async_stream::try_stream;
use async_trait::async_trait;
use futures_core::Stream;
use serde_json::{Map, Value};
use thiserror::Error;
use time::OffsetDateTime;

use crate::bill::BillKey;
use crate::embedding::EmbeddingClientError;
use crate::qdrant::QdrantError;

/// Namespace holding bill text chunks.
pub const BILL_NAMESPACE: &str = "bills";
/// Filter name carrying the `<congress>-<type>-<number>` identifier.
pub const BILL_IDENTIFIER_FILTER: &str = "billIdentifier";

const LIST_PAGE_SIZE: usize = 256;

/// Errors raised by semantic index implementations. All of them are transient for ingestion.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Vector store request failed.
    #[error(transparent)]
    Qdrant(#[from] QdrantError),
    /// Embedding provider failed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// Caller supplied an unusable argument (empty chunk list, bad cursor).
    #[error("Invalid index request: {0}")]
    InvalidRequest(String),
}

/// Named value an entry can be filtered by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterValue {
    /// Filter name, e.g. `billIdentifier`.
    pub name: String,
    /// Filter value, e.g. `119-hr-1`.
    pub value: String,
}

impl FilterValue {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Filter values attached to every chunk of a bill.
pub fn bill_filter_values(key: &BillKey) -> Vec<FilterValue> {
    vec![
        FilterValue::new(BILL_IDENTIFIER_FILTER, key.index_key()),
        FilterValue::new("congress", key.congress.to_string()),
        FilterValue::new("billType", key.bill_type.clone()),
    ]
}

/// One logical entry of the index (all chunks stored under one key).
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Opaque identifier returned by [`SemanticIndex::add`].
    pub entry_id: String,
    /// Namespace the entry lives in.
    pub namespace: String,
    /// Key the entry was added under.
    pub key: String,
    /// Filter values stored with the entry.
    pub filter_values: Vec<FilterValue>,
    /// Free-form metadata stored with the entry.
    pub metadata: Map<String, Value>,
    /// When the entry was last written, if the backend records it.
    pub updated_at: Option<OffsetDateTime>,
}

impl IndexEntry {
    /// First filter value named `name`.
    pub fn filter_value(&self, name: &str) -> Option<&str> {
        self.filter_values
            .iter()
            .find(|filter| filter.name == name)
            .map(|filter| filter.value.as_str())
    }
}

/// One page of a listing plus the cursor for the next page.
#[derive(Debug, Clone, Default)]
pub struct IndexPage {
    /// Entries on this page.
    pub entries: Vec<IndexEntry>,
    /// Cursor for the following page, `None` at the end.
    pub next_cursor: Option<String>,
}

/// Chunk returned by a similarity search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Entry the chunk belongs to.
    pub entry_id: String,
    /// Key of that entry.
    pub key: String,
    /// Position of the chunk within the entry.
    pub chunk_index: usize,
    /// Chunk text.
    pub text: String,
    /// Similarity score.
    pub score: f32,
}

/// Interface implemented by semantic index backends.
#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// Store `chunks` under `(namespace, key)`, replacing any previous entry. Returns the entry id.
    async fn add(
        &self,
        namespace: &str,
        key: &str,
        chunks: &[String],
        metadata: &Map<String, Value>,
        filter_values: &[FilterValue],
    ) -> Result<String, IndexError>;

    /// List entries in `namespace`, resuming from `cursor`.
    async fn list_entries(
        &self,
        namespace: &str,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<IndexPage, IndexError>;

    /// Delete an entry. Deleting a missing entry succeeds.
    async fn delete(&self, namespace: &str, entry_id: &str) -> Result<(), IndexError>;

    /// Similarity search restricted to entries matching every filter value.
    async fn search(
        &self,
        namespace: &str,
        query: &str,
        filter_values: &[FilterValue],
        limit: usize,
    ) -> Result<Vec<SearchHit>, IndexError>;
}

/// Stream every entry of `namespace`, following listing cursors page by page.
pub fn stream_entries<'a>(
    index: &'a dyn SemanticIndex,
    namespace: &'a str,
) -> impl Stream<Item = Result<IndexEntry, IndexError>> + 'a {
    try_stream! {
        let mut cursor: Option<String> = None;
        loop {
            let page = index.list_entries(namespace, cursor.take(), LIST_PAGE_SIZE).await?;
            for entry in page.entries {
                yield entry;
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
    }
}
