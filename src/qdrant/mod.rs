//! Qdrant vector store integration.

pub mod client;
pub mod filters;
pub mod index;
pub mod payload;
pub mod types;

pub use client::QdrantService;
pub use index::QdrantIndex;
pub use payload::compute_entry_id;
pub use types::{PointInsert, QdrantError, ScoredPoint, ScrollPage};
