//! Persistent storage for bill concepts, version records, the audit trail, and the watermark.
//!
//! Backed by SQLite through `rusqlite`; every multi-row write happens in one short local
//! transaction and never spans an external call.

pub mod models;
mod schema;
pub mod store;

use thiserror::Error;

pub use models::{
    BillConcept, BillVersionRecord, EnrichedDocument, NewSummaryAttempt, PersistOutcome,
    Politician, SummaryAttemptRecord, VersionRef,
};
pub use store::BillStore;

/// Errors raised by the bill store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite reported a failure.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A JSON column could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A stored value could not be interpreted.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
    /// A version record was about to be written without its concept. This is a logic bug.
    #[error("Bill concept {0} missing while writing its version record")]
    MissingConcept(String),
}
