//! Records read from and written to the bill store.

use serde::{Deserialize, Serialize};

use crate::bill::BillKey;
use crate::markup::{Committee, Sponsor};
use crate::summarization::BillSummary;

/// Sponsoring member keyed by an external natural id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Politician {
    /// Row id.
    pub id: i64,
    /// External natural key, e.g. a bioguide id.
    pub external_id: String,
    /// Display name.
    pub name: String,
}

/// Mutable current state of one bill.
#[derive(Debug, Clone)]
pub struct BillConcept {
    /// Row id.
    pub id: i64,
    /// Natural key.
    pub key: BillKey,
    /// Title of the latest accepted version.
    pub title: String,
    /// Short title, when declared.
    pub short_title: Option<String>,
    /// Sponsor row id.
    pub sponsor_id: Option<i64>,
    /// Committees of the latest accepted version.
    pub committees: Vec<Committee>,
    /// Version code of the latest accepted version.
    pub latest_version_code: String,
    /// Priority of that version code.
    pub latest_version_priority: i32,
    /// Latest action date.
    pub latest_action_date: Option<String>,
    /// Derived lifecycle status label.
    pub status: String,
    /// Latest accepted summary.
    pub summary: Option<BillSummary>,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 last update time.
    pub updated_at: String,
}

/// Immutable record of one published document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillVersionRecord {
    /// Row id.
    pub id: i64,
    /// Owning concept row id.
    pub bill_id: i64,
    /// Version code.
    pub version_code: String,
    /// Title as published.
    pub title: String,
    /// Published date.
    pub published_date: Option<String>,
    /// Extracted full text.
    pub full_text: String,
    /// Source URL.
    pub source_url: String,
    /// Length of `full_text` in characters.
    pub text_length: i64,
    /// RFC 3339 creation time.
    pub created_at: String,
}

/// Minimal version reference used by the version sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRef {
    /// Version row id; also the pagination cursor.
    pub id: i64,
    /// Owning concept row id.
    pub bill_id: i64,
}

/// Audit record of a rejected summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryAttemptRecord {
    /// Row id.
    pub id: i64,
    /// `<congress>-<type>-<number>` identifier.
    pub bill_identifier: String,
    /// Version code.
    pub version_code: String,
    /// Source URL.
    pub source_url: String,
    /// Rejection reason.
    pub reason: String,
    /// Rejected payload as JSON.
    pub payload: String,
    /// RFC 3339 creation time.
    pub created_at: String,
}

/// New audit record.
#[derive(Debug, Clone)]
pub struct NewSummaryAttempt<'a> {
    /// Bill the attempt concerns.
    pub bill: &'a BillKey,
    /// Version code.
    pub version_code: &'a str,
    /// Source URL.
    pub source_url: &'a str,
    /// Rejection reason.
    pub reason: &'a str,
    /// Rejected summary.
    pub summary: &'a BillSummary,
}

/// Everything written for one accepted document.
#[derive(Debug, Clone)]
pub struct EnrichedDocument {
    /// Bill natural key.
    pub key: BillKey,
    /// Version code.
    pub version_code: String,
    /// Title as published.
    pub title: String,
    /// Short title, when declared.
    pub short_title: Option<String>,
    /// Sponsor.
    pub sponsor: Option<Sponsor>,
    /// Committees.
    pub committees: Vec<Committee>,
    /// Latest action date.
    pub action_date: Option<String>,
    /// Extracted full text.
    pub full_text: String,
    /// Source URL.
    pub source_url: String,
    /// Accepted summary.
    pub summary: BillSummary,
}

/// What a persistence call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistOutcome {
    /// Concept row id.
    pub bill_id: i64,
    /// A new concept was created.
    pub concept_created: bool,
    /// An existing concept's latest fields were overwritten.
    pub concept_updated: bool,
    /// A new version record was inserted.
    pub version_inserted: bool,
}
