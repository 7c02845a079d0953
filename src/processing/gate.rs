//! Ingestion decision gate: is a candidate document worth processing?

use crate::bill::{BillIdentifier, VersionChange, compare, parse_source_url};
use crate::storage::{BillStore, StoreError};

/// Reason given when the exact source URL already produced a version record.
pub const REASON_ALREADY_PROCESSED: &str = "exact file already processed";
/// Reason given when no concept exists for the identifier.
pub const REASON_NEW_BILL: &str = "new bill";

/// Outcome of the gate for one candidate. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionDecision {
    /// Whether the pipeline should continue with this document.
    pub should_process: bool,
    /// Human-readable explanation, for audit logs only.
    pub reason: String,
    /// Concept row id when the bill is already known.
    pub existing_bill_id: Option<i64>,
}

impl IngestionDecision {
    fn process(reason: impl Into<String>, existing_bill_id: Option<i64>) -> Self {
        Self {
            should_process: true,
            reason: reason.into(),
            existing_bill_id,
        }
    }

    fn skip(reason: impl Into<String>, existing_bill_id: Option<i64>) -> Self {
        Self {
            should_process: false,
            reason: reason.into(),
            existing_bill_id,
        }
    }
}

/// Decide whether the document at `source_url` should be processed.
///
/// In order: an already-processed URL is skipped; an unparseable filename is processed anyway
/// so the extracting step can fail it loudly; an unknown bill is processed; a known bill is
/// processed only when the candidate version ranks strictly higher than the stored latest one.
pub fn decide(store: &BillStore, source_url: &str) -> Result<IngestionDecision, StoreError> {
    if store.version_exists_for_url(source_url)? {
        return Ok(IngestionDecision::skip(REASON_ALREADY_PROCESSED, None));
    }

    let BillIdentifier { key, version_code } = match parse_source_url(source_url) {
        Ok(identifier) => identifier,
        Err(error) => {
            return Ok(IngestionDecision::process(
                format!("identifier not parseable from filename ({error}); attempting ingestion"),
                None,
            ));
        }
    };

    let Some(concept) = store.find_concept(&key)? else {
        return Ok(IngestionDecision::process(REASON_NEW_BILL, None));
    };

    let change = compare(&version_code, &concept.latest_version_code);
    let reason = format!(
        "{}: candidate {} vs stored {}",
        change.as_str(),
        version_code,
        concept.latest_version_code
    );
    Ok(match change {
        VersionChange::Upgrade => IngestionDecision::process(reason, Some(concept.id)),
        VersionChange::Same | VersionChange::Downgrade => {
            IngestionDecision::skip(reason, Some(concept.id))
        }
    })
}
