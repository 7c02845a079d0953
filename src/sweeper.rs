//! Consistency sweeps that repair drift between the bill store and the semantic index.
//!
//! Both jobs page through their collection with stable cursors (Qdrant scroll offsets and
//! version-id keyset pages), so entries added or removed mid-scan never cause a skip or a
//! repeat. Deleting something that is already gone is a no-op, which makes both jobs safe to
//! restart from the beginning at any time.
//!
//! Ingestion writes an index entry before it commits the bill, so the index sweep leaves entries
//! written within a grace window alone even when their bill is not in the store yet.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::{pin_mut, stream::StreamExt};
use thiserror::Error;
use time::OffsetDateTime;

use crate::bill::BillKey;
use crate::index::{
    BILL_IDENTIFIER_FILTER, BILL_NAMESPACE, IndexEntry, IndexError, SemanticIndex, stream_entries,
};
use crate::storage::{BillStore, StoreError};

const VERSION_PAGE_SIZE: usize = 500;

/// Default age below which index entries without a bill are not yet treated as orphans.
pub const DEFAULT_INDEX_GRACE: Duration = Duration::from_secs(15 * 60);

/// Errors that abort a sweep. Rerunning the sweep after fixing the cause is always safe.
#[derive(Debug, Error)]
pub enum SweepError {
    /// Listing or deleting index entries failed.
    #[error("Semantic index request failed: {0}")]
    Index(#[from] IndexError),
    /// Reading or deleting store rows failed.
    #[error("Store request failed: {0}")]
    Store(#[from] StoreError),
}

/// Counts reported by one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Items inspected.
    pub scanned: usize,
    /// Items whose owning concept does not exist.
    pub orphaned: usize,
    /// Orphans actually deleted by this run.
    pub deleted: usize,
    /// Items ignored because their bill identifier could not be derived.
    pub unidentified: usize,
    /// Orphan candidates left alone because they were written within the grace window.
    pub recent: usize,
}

/// Delete index entries whose bill identifier has no matching concept.
///
/// Entries written less than `grace` ago are skipped. Entries without a write time are eligible.
pub async fn sweep_index(
    index: &dyn SemanticIndex,
    store: &BillStore,
    grace: Duration,
) -> Result<SweepReport, SweepError> {
    let cutoff = OffsetDateTime::now_utc() - grace;
    let mut report = SweepReport::default();
    let entries = stream_entries(index, BILL_NAMESPACE);
    pin_mut!(entries);

    while let Some(entry) = entries.next().await {
        let entry = entry?;
        report.scanned += 1;

        let Some(key) = entry_bill_key(&entry) else {
            report.unidentified += 1;
            tracing::warn!(entry_id = %entry.entry_id, key = %entry.key, "Index entry has no usable bill identifier; leaving it");
            continue;
        };
        if store.concept_exists(&key)? {
            continue;
        }
        if entry.updated_at.is_some_and(|written| written > cutoff) {
            report.recent += 1;
            tracing::debug!(entry_id = %entry.entry_id, bill = %key, "Index entry without bill is too recent to sweep");
            continue;
        }

        report.orphaned += 1;
        index.delete(BILL_NAMESPACE, &entry.entry_id).await?;
        report.deleted += 1;
        tracing::info!(entry_id = %entry.entry_id, bill = %key, "Deleted orphaned index entry");
    }

    tracing::info!(
        scanned = report.scanned,
        orphaned = report.orphaned,
        deleted = report.deleted,
        unidentified = report.unidentified,
        recent = report.recent,
        "Index sweep finished"
    );
    Ok(report)
}

/// Delete version records whose owning concept no longer exists.
pub fn sweep_versions(store: &BillStore) -> Result<SweepReport, SweepError> {
    let mut report = SweepReport::default();
    let mut after_id = 0;

    loop {
        let page = store.list_version_refs(after_id, VERSION_PAGE_SIZE)?;
        let Some(last) = page.last() else {
            break;
        };
        after_id = last.id;

        let mut owners: HashMap<i64, bool> = HashMap::new();
        for version in &page {
            report.scanned += 1;
            let exists = match owners.get(&version.bill_id) {
                Some(exists) => *exists,
                None => {
                    let exists = store.concept_exists_by_id(version.bill_id)?;
                    owners.insert(version.bill_id, exists);
                    exists
                }
            };
            if exists {
                continue;
            }

            report.orphaned += 1;
            if store.delete_version(version.id)? {
                report.deleted += 1;
                tracing::info!(version_id = version.id, bill_id = version.bill_id, "Deleted orphaned version record");
            }
        }

        if page.len() < VERSION_PAGE_SIZE {
            break;
        }
    }

    tracing::info!(
        scanned = report.scanned,
        orphaned = report.orphaned,
        deleted = report.deleted,
        "Version sweep finished"
    );
    Ok(report)
}

/// Bill key from the entry's identifier filter, falling back to the entry key.
fn entry_bill_key(entry: &IndexEntry) -> Option<BillKey> {
    entry
        .filter_value(BILL_IDENTIFIER_FILTER)
        .and_then(BillKey::parse_index_key)
        .or_else(|| BillKey::parse_index_key(&entry.key))
}
