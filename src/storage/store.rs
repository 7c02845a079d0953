//! SQLite-backed store for bill concepts, versions, audit records, and the watermark.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::bill::{BillKey, priority, stage};
use crate::storage::StoreError;
use crate::storage::models::{
    BillConcept, BillVersionRecord, EnrichedDocument, NewSummaryAttempt, PersistOutcome,
    Politician, SummaryAttemptRecord, VersionRef,
};
use crate::storage::schema::{PIPELINE_STATE_ROW, enable_wal, migrate};
use crate::summarization::{BillSummary, SummarySource};

const CONCEPT_COLUMNS: &str = "id, congress, bill_type, bill_number, title, short_title, \
    sponsor_id, committees, latest_version_code, latest_version_priority, latest_action_date, \
    status, summary, tagline, impact_areas, structured_summary, summary_source, created_at, \
    updated_at";

const VERSION_COLUMNS: &str = "id, bill_id, version_code, title, published_date, full_text, \
    source_url, text_length, created_at";

/// Shared handle to the bill database.
#[derive(Clone)]
pub struct BillStore {
    conn: Arc<Mutex<Connection>>,
}

impl BillStore {
    /// Create or open the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let mode = enable_wal(&conn)?;
        tracing::debug!(journal_mode = %mode, "Opened bill database");
        Self::from_connection(conn)
    }

    /// Create an in-memory database.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Whether a version record was already created from `source_url`.
    pub fn version_exists_for_url(&self, source_url: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM bill_versions WHERE source_url = ?1",
                params![source_url],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Look up a concept by its natural key.
    pub fn find_concept(&self, key: &BillKey) -> Result<Option<BillConcept>, StoreError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {CONCEPT_COLUMNS} FROM bill_concepts \
                     WHERE congress = ?1 AND bill_type = ?2 AND bill_number = ?3"
                ),
                params![key.congress, key.bill_type, key.bill_number],
                ConceptRow::read,
            )
            .optional()?;
        row.map(ConceptRow::into_concept).transpose()
    }

    /// Whether a concept with `key` exists.
    pub fn concept_exists(&self, key: &BillKey) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM bill_concepts \
                 WHERE congress = ?1 AND bill_type = ?2 AND bill_number = ?3",
                params![key.congress, key.bill_type, key.bill_number],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Whether a concept row with `bill_id` exists.
    pub fn concept_exists_by_id(&self, bill_id: i64) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        Ok(concept_row_exists(&conn, bill_id)?)
    }

    /// Remove a concept. Its versions and index entry are left for the sweepers.
    pub fn delete_concept(&self, key: &BillKey) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let count = conn.execute(
            "DELETE FROM bill_concepts WHERE congress = ?1 AND bill_type = ?2 AND bill_number = ?3",
            params![key.congress, key.bill_type, key.bill_number],
        )?;
        Ok(count > 0)
    }

    /// Look up a politician by external id.
    pub fn find_politician(&self, external_id: &str) -> Result<Option<Politician>, StoreError> {
        let conn = self.conn.lock();
        let politician = conn
            .query_row(
                "SELECT id, external_id, name FROM politicians WHERE external_id = ?1",
                params![external_id],
                |row| {
                    Ok(Politician {
                        id: row.get(0)?,
                        external_id: row.get(1)?,
                        name: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(politician)
    }

    /// Write one accepted document in a single transaction.
    ///
    /// The sponsor is upserted by external id. The concept is created, or its latest-version and
    /// summary fields are overwritten when the document's priority is at least the stored one.
    /// The version record is inserted only when neither its `(bill, version)` pair nor its
    /// source URL exist yet.
    pub fn persist_enrichment(
        &self,
        document: &EnrichedDocument,
    ) -> Result<PersistOutcome, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let now = now_rfc3339();

        let sponsor_id = match document.sponsor.as_ref() {
            Some(sponsor) => match sponsor.external_id.as_deref() {
                Some(external_id) if !external_id.trim().is_empty() => Some(upsert_politician(
                    &tx,
                    external_id.trim(),
                    &sponsor.name,
                    &now,
                )?),
                _ => None,
            },
            None => None,
        };

        let (bill_id, concept_created, concept_updated) =
            upsert_concept(&tx, document, sponsor_id, &now)?;

        if !concept_row_exists(&tx, bill_id)? {
            let error = StoreError::MissingConcept(document.key.index_key());
            tracing::error!(bill = %document.key, bill_id, error = %error, "Refusing to write orphan version");
            return Err(error);
        }

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO bill_versions \
             (bill_id, version_code, title, published_date, full_text, source_url, text_length, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                bill_id,
                document.version_code,
                document.title,
                document.action_date,
                document.full_text,
                document.source_url,
                document.full_text.chars().count() as i64,
                now,
            ],
        )?;

        tx.commit()?;

        Ok(PersistOutcome {
            bill_id,
            concept_created,
            concept_updated,
            version_inserted: inserted > 0,
        })
    }

    /// Versions stored under a concept, oldest first.
    pub fn versions_for(&self, bill_id: i64) -> Result<Vec<BillVersionRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {VERSION_COLUMNS} FROM bill_versions WHERE bill_id = ?1 ORDER BY id"
        ))?;
        let records = stmt
            .query_map(params![bill_id], row_to_version)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Total number of version records.
    pub fn count_versions(&self) -> Result<i64, StoreError> {
        let conn = self.conn.lock();
        Ok(conn.query_row("SELECT COUNT(*) FROM bill_versions", [], |row| row.get(0))?)
    }

    /// Keyset page of version references with ids greater than `after_id`.
    pub fn list_version_refs(
        &self,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<VersionRef>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, bill_id FROM bill_versions WHERE id > ?1 ORDER BY id LIMIT ?2",
        )?;
        let refs = stmt
            .query_map(params![after_id, limit as i64], |row| {
                Ok(VersionRef {
                    id: row.get(0)?,
                    bill_id: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(refs)
    }

    /// Delete a version record. Returns `false` when it was already gone.
    pub fn delete_version(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let count = conn.execute("DELETE FROM bill_versions WHERE id = ?1", params![id])?;
        Ok(count > 0)
    }

    /// Append an audit record for a rejected summary.
    pub fn record_summary_attempt(&self, attempt: &NewSummaryAttempt<'_>) -> Result<i64, StoreError> {
        let payload = serde_json::to_string(attempt.summary)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO summary_attempts \
             (bill_identifier, version_code, source_url, reason, payload, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                attempt.bill.index_key(),
                attempt.version_code,
                attempt.source_url,
                attempt.reason,
                payload,
                now_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Every audit record, oldest first.
    pub fn summary_attempts(&self) -> Result<Vec<SummaryAttemptRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, bill_identifier, version_code, source_url, reason, payload, created_at \
             FROM summary_attempts ORDER BY id",
        )?;
        let records = stmt
            .query_map([], |row| {
                Ok(SummaryAttemptRecord {
                    id: row.get(0)?,
                    bill_identifier: row.get(1)?,
                    version_code: row.get(2)?,
                    source_url: row.get(3)?,
                    reason: row.get(4)?,
                    payload: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// The "last checked" watermark, if a pass has completed.
    pub fn watermark(&self) -> Result<Option<OffsetDateTime>, StoreError> {
        let conn = self.conn.lock();
        let raw: Option<String> = conn.query_row(
            "SELECT last_checked FROM pipeline_state WHERE id = ?1",
            params![PIPELINE_STATE_ROW],
            |row| row.get(0),
        )?;
        raw.map(|value| {
            OffsetDateTime::parse(&value, &Rfc3339)
                .map_err(|error| StoreError::InvalidData(format!("watermark {value:?}: {error}")))
        })
        .transpose()
    }

    /// Replace the watermark.
    pub fn set_watermark(&self, at: OffsetDateTime) -> Result<(), StoreError> {
        let formatted = at
            .format(&Rfc3339)
            .map_err(|error| StoreError::InvalidData(error.to_string()))?;
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE pipeline_state SET last_checked = ?1 WHERE id = ?2",
            params![formatted, PIPELINE_STATE_ROW],
        )?;
        Ok(())
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

fn concept_row_exists(conn: &Connection, bill_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM bill_concepts WHERE id = ?1",
        params![bill_id],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

fn upsert_politician(
    tx: &Transaction<'_>,
    external_id: &str,
    name: &str,
    now: &str,
) -> Result<i64, StoreError> {
    tx.execute(
        "INSERT INTO politicians (external_id, name, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?3) \
         ON CONFLICT(external_id) DO NOTHING",
        params![external_id, name, now],
    )?;
    Ok(tx.query_row(
        "SELECT id FROM politicians WHERE external_id = ?1",
        params![external_id],
        |row| row.get(0),
    )?)
}

fn upsert_concept(
    tx: &Transaction<'_>,
    document: &EnrichedDocument,
    sponsor_id: Option<i64>,
    now: &str,
) -> Result<(i64, bool, bool), StoreError> {
    let key = &document.key;
    let new_priority = priority(&document.version_code);
    let status = stage(&document.version_code).status();
    let committees = serde_json::to_string(&document.committees)?;
    let summary = &document.summary;
    let impact_areas = serde_json::to_string(&summary.impact_areas)?;
    let structured = serde_json::to_string(&summary.structured_summary)?;
    let source = source_label(summary.source);

    let existing: Option<(i64, i32)> = tx
        .query_row(
            "SELECT id, latest_version_priority FROM bill_concepts \
             WHERE congress = ?1 AND bill_type = ?2 AND bill_number = ?3",
            params![key.congress, key.bill_type, key.bill_number],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match existing {
        None => {
            tx.execute(
                "INSERT INTO bill_concepts (congress, bill_type, bill_number, title, short_title, \
                 sponsor_id, committees, latest_version_code, latest_version_priority, \
                 latest_action_date, status, summary, tagline, impact_areas, structured_summary, \
                 summary_source, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?17)",
                params![
                    key.congress,
                    key.bill_type,
                    key.bill_number,
                    document.title,
                    document.short_title,
                    sponsor_id,
                    committees,
                    document.version_code,
                    new_priority,
                    document.action_date,
                    status,
                    summary.summary,
                    summary.tagline,
                    impact_areas,
                    structured,
                    source,
                    now,
                ],
            )?;
            Ok((tx.last_insert_rowid(), true, false))
        }
        Some((id, stored_priority)) if new_priority >= stored_priority => {
            tx.execute(
                "UPDATE bill_concepts SET title = ?1, short_title = COALESCE(?2, short_title), \
                 sponsor_id = COALESCE(?3, sponsor_id), committees = ?4, latest_version_code = ?5, \
                 latest_version_priority = ?6, latest_action_date = ?7, status = ?8, summary = ?9, \
                 tagline = ?10, impact_areas = ?11, structured_summary = ?12, summary_source = ?13, \
                 updated_at = ?14 WHERE id = ?15",
                params![
                    document.title,
                    document.short_title,
                    sponsor_id,
                    committees,
                    document.version_code,
                    new_priority,
                    document.action_date,
                    status,
                    summary.summary,
                    summary.tagline,
                    impact_areas,
                    structured,
                    source,
                    now,
                    id,
                ],
            )?;
            Ok((id, false, true))
        }
        Some((id, stored_priority)) => {
            tracing::debug!(
                bill = %key,
                version = %document.version_code,
                new_priority,
                stored_priority,
                "Stored concept already at a later stage; keeping its latest fields"
            );
            Ok((id, false, false))
        }
    }
}

fn source_label(source: SummarySource) -> &'static str {
    match source {
        SummarySource::Model => "model",
        SummarySource::Template => "template",
    }
}

fn row_to_version(row: &rusqlite::Row<'_>) -> rusqlite::Result<BillVersionRecord> {
    Ok(BillVersionRecord {
        id: row.get(0)?,
        bill_id: row.get(1)?,
        version_code: row.get(2)?,
        title: row.get(3)?,
        published_date: row.get(4)?,
        full_text: row.get(5)?,
        source_url: row.get(6)?,
        text_length: row.get(7)?,
        created_at: row.get(8)?,
    })
}

struct ConceptRow {
    id: i64,
    congress: u32,
    bill_type: String,
    bill_number: String,
    title: String,
    short_title: Option<String>,
    sponsor_id: Option<i64>,
    committees: String,
    latest_version_code: String,
    latest_version_priority: i32,
    latest_action_date: Option<String>,
    status: String,
    summary: Option<String>,
    tagline: Option<String>,
    impact_areas: String,
    structured_summary: String,
    summary_source: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ConceptRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            congress: row.get(1)?,
            bill_type: row.get(2)?,
            bill_number: row.get(3)?,
            title: row.get(4)?,
            short_title: row.get(5)?,
            sponsor_id: row.get(6)?,
            committees: row.get(7)?,
            latest_version_code: row.get(8)?,
            latest_version_priority: row.get(9)?,
            latest_action_date: row.get(10)?,
            status: row.get(11)?,
            summary: row.get(12)?,
            tagline: row.get(13)?,
            impact_areas: row.get(14)?,
            structured_summary: row.get(15)?,
            summary_source: row.get(16)?,
            created_at: row.get(17)?,
            updated_at: row.get(18)?,
        })
    }

    fn into_concept(self) -> Result<BillConcept, StoreError> {
        let summary = match self.summary {
            Some(text) => Some(BillSummary {
                summary: text,
                tagline: self.tagline.unwrap_or_default(),
                impact_areas: serde_json::from_str(&self.impact_areas)?,
                structured_summary: serde_json::from_str(&self.structured_summary)?,
                source: match self.summary_source.as_deref() {
                    Some("template") => SummarySource::Template,
                    _ => SummarySource::Model,
                },
            }),
            None => None,
        };

        Ok(BillConcept {
            id: self.id,
            key: BillKey::new(self.congress, self.bill_type, self.bill_number),
            title: self.title,
            short_title: self.short_title,
            sponsor_id: self.sponsor_id,
            committees: serde_json::from_str(&self.committees)?,
            latest_version_code: self.latest_version_code,
            latest_version_priority: self.latest_version_priority,
            latest_action_date: self.latest_action_date,
            status: self.status,
            summary,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
