//! Table definitions for the bill store.

use rusqlite::Connection;

/// Single-row table ids.
pub(crate) const PIPELINE_STATE_ROW: i64 = 1;

const PRAGMAS: &str = r#"
    PRAGMA synchronous=NORMAL;
    PRAGMA temp_store=MEMORY;
"#;

const TABLES: &str = r#"
    CREATE TABLE IF NOT EXISTS politicians (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        external_id TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS bill_concepts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        congress INTEGER NOT NULL,
        bill_type TEXT NOT NULL,
        bill_number TEXT NOT NULL,
        title TEXT NOT NULL,
        short_title TEXT,
        sponsor_id INTEGER REFERENCES politicians(id),
        committees TEXT NOT NULL DEFAULT '[]',
        latest_version_code TEXT NOT NULL,
        latest_version_priority INTEGER NOT NULL,
        latest_action_date TEXT,
        status TEXT NOT NULL,
        summary TEXT,
        tagline TEXT,
        impact_areas TEXT NOT NULL DEFAULT '[]',
        structured_summary TEXT NOT NULL DEFAULT '[]',
        summary_source TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE(congress, bill_type, bill_number)
    );

    -- No foreign key: orphans left by concept removal are cleaned by the version sweeper.
    CREATE TABLE IF NOT EXISTS bill_versions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        bill_id INTEGER NOT NULL,
        version_code TEXT NOT NULL,
        title TEXT NOT NULL,
        published_date TEXT,
        full_text TEXT NOT NULL,
        source_url TEXT NOT NULL UNIQUE,
        text_length INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE(bill_id, version_code)
    );

    CREATE INDEX IF NOT EXISTS idx_bill_versions_bill_id ON bill_versions(bill_id);

    CREATE TABLE IF NOT EXISTS summary_attempts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        bill_identifier TEXT NOT NULL,
        version_code TEXT NOT NULL,
        source_url TEXT NOT NULL,
        reason TEXT NOT NULL,
        payload TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS pipeline_state (
        id INTEGER PRIMARY KEY,
        last_checked TEXT
    );

    INSERT OR IGNORE INTO pipeline_state (id, last_checked) VALUES (1, NULL);
"#;

/// Apply pragmas and create every table.
pub(crate) fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(PRAGMAS)?;
    conn.execute_batch(TABLES)
}

/// Switch a file-backed database to write-ahead logging.
pub(crate) fn enable_wal(conn: &Connection) -> rusqlite::Result<String> {
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
}
