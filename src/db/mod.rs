//! SQLite-backed durable state for the triage pipeline.
//!
//! The database lives at `~/.dayboard/dayboard.db` and holds the two pieces
//! of state this crate owns: the triage review queue and per-source sync
//! cursors. WAL mode keeps dashboard reads responsive while a sync run
//! writes. Everything else (entities, meetings, credentials for other
//! subsystems) belongs to the dashboard shell's own stores.

use std::path::PathBuf;

use rusqlite::Connection;

pub mod cursors;
pub mod queue;
pub mod types;

pub use types::DbError;

/// Schema applied on every open. `IF NOT EXISTS` keeps it idempotent.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS triage_queue (
    id              TEXT NOT NULL,
    user_id         TEXT NOT NULL,
    source          TEXT NOT NULL,
    source_id       TEXT NOT NULL,
    title           TEXT NOT NULL,
    snippet         TEXT NOT NULL,
    score           INTEGER NOT NULL,
    reasoning       TEXT NOT NULL,
    source_metadata TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'pending',
    reviewed_at     TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    PRIMARY KEY (user_id, source, source_id)
);

CREATE INDEX IF NOT EXISTS idx_triage_queue_status
    ON triage_queue (user_id, status);

CREATE TABLE IF NOT EXISTS sync_cursors (
    user_id    TEXT NOT NULL,
    source     TEXT NOT NULL,
    position   TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (user_id, source)
);

CREATE TABLE IF NOT EXISTS provider_tokens (
    user_id  TEXT NOT NULL,
    provider TEXT NOT NULL,
    token    TEXT NOT NULL,
    PRIMARY KEY (user_id, provider)
);
";

pub struct TriageDb {
    conn: Connection,
}

impl TriageDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Open (or create) the database at `~/.dayboard/dayboard.db`.
    pub fn open() -> Result<Self, DbError> {
        Self::open_at(Self::db_path()?)
    }

    /// Open a database at an explicit path. Useful for testing.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL for concurrent read performance while a sync run writes
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self { conn })
    }

    /// Open an in-memory database. Test-only entry point.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    /// Resolve the default database path: `~/.dayboard/dayboard.db`.
    fn db_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".dayboard").join("dayboard.db"))
    }
}
