//! Sync cursor persistence — one opaque position marker per user per
//! cursor-capable source.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::types::TriageSource;

use super::{DbError, TriageDb};

impl TriageDb {
    /// Stored cursor position, if an incremental sync has run before.
    pub fn get_cursor(
        &self,
        user_id: &str,
        source: TriageSource,
    ) -> Result<Option<String>, DbError> {
        self.conn_ref()
            .query_row(
                "SELECT position FROM sync_cursors WHERE user_id = ?1 AND source = ?2",
                params![user_id, source.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(DbError::Sqlite)
    }

    /// Replace the stored cursor with a freshly issued one.
    pub fn set_cursor(
        &self,
        user_id: &str,
        source: TriageSource,
        position: &str,
    ) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        self.conn_ref().execute(
            "INSERT INTO sync_cursors (user_id, source, position, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, source) DO UPDATE SET
                position = excluded.position,
                updated_at = excluded.updated_at",
            params![user_id, source.as_str(), position, now],
        )?;
        Ok(())
    }

    /// Drop a stored cursor (used when the provider reports it expired).
    pub fn clear_cursor(&self, user_id: &str, source: TriageSource) -> Result<(), DbError> {
        self.conn_ref().execute(
            "DELETE FROM sync_cursors WHERE user_id = ?1 AND source = ?2",
            params![user_id, source.as_str()],
        )?;
        Ok(())
    }
}
