//! Triage queue persistence — the idempotent, conflict-aware upsert engine.
//!
//! Queue identity is `(user_id, source, source_id)`. Re-scans refresh a row
//! only while it is still `pending`; once a human has approved, dismissed,
//! or pushed an entry, subsequent syncs leave it untouched. The guard is
//! part of the SQL statement, not application code, so a concurrent review
//! action and a concurrent sync run cannot race each other.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::types::{
    CandidateItem, SourceMetadata, TriageQueueEntry, TriageScore, TriageSource, TriageStatus,
};

use super::{DbError, TriageDb};

impl TriageDb {
    // =========================================================================
    // Upsert engine
    // =========================================================================

    /// Admit a scored candidate into the queue.
    ///
    /// First occurrence inserts a `pending` row; later occurrences refresh
    /// `title/snippet/score/reasoning/source_metadata` via
    /// `ON CONFLICT DO UPDATE ... WHERE status = 'pending'`. A row a human
    /// has already reviewed is left untouched.
    pub fn upsert_candidate(
        &self,
        user_id: &str,
        item: &CandidateItem,
        score: &TriageScore,
    ) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        let metadata = serde_json::to_string(&item.metadata)?;

        self.conn_ref().execute(
            "INSERT INTO triage_queue (
                id, user_id, source, source_id, title, snippet,
                score, reasoning, source_metadata, status, reviewed_at,
                created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'pending', NULL, ?10, ?10)
             ON CONFLICT(user_id, source, source_id) DO UPDATE SET
                title = excluded.title,
                snippet = excluded.snippet,
                score = excluded.score,
                reasoning = excluded.reasoning,
                source_metadata = excluded.source_metadata,
                updated_at = excluded.updated_at
             WHERE triage_queue.status = 'pending'",
            params![
                Uuid::new_v4().to_string(),
                user_id,
                item.source.as_str(),
                item.source_id,
                item.title,
                item.snippet,
                score.value as i64,
                score.reasoning,
                metadata,
                now,
            ],
        )?;
        Ok(())
    }

    // =========================================================================
    // Review transitions
    // =========================================================================

    /// Transition an entry away from `pending`, stamping `reviewed_at`.
    ///
    /// Returns `Ok(true)` if the row moved, `Ok(false)` if it was missing or
    /// already reviewed. There is no transition back to `pending`.
    pub fn set_status(
        &self,
        user_id: &str,
        source: TriageSource,
        source_id: &str,
        new_status: TriageStatus,
    ) -> Result<bool, DbError> {
        if new_status == TriageStatus::Pending {
            return Ok(false);
        }

        let now = Utc::now().to_rfc3339();
        let rows = self.conn_ref().execute(
            "UPDATE triage_queue
             SET status = ?1, reviewed_at = ?2, updated_at = ?2
             WHERE user_id = ?3 AND source = ?4 AND source_id = ?5
               AND status = 'pending'",
            params![new_status.as_str(), now, user_id, source.as_str(), source_id],
        )?;
        Ok(rows > 0)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fetch one entry by identity.
    pub fn get_entry(
        &self,
        user_id: &str,
        source: TriageSource,
        source_id: &str,
    ) -> Result<Option<TriageQueueEntry>, DbError> {
        self.conn_ref()
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM triage_queue
                 WHERE user_id = ?1 AND source = ?2 AND source_id = ?3"),
                params![user_id, source.as_str(), source_id],
                map_entry_row,
            )
            .optional()
            .map_err(DbError::Sqlite)?
            .transpose()
    }

    /// All pending entries for a user, most urgent first.
    pub fn pending_entries(&self, user_id: &str) -> Result<Vec<TriageQueueEntry>, DbError> {
        let mut stmt = self.conn_ref().prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM triage_queue
             WHERE user_id = ?1 AND status = 'pending'
             ORDER BY score DESC, created_at"
        ))?;
        let rows = stmt.query_map(params![user_id], map_entry_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(DbError::Sqlite)??);
        }
        Ok(entries)
    }

    /// Total queue rows for a user (any status).
    pub fn queue_size(&self, user_id: &str) -> Result<usize, DbError> {
        let count: i64 = self.conn_ref().query_row(
            "SELECT COUNT(*) FROM triage_queue WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // =========================================================================
    // Email reconciliation
    // =========================================================================

    /// Clear the archived flag on email entries whose message reappeared in
    /// the inbox. Patches only the `is_archived` field inside the stored
    /// metadata JSON; the review-protected columns are never touched.
    /// Returns the number of rows updated.
    pub fn clear_archived_flags(
        &self,
        user_id: &str,
        reappeared_ids: &[String],
    ) -> Result<usize, DbError> {
        if reappeared_ids.is_empty() {
            return Ok(0);
        }
        let now = Utc::now().to_rfc3339();
        let placeholders: Vec<String> =
            (3..reappeared_ids.len() + 3).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "UPDATE triage_queue
             SET source_metadata = json_set(source_metadata, '$.is_archived', json('false')),
                 updated_at = ?1
             WHERE user_id = ?2 AND source = 'email'
               AND json_extract(source_metadata, '$.is_archived') = 1
               AND source_id IN ({})",
            placeholders.join(", ")
        );

        let mut param_values: Vec<&dyn rusqlite::types::ToSql> = vec![&now, &user_id];
        for id in reappeared_ids {
            param_values.push(id as &dyn rusqlite::types::ToSql);
        }
        let rows = self.conn_ref().execute(&sql, param_values.as_slice())?;
        Ok(rows)
    }
}

const ENTRY_COLUMNS: &str = "id, user_id, source, source_id, title, snippet, score, reasoning,
     source_metadata, status, reviewed_at, created_at, updated_at";

type RawEntryRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    i64,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
);

fn map_entry_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<TriageQueueEntry, DbError>> {
    let raw: RawEntryRow = (
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
    );
    Ok(decode_entry(raw))
}

fn decode_entry(raw: RawEntryRow) -> Result<TriageQueueEntry, DbError> {
    let (
        id,
        user_id,
        source,
        source_id,
        title,
        snippet,
        score,
        reasoning,
        metadata_json,
        status,
        reviewed_at,
        created_at,
        updated_at,
    ) = raw;

    let corrupt = |reason: String| DbError::CorruptRow {
        id: id.clone(),
        reason,
    };

    let source = TriageSource::parse(&source)
        .ok_or_else(|| corrupt(format!("unknown source '{source}'")))?;
    let status = TriageStatus::parse(&status)
        .ok_or_else(|| corrupt(format!("unknown status '{status}'")))?;
    let metadata: SourceMetadata = serde_json::from_str(&metadata_json)
        .map_err(|e| corrupt(format!("bad metadata: {e}")))?;

    let parse_ts = |value: &str| -> Result<DateTime<Utc>, DbError> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| corrupt(format!("bad timestamp '{value}': {e}")))
    };

    Ok(TriageQueueEntry {
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
        reviewed_at: reviewed_at.as_deref().map(parse_ts).transpose()?,
        score: score.clamp(0, 100) as u8,
        id,
        user_id,
        source,
        source_id,
        title,
        snippet,
        reasoning,
        metadata,
        status,
    })
}
