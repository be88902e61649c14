//! Canonical types shared across the triage pipeline.
//!
//! Candidate items are the transient, normalized shape every source adapter
//! produces; queue entries are the persisted shape the review UI reads.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Sources
// ============================================================================

/// The external source a candidate item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageSource {
    Email,
    TaskManager,
    Calendar,
    SecondaryList,
}

impl TriageSource {
    /// Stable string form, used as the DB discriminant column and in
    /// source-qualified error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            TriageSource::Email => "email",
            TriageSource::TaskManager => "task_manager",
            TriageSource::Calendar => "calendar",
            TriageSource::SecondaryList => "secondary_list",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(TriageSource::Email),
            "task_manager" => Some(TriageSource::TaskManager),
            "calendar" => Some(TriageSource::Calendar),
            "secondary_list" => Some(TriageSource::SecondaryList),
            _ => None,
        }
    }
}

impl std::fmt::Display for TriageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Candidate items (transient)
// ============================================================================

/// Source-specific structured payload, decoded at the adapter boundary.
///
/// The orchestrator never looks inside this; only the matching scorer and
/// the review UI do. Serialized into the `source_metadata` JSON column on
/// admission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceMetadata {
    Email {
        from: String,
        received_at: Option<DateTime<Utc>>,
        is_starred: bool,
        is_archived: bool,
    },
    Task {
        /// Provider priority, 1 (normal) through 4 (urgent).
        priority: i64,
        due_date: Option<NaiveDate>,
        project: Option<String>,
    },
    Event {
        start_time: DateTime<Utc>,
        location: Option<String>,
    },
    ListItem {
        due: Option<NaiveDate>,
        notes: Option<String>,
    },
}

/// One normalized unit of data from an external source, prior to scoring.
///
/// Created fresh on every fetch, discarded after scoring; never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateItem {
    pub source: TriageSource,
    /// Provider-assigned identifier, opaque to the pipeline.
    pub source_id: String,
    pub title: String,
    pub snippet: String,
    pub metadata: SourceMetadata,
}

// ============================================================================
// Scores
// ============================================================================

/// Pure scorer output for one candidate item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageScore {
    /// Urgency, always within 0..=100.
    pub value: u8,
    /// Short human-readable justification.
    pub reasoning: String,
}

impl TriageScore {
    /// Build a score, clamping any out-of-range input into 0..=100.
    pub fn clamped(value: i64, reasoning: impl Into<String>) -> Self {
        Self {
            value: value.clamp(0, 100) as u8,
            reasoning: reasoning.into(),
        }
    }
}

// ============================================================================
// Queue entries (persisted)
// ============================================================================

/// Review state of a queue entry. Transitions only away from `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageStatus {
    Pending,
    Approved,
    Dismissed,
    PushedToContext,
}

impl TriageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriageStatus::Pending => "pending",
            TriageStatus::Approved => "approved",
            TriageStatus::Dismissed => "dismissed",
            TriageStatus::PushedToContext => "pushed_to_context",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TriageStatus::Pending),
            "approved" => Some(TriageStatus::Approved),
            "dismissed" => Some(TriageStatus::Dismissed),
            "pushed_to_context" => Some(TriageStatus::PushedToContext),
            _ => None,
        }
    }
}

/// A persisted triage queue row. Identity is `(user_id, source, source_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageQueueEntry {
    pub id: String,
    pub user_id: String,
    pub source: TriageSource,
    pub source_id: String,
    pub title: String,
    pub snippet: String,
    pub score: u8,
    pub reasoning: String,
    pub metadata: SourceMetadata,
    pub status: TriageStatus,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Sync results
// ============================================================================

/// Aggregate result of one triage sync run, rendered by the dashboard shell
/// as a partial-success warning when `errors` is non-empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Items admitted into the queue (inserted or refreshed).
    pub added: usize,
    /// Items scored below threshold or skipped after a scoring failure.
    pub skipped: usize,
    /// Source-qualified messages for hard per-source failures.
    pub errors: Vec<String>,
}

impl SyncReport {
    /// Fold another report's counters into this one.
    pub fn merge(&mut self, other: SyncReport) {
        self.added += other.added;
        self.skipped += other.skipped;
        self.errors.extend(other.errors);
    }
}
