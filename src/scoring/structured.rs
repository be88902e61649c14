//! Deterministic scoring for items that carry structured metadata.
//!
//! Pure functions, no I/O, no randomness. Due-date comparisons use calendar
//! days (`NaiveDate`), never time-of-day, so a score cannot flap across a
//! timezone boundary within the same day. Callers inject the clock.

use chrono::{DateTime, NaiveDate, Utc};

use crate::types::{CandidateItem, SourceMetadata, TriageScore};

// ============================================================================
// Due-date buckets
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DueBucket {
    Overdue,
    Today,
    WithinTwoDays,
    WithinWeek,
    Later,
}

impl DueBucket {
    fn of(due: NaiveDate, today: NaiveDate) -> Self {
        let days = (due - today).num_days();
        if days < 0 {
            DueBucket::Overdue
        } else if days == 0 {
            DueBucket::Today
        } else if days <= 2 {
            DueBucket::WithinTwoDays
        } else if days <= 7 {
            DueBucket::WithinWeek
        } else {
            DueBucket::Later
        }
    }

    fn label(&self) -> &'static str {
        match self {
            DueBucket::Overdue => "overdue",
            DueBucket::Today => "due today",
            DueBucket::WithinTwoDays => "due within 2 days",
            DueBucket::WithinWeek => "due within 7 days",
            DueBucket::Later => "due later",
        }
    }
}

// ============================================================================
// Task-manager items
// ============================================================================

/// Provider priority label for reasoning strings. Unknown or out-of-range
/// values fall back to the lowest tier rather than erroring.
fn task_priority_tier(priority: i64) -> (&'static str, i64) {
    match priority {
        4 => ("urgent", 40),
        3 => ("high", 30),
        2 => ("medium", 25),
        _ => ("normal", 20),
    }
}

/// Score a task-manager item from its priority and optional due date.
pub fn score_task(priority: i64, due_date: Option<NaiveDate>, today: NaiveDate) -> TriageScore {
    let (label, base) = task_priority_tier(priority);

    let Some(due) = due_date else {
        return TriageScore::clamped(base, format!("{label} priority, no due date"));
    };

    let bucket = DueBucket::of(due, today);
    let value = match bucket {
        DueBucket::Overdue => (base + 55).min(95),
        DueBucket::Today => (base + 45).min(85),
        DueBucket::WithinTwoDays => (base + 35).min(75),
        DueBucket::WithinWeek => (base + 20).min(60),
        DueBucket::Later => base,
    };

    TriageScore::clamped(value, format!("{label} priority, {}", bucket.label()))
}

// ============================================================================
// Calendar events
// ============================================================================

/// Score a calendar event by how close its start time is.
pub fn score_event(start_time: DateTime<Utc>, now: DateTime<Utc>) -> TriageScore {
    if start_time <= now {
        return TriageScore::clamped(0, "Event already passed");
    }

    let until = start_time - now;
    let (value, reason) = if until <= chrono::Duration::hours(4) {
        (80, "Event within 4 hours")
    } else if until <= chrono::Duration::hours(24) {
        (65, "Event within 24 hours")
    } else if until <= chrono::Duration::hours(48) {
        (50, "Event within 2 days")
    } else if until <= chrono::Duration::days(7) {
        (35, "Event within a week")
    } else {
        (20, "Event more than a week out")
    };

    TriageScore::clamped(value, reason)
}

// ============================================================================
// Secondary-list items
// ============================================================================

/// Score a secondary-list item. Same due-bucket family as tasks, but the
/// provider carries no priority — the base reflects only whether the item
/// has notes attached.
pub fn score_list_item(
    due: Option<NaiveDate>,
    notes: Option<&str>,
    today: NaiveDate,
) -> TriageScore {
    let has_notes = notes.map(|n| !n.trim().is_empty()).unwrap_or(false);
    let base: i64 = if has_notes { 30 } else { 25 };

    let Some(due) = due else {
        return TriageScore::clamped(base, "list item, no due date");
    };

    let bucket = DueBucket::of(due, today);
    let value = match bucket {
        DueBucket::Overdue => (base + 50).min(90),
        DueBucket::Today => (base + 40).min(80),
        DueBucket::WithinTwoDays => (base + 30).min(70),
        DueBucket::WithinWeek => (base + 15).min(55),
        DueBucket::Later => base,
    };

    TriageScore::clamped(value, format!("list item, {}", bucket.label()))
}

// ============================================================================
// Dispatch
// ============================================================================

/// Score any structured candidate. Returns `None` for email items — those
/// go through the semantic scorer instead.
pub fn score_structured(item: &CandidateItem, now: DateTime<Utc>) -> Option<TriageScore> {
    let today = now.date_naive();
    match &item.metadata {
        SourceMetadata::Email { .. } => None,
        SourceMetadata::Task {
            priority, due_date, ..
        } => Some(score_task(*priority, *due_date, today)),
        SourceMetadata::Event { start_time, .. } => Some(score_event(*start_time, now)),
        SourceMetadata::ListItem { due, notes } => {
            Some(score_list_item(*due, notes.as_deref(), today))
        }
    }
}
