//! Source adapters — fetch candidate items from external providers and
//! normalize them into the canonical shape.
//!
//! Adapters never propagate failures upward: `fetch` always returns a
//! `FetchOutcome`, with any failure captured as a typed `SourceError` so the
//! orchestrator can isolate it from sibling sources.

pub mod calendar;
pub mod email;
pub mod lists;
pub mod tasks;

use thiserror::Error;

use crate::types::CandidateItem;

/// Error taxonomy shared by all source adapters.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// No credential on file — the user never connected this provider.
    #[error("not connected")]
    NotConnected,

    /// The credential lacks a required permission. Expected condition; the
    /// source is skipped, not reported.
    #[error("insufficient scope")]
    InsufficientScope,

    /// Network failure, 5xx, or an unexpected response shape.
    #[error("provider error: {0}")]
    Transient(String),

    /// Provider throttling. Surfaced in the run's error list but never
    /// aborts the batch.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The provider no longer honors our sync cursor. Handled internally by
    /// falling back to a full resync; never reaches the sync report.
    #[error("cursor expired")]
    CursorExpired,
}

impl SourceError {
    /// Soft conditions produce zero items without an error entry.
    pub fn is_soft(&self) -> bool {
        matches!(self, SourceError::NotConnected | SourceError::InsufficientScope)
    }
}

/// What one adapter run produced. `error` and `items` can coexist — a full
/// email resync that fetched items but failed to establish a fresh cursor
/// reports both.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub items: Vec<CandidateItem>,
    pub error: Option<SourceError>,
}

impl FetchOutcome {
    pub fn ok(items: Vec<CandidateItem>) -> Self {
        Self { items, error: None }
    }

    pub fn failed(error: SourceError) -> Self {
        Self {
            items: Vec::new(),
            error: Some(error),
        }
    }
}
