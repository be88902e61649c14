//! Dayboard triage core — ingestion and admission pipeline.
//!
//! Polls four external sources (email, task manager, calendar, secondary
//! task list), scores every candidate item on one 0-100 urgency scale, and
//! admits items at or above threshold into a durable review queue. Runs are
//! idempotent: re-scans refresh pending entries and never touch entries a
//! human has already reviewed. The email source syncs incrementally through
//! an opaque provider cursor, falling back to a full resync when the cursor
//! expires.
//!
//! The dashboard shell owns everything around this: UI, auth, provider
//! OAuth flows, and scheduling. It wires concrete providers into a
//! [`sync::SyncContext`] and calls [`sync::run_triage_sync`] per user.

pub mod config;
pub mod credentials;
pub mod db;
pub mod scoring;
pub mod sources;
pub mod sync;
pub mod types;

pub use sync::{run_triage_sync, SyncContext};
pub use types::{SyncReport, TriageQueueEntry, TriageStatus};
