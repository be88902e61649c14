//! Email adapter — the one cursor-capable source.
//!
//! Incremental runs ask the provider for "what changed since this marker"
//! and surface only new inbox arrivals. When the provider reports the
//! marker expired (or none is stored yet) the adapter falls back to a full
//! resync: recent inbox plus recent starred, unioned by identity with the
//! starred flag winning on conflict, then a fresh cursor is persisted for
//! the next run. A stale cursor never silently drops items.
//!
//! Only header metadata is fetched — subject, sender, short preview. Full
//! bodies are never requested.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::credentials::CredentialStore;
use crate::db::TriageDb;
use crate::types::{CandidateItem, SourceMetadata, TriageSource};

use super::{FetchOutcome, SourceError};

/// Header-fetch calls issued concurrently per chunk.
pub const HEADER_CHUNK: usize = 10;

/// Messages pulled per list (inbox and starred separately) on a full resync.
pub const FULL_SYNC_LIMIT: usize = 25;

// ============================================================================
// Provider capability
// ============================================================================

/// A message reference from a list call; headers are fetched separately.
#[derive(Debug, Clone)]
pub struct MessageStub {
    pub id: String,
}

/// Header metadata for one message. This is all the pipeline ever sees of a
/// message — bodies stay with the provider.
#[derive(Debug, Clone)]
pub struct MessageHeaders {
    pub from: String,
    pub subject: String,
    pub snippet: String,
    pub received_at: Option<DateTime<Utc>>,
    pub is_starred: bool,
    pub is_archived: bool,
}

/// One page of changes since a cursor. `stubs` holds new inbox arrivals
/// only; starred-state changes are deliberately not reconciled here.
#[derive(Debug, Clone, Default)]
pub struct DeltaPage {
    pub stubs: Vec<MessageStub>,
    pub new_cursor: Option<String>,
    pub expired: bool,
}

/// The email provider's wire protocol, abstracted.
#[async_trait]
pub trait EmailSource: Send + Sync {
    async fn list_recent(&self, token: &str, n: usize) -> Result<Vec<MessageStub>, SourceError>;
    async fn list_starred(&self, token: &str, n: usize) -> Result<Vec<MessageStub>, SourceError>;
    async fn list_since(&self, token: &str, cursor: &str) -> Result<DeltaPage, SourceError>;
    async fn current_cursor(&self, token: &str) -> Result<String, SourceError>;
    async fn fetch_headers(&self, token: &str, id: &str) -> Result<MessageHeaders, SourceError>;
}

// ============================================================================
// Adapter
// ============================================================================

pub struct EmailAdapter {
    provider: Arc<dyn EmailSource>,
    credentials: Arc<dyn CredentialStore>,
    db: Arc<Mutex<TriageDb>>,
}

impl EmailAdapter {
    pub fn new(
        provider: Arc<dyn EmailSource>,
        credentials: Arc<dyn CredentialStore>,
        db: Arc<Mutex<TriageDb>>,
    ) -> Self {
        Self {
            provider,
            credentials,
            db,
        }
    }

    /// Fetch candidate items, incrementally when a cursor is on file.
    pub async fn fetch(&self, user_id: &str) -> FetchOutcome {
        let Some(token) = self.credentials.token(user_id, TriageSource::Email.as_str()) else {
            return FetchOutcome::failed(SourceError::NotConnected);
        };

        let stored_cursor = match self.get_cursor(user_id) {
            Ok(cursor) => cursor,
            Err(e) => return FetchOutcome::failed(e),
        };

        if let Some(cursor) = stored_cursor {
            match self.provider.list_since(&token, &cursor).await {
                Ok(page) if !page.expired => return self.incremental(user_id, &token, page).await,
                Ok(_) | Err(SourceError::CursorExpired) => {
                    log::info!("email sync: cursor expired for {user_id}, full resync");
                    if let Err(e) = self.clear_cursor(user_id) {
                        return FetchOutcome::failed(e);
                    }
                }
                Err(e) => return FetchOutcome::failed(e),
            }
        }

        self.full_resync(user_id, &token).await
    }

    /// Common path: new inbox arrivals since the stored cursor.
    async fn incremental(&self, user_id: &str, token: &str, page: DeltaPage) -> FetchOutcome {
        if let Some(new_cursor) = &page.new_cursor {
            if let Err(e) = self.set_cursor(user_id, new_cursor) {
                return FetchOutcome::failed(e);
            }
        }

        let items = self.fetch_items(token, &page.stubs, &HashSet::new()).await;
        log::debug!(
            "email sync: incremental fetch for {user_id} returned {} item(s)",
            items.len()
        );
        FetchOutcome::ok(items)
    }

    /// First run or post-expiry: recent inbox ∪ recent starred, then a
    /// fresh cursor.
    async fn full_resync(&self, user_id: &str, token: &str) -> FetchOutcome {
        let recent = match self.provider.list_recent(token, FULL_SYNC_LIMIT).await {
            Ok(stubs) => stubs,
            Err(e) => return FetchOutcome::failed(e),
        };
        let starred = match self.provider.list_starred(token, FULL_SYNC_LIMIT).await {
            Ok(stubs) => stubs,
            Err(e) => return FetchOutcome::failed(e),
        };

        let starred_ids: HashSet<String> = starred.iter().map(|s| s.id.clone()).collect();

        // Union by identity; a message in both sets appears once, starred.
        let mut seen: HashSet<String> = HashSet::new();
        let mut union: Vec<MessageStub> = Vec::with_capacity(recent.len() + starred.len());
        for stub in recent.iter().chain(starred.iter()) {
            if seen.insert(stub.id.clone()) {
                union.push(stub.clone());
            }
        }

        let items = self.fetch_items(token, &union, &starred_ids).await;

        // Messages can return to the inbox: clear the archived flag on any
        // previously-archived entry that reappeared in the inbox fetch.
        let inbox_ids: Vec<String> = recent.iter().map(|s| s.id.clone()).collect();
        match self.clear_archived(user_id, &inbox_ids) {
            Ok(0) => {}
            Ok(n) => log::info!("email sync: {n} archived entr(ies) back in inbox for {user_id}"),
            Err(e) => log::warn!("email sync: archived reconciliation failed: {e}"),
        }

        // Establish the marker for the next incremental run.
        let mut error = None;
        match self.provider.current_cursor(token).await {
            Ok(cursor) => {
                if let Err(e) = self.set_cursor(user_id, &cursor) {
                    error = Some(e);
                }
            }
            Err(e) => {
                log::warn!("email sync: could not establish cursor for {user_id}: {e}");
                error = Some(e);
            }
        }

        FetchOutcome { items, error }
    }

    /// Fetch headers for a set of stubs, `HEADER_CHUNK` at a time. A failed
    /// header fetch skips that one message.
    async fn fetch_items(
        &self,
        token: &str,
        stubs: &[MessageStub],
        starred_ids: &HashSet<String>,
    ) -> Vec<CandidateItem> {
        let mut items = Vec::with_capacity(stubs.len());

        for chunk in stubs.chunks(HEADER_CHUNK) {
            let calls = chunk
                .iter()
                .map(|stub| self.provider.fetch_headers(token, &stub.id));

            for (stub, result) in chunk.iter().zip(join_all(calls).await) {
                match result {
                    Ok(headers) => items.push(normalize(stub, headers, starred_ids)),
                    Err(e) => {
                        log::debug!("email sync: skipping message {}: {}", stub.id, e);
                    }
                }
            }
        }

        items
    }

    // --- cursor + queue store access ---

    fn get_cursor(&self, user_id: &str) -> Result<Option<String>, SourceError> {
        let db = self.db.lock().map_err(lock_poisoned)?;
        db.get_cursor(user_id, TriageSource::Email)
            .map_err(|e| SourceError::Transient(e.to_string()))
    }

    fn set_cursor(&self, user_id: &str, position: &str) -> Result<(), SourceError> {
        let db = self.db.lock().map_err(lock_poisoned)?;
        db.set_cursor(user_id, TriageSource::Email, position)
            .map_err(|e| SourceError::Transient(e.to_string()))
    }

    fn clear_cursor(&self, user_id: &str) -> Result<(), SourceError> {
        let db = self.db.lock().map_err(lock_poisoned)?;
        db.clear_cursor(user_id, TriageSource::Email)
            .map_err(|e| SourceError::Transient(e.to_string()))
    }

    fn clear_archived(&self, user_id: &str, ids: &[String]) -> Result<usize, SourceError> {
        let db = self.db.lock().map_err(lock_poisoned)?;
        db.clear_archived_flags(user_id, ids)
            .map_err(|e| SourceError::Transient(e.to_string()))
    }
}

fn lock_poisoned<T>(_: std::sync::PoisonError<T>) -> SourceError {
    SourceError::Transient("queue store lock poisoned".to_string())
}

fn normalize(
    stub: &MessageStub,
    headers: MessageHeaders,
    starred_ids: &HashSet<String>,
) -> CandidateItem {
    CandidateItem {
        source: TriageSource::Email,
        source_id: stub.id.clone(),
        title: headers.subject,
        snippet: headers.snippet,
        metadata: SourceMetadata::Email {
            from: headers.from,
            received_at: headers.received_at,
            is_starred: headers.is_starred || starred_ids.contains(&stub.id),
            is_archived: headers.is_archived,
        },
    }
}
