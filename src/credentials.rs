//! Credential lookup for source adapters.
//!
//! Connecting a provider (OAuth consent, key entry) is a dashboard-shell
//! concern; this crate only asks "is there a bearer token on file for this
//! user and provider". The SQLite store keeps decrypted tokens in the local
//! database so the pipeline runs without an external secret service.

use std::sync::{Arc, Mutex};

use crate::db::{DbError, TriageDb};

/// Read-only credential access, keyed by user and provider.
///
/// `None` means the user never connected the provider — adapters surface
/// that as a soft "not connected" condition, not a failure.
pub trait CredentialStore: Send + Sync {
    fn token(&self, user_id: &str, provider: &str) -> Option<String>;
}

/// Token store backed by the `provider_tokens` table.
pub struct SqliteTokenStore {
    db: Arc<Mutex<TriageDb>>,
}

impl SqliteTokenStore {
    pub fn new(db: Arc<Mutex<TriageDb>>) -> Self {
        Self { db }
    }

    /// Persist (or replace) a token. Called by the shell's connect flow.
    pub fn set_token(&self, user_id: &str, provider: &str, token: &str) -> Result<(), DbError> {
        let db = self.db.lock().map_err(|_| DbError::LockPoisoned)?;
        db.conn_ref().execute(
            "INSERT INTO provider_tokens (user_id, provider, token)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, provider) DO UPDATE SET token = excluded.token",
            rusqlite::params![user_id, provider, token],
        )?;
        Ok(())
    }
}

impl CredentialStore for SqliteTokenStore {
    fn token(&self, user_id: &str, provider: &str) -> Option<String> {
        let db = self.db.lock().ok()?;
        db.conn_ref()
            .query_row(
                "SELECT token FROM provider_tokens WHERE user_id = ?1 AND provider = ?2",
                rusqlite::params![user_id, provider],
                |row| row.get(0),
            )
            .ok()
    }
}
