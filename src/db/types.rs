//! Shared type definitions for the database layer.

use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Corrupt row {id}: {reason}")]
    CorruptRow { id: String, reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}
