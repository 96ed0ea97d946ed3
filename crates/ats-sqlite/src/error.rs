//! Error types for the SQLite storage backend.

use ats_core::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SqliteError>;

#[derive(Debug, Error)]
pub enum SqliteError {
    #[error("SQLite error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("attestation {0} already exists")]
    AlreadyExists(String),

    #[error("attestation {0} not found")]
    NotFound(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<SqliteError> for StoreError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::AlreadyExists(id) => StoreError::AlreadyExists(id),
            SqliteError::NotFound(id) => StoreError::NotFound(id),
            SqliteError::Json(e) => StoreError::Serialization(e.to_string()),
            SqliteError::Database(e) => StoreError::Backend(format!("sqlite: {e}")),
            SqliteError::Migration(msg) => StoreError::Backend(format!("migration: {msg}")),
            SqliteError::Io(e) => StoreError::Backend(format!("io: {e}")),
        }
    }
}
