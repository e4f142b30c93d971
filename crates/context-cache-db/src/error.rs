//! Error types for the Store.

use thiserror::Error;

pub type DbResult<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to open store at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("schema error: {0}")]
    Schema(#[source] rusqlite::Error),

    #[error("query error: {0}")]
    Query(#[source] rusqlite::Error),

    #[error("transaction error: {0}")]
    Transaction(#[source] rusqlite::Error),

    #[error("invalid embedding payload: expected length to be a multiple of 4 bytes, got {0}")]
    InvalidEmbeddingPayload(usize),
}

impl From<rusqlite::Error> for DbError {
    fn from(source: rusqlite::Error) -> Self {
        Self::Query(source)
    }
}

/// True if the given error indicates the store file was busy (another
/// writer connection holds the lock). Surfaced by ingestion as a per-item
/// error per spec.md §5 ("the store's native busy behavior surfaces as a
/// write error").
#[must_use]
pub fn is_busy_error(err: &DbError) -> bool {
    matches!(
        err,
        DbError::Query(rusqlite::Error::SqliteFailure(e, _))
            | DbError::Transaction(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::DatabaseBusy || e.code == rusqlite::ErrorCode::DatabaseLocked
    )
}
