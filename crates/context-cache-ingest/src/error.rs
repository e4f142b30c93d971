//! Error types for the ingestion crate.

use thiserror::Error;

pub type IngestResult<T> = std::result::Result<T, IngestError>;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("store error: {0}")]
    Store(#[from] context_cache_db::DbError),

    #[error("search error: {0}")]
    Search(#[from] context_cache_search::SearchError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Parse(String),
}

impl IngestError {
    /// True if this wraps a store-busy condition (spec.md §5: a racing
    /// writer's native busy behavior surfaces as a write error on the
    /// affected artifact, not a fatal run error).
    #[must_use]
    pub fn is_store_busy(&self) -> bool {
        matches!(self, Self::Store(db_err) if context_cache_db::error::is_busy_error(db_err))
    }
}
