//! Error types for the search crate.

use thiserror::Error;

pub type SearchResult<T> = std::result::Result<T, SearchError>;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("store error: {0}")]
    Store(#[from] context_cache_db::DbError),

    #[error("embedder error: {0}")]
    Embedder(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("archive parse error: {0}")]
    ArchiveParse(String),
}
