//! Error types for the protocol surface.

use thiserror::Error;

pub type ServerResult<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("store error: {0}")]
    Store(#[from] context_cache_db::DbError),

    #[error("search error: {0}")]
    Search(#[from] context_cache_search::SearchError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An unknown tool name routed to the engine (spec.md §7: raised, not
    /// swallowed).
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
}
