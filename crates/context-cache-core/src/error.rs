//! Error types shared by the core crate.
//!
//! Each crate in this workspace owns its own error enum rather than
//! funneling everything through one global type; this one covers the
//! primitives (config loading, fragmentation, hashing) that live here.

use thiserror::Error;

/// Result type alias for `context-cache-core` operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
