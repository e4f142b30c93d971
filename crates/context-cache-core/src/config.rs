//! Configuration for Context Cache.
//!
//! All scalars are read once per run from `CC_`-prefixed environment
//! variables, matching the teacher crate's env-var-driven `Config::from_env`
//! convention. Configuration is not watched; a new process is required to
//! pick up changes.

use std::path::PathBuf;

/// Default fragment length in characters (spec.md §6).
pub const DEFAULT_CHUNK_LEN: usize = 500;
/// Default fragment overlap in characters (spec.md §6).
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;
/// Default embedding dimension (spec.md §4.4, §6).
pub const DEFAULT_EMBEDDING_DIM: usize = 384;
/// Default result limit for search operations (spec.md §6).
pub const DEFAULT_RESULT_LIMIT: usize = 10;
/// Default Reciprocal Rank Fusion constant (spec.md §4.9, §6).
pub const DEFAULT_RRF_K: u32 = 60;

/// Runtime configuration consumed by the engine.
///
/// Mirrors spec.md §6's "Configuration surface" exactly: every field here
/// is one of the scalars the engine consumes from its caller.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the engine's SQLite store file.
    pub store_path: PathBuf,
    /// Root of the Markdown note tree to index.
    pub notes_root: PathBuf,
    /// Fragment character length.
    pub chunk_len: usize,
    /// Fragment character overlap.
    pub chunk_overlap: usize,
    /// Identifier of the embedding model to load at runtime.
    pub embedding_model: String,
    /// Dimension of embeddings produced by the configured model.
    pub embedding_dim: usize,
    /// Default result limit for search operations.
    pub default_limit: usize,
    /// Reciprocal Rank Fusion constant K.
    pub rrf_k: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            notes_root: default_notes_root(),
            chunk_len: DEFAULT_CHUNK_LEN,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            embedding_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            default_limit: DEFAULT_RESULT_LIMIT,
            rrf_k: DEFAULT_RRF_K,
        }
    }
}

impl Config {
    /// Load configuration from the process environment, falling back to
    /// defaults for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            store_path: env_path("CC_STORE_PATH").unwrap_or(defaults.store_path),
            notes_root: env_path("CC_NOTES_ROOT").unwrap_or(defaults.notes_root),
            chunk_len: env_usize("CC_CHUNK_LEN", defaults.chunk_len),
            chunk_overlap: env_usize("CC_CHUNK_OVERLAP", defaults.chunk_overlap),
            embedding_model: std::env::var("CC_EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            embedding_dim: env_usize("CC_EMBEDDING_DIM", defaults.embedding_dim),
            default_limit: env_usize("CC_DEFAULT_LIMIT", defaults.default_limit),
            rrf_k: env_usize("CC_RRF_K", defaults.rrf_k as usize) as u32,
        }
    }
}

fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("context-cache")
        .join("cache.db")
}

fn default_notes_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("notes")
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().map(PathBuf::from)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.chunk_len, 500);
        assert_eq!(cfg.chunk_overlap, 50);
        assert_eq!(cfg.embedding_dim, 384);
        assert_eq!(cfg.default_limit, 10);
        assert_eq!(cfg.rrf_k, 60);
    }
}
