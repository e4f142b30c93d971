//! Embedder (spec.md §4.4): a single-operation interface mapping a string
//! to a fixed-length, deterministic, unit-normalized dense vector.
//!
//! Two implementations ship, the way the teacher's `search-core` crate
//! ships both `FastEmbedEmbedder` (ML-backed) and lighter stand-ins behind
//! the same `TwoTierEmbedder` trait: a real `fastembed`-backed embedder for
//! production use, and a deterministic hash-based stub for tests and as a
//! safe default when no model is configured.

use crate::error::{SearchError, SearchResult};

/// Produces a fixed-dimension, deterministic embedding for a string.
///
/// Implementations must treat identical inputs as yielding identical
/// vectors. Vectors are expected to already be unit-normalized; callers
/// (the Vector Ranker, in particular) do not re-normalize.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> SearchResult<Vec<f32>>;
    fn dimension(&self) -> usize;
}

/// A deterministic, model-free embedder used by tests and as the default
/// when no real model is configured. Maps each input to a vector derived
/// from a SHA-256 digest of the text, so identical strings always produce
/// identical vectors without any external dependency.
#[derive(Debug, Clone)]
pub struct StaticEmbedder {
    dimension: usize,
}

impl StaticEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for StaticEmbedder {
    fn default() -> Self {
        Self::new(context_cache_core::config::DEFAULT_EMBEDDING_DIM)
    }
}

impl Embedder for StaticEmbedder {
    fn embed(&self, text: &str) -> SearchResult<Vec<f32>> {
        use sha2::{Digest, Sha256};

        if text.is_empty() {
            return Err(SearchError::InvalidQuery("empty text".to_string()));
        }

        // Expand the 32-byte digest cyclically to fill `dimension` slots,
        // then L2-normalize. Deterministic and dependency-free.
        let digest = Sha256::digest(text.as_bytes());
        let mut vector: Vec<f32> = (0..self.dimension)
            .map(|i| f32::from(digest[i % digest.len()]) / 255.0)
            .collect();

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut vector {
                *x /= norm;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(feature = "fastembed-backend")]
mod fastembed_backend {
    use std::sync::Mutex;

    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

    use super::{Embedder, SearchError, SearchResult};

    /// `fastembed`-backed quality embedder, loading a local ONNX
    /// sentence-embedding model. Grounded on the teacher crate's
    /// `fastembed::FastEmbedEmbedder`.
    pub struct FastEmbedEmbedder {
        model: Mutex<TextEmbedding>,
        dimension: usize,
    }

    impl std::fmt::Debug for FastEmbedEmbedder {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("FastEmbedEmbedder")
                .field("dimension", &self.dimension)
                .finish_non_exhaustive()
        }
    }

    impl FastEmbedEmbedder {
        /// Loads the `all-MiniLM-L6-v2` model (384 dimensions), matching
        /// this spec's default embedding dimension.
        ///
        /// # Errors
        /// Returns an error if the model cannot be loaded or initialized.
        pub fn load_minilm() -> SearchResult<Self> {
            let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
                .with_show_download_progress(false);
            let model = TextEmbedding::try_new(options)
                .map_err(|e| SearchError::Embedder(format!("failed to load fastembed model: {e}")))?;
            tracing::info!(model = "all-MiniLM-L6-v2", dimension = 384, "embedder loaded");
            Ok(Self {
                model: Mutex::new(model),
                dimension: 384,
            })
        }
    }

    impl Embedder for FastEmbedEmbedder {
        fn embed(&self, text: &str) -> SearchResult<Vec<f32>> {
            if text.is_empty() {
                return Err(SearchError::InvalidQuery("empty text".to_string()));
            }
            let model = self
                .model
                .lock()
                .map_err(|_| SearchError::Embedder("fastembed lock poisoned".to_string()))?;
            let mut embeddings = model
                .embed(vec![text], None)
                .map_err(|e| SearchError::Embedder(format!("fastembed embed failed: {e}")))?;
            embeddings
                .pop()
                .ok_or_else(|| SearchError::Embedder("fastembed returned no vectors".to_string()))
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }
}

#[cfg(feature = "fastembed-backend")]
pub use fastembed_backend::FastEmbedEmbedder;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_yields_same_vector() {
        let embedder = StaticEmbedder::new(384);
        let a = embedder.embed("hello world").unwrap();
        let b = embedder.embed("hello world").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_input_yields_different_vector() {
        let embedder = StaticEmbedder::new(384);
        let a = embedder.embed("hello").unwrap();
        let b = embedder.embed("goodbye").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn vector_has_configured_dimension() {
        let embedder = StaticEmbedder::new(128);
        assert_eq!(embedder.embed("text").unwrap().len(), 128);
        assert_eq!(embedder.dimension(), 128);
    }

    #[test]
    fn rejects_empty_input() {
        let embedder = StaticEmbedder::default();
        assert!(embedder.embed("").is_err());
    }
}
