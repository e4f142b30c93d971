//! Embedding byte layout (spec.md §6).
//!
//! Each embedding is serialized as the packed little-endian IEEE-754 32-bit
//! floating point values of its dimensions, concatenated in order. At
//! dimension 384 the payload is exactly 1,536 bytes.

use crate::error::{DbError, DbResult};

/// Serializes a dense vector into its on-disk byte payload.
#[must_use]
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Reconstructs a dense vector from its on-disk byte payload.
pub fn decode_embedding(bytes: &[u8]) -> DbResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(DbError::InvalidEmbeddingPayload(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_384_dim_vector() {
        let vector: Vec<f32> = (0..384).map(|i| i as f32 * 0.01).collect();
        let bytes = encode_embedding(&vector);
        assert_eq!(bytes.len(), 1536);
        let decoded = decode_embedding(&bytes).unwrap();
        assert_eq!(decoded, vector);
    }

    #[test]
    fn rejects_misaligned_payload() {
        assert!(decode_embedding(&[0u8, 1, 2]).is_err());
    }
}
