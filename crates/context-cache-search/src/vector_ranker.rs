//! Vector Ranker (spec.md §4.8): exact cosine-similarity scan over every
//! embedded Fragment.

use rusqlite::Connection;

use crate::error::SearchResult;

/// Computes cosine similarity between two equal-length vectors. Returns
/// `None` if either vector has zero norm (spec.md §4.8: "a fragment with
/// zero-norm embedding yields an undefined similarity and is excluded").
fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return None;
    }
    Some(dot / (norm_a * norm_b))
}

/// Enumerates every Fragment with a stored embedding, computes cosine
/// similarity to `query_vector`, and returns up to `limit` (fragment id,
/// similarity) pairs ordered by similarity descending. Tie-breaking is by
/// insertion order (the store already returns fragments ordered by id
/// ascending, and the sort below is stable).
pub fn rank(conn: &Connection, query_vector: &[f32], limit: usize) -> SearchResult<Vec<(i64, f32)>> {
    let candidates = context_cache_db::queries::fragments_with_embeddings(conn)?;

    let mut scored: Vec<(i64, f32)> = candidates
        .into_iter()
        .filter_map(|(id, vector)| cosine_similarity(query_vector, &vector).map(|sim| (id, sim)))
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_cache_db::Store;

    #[test]
    fn unit_vector_round_trip_similarity_is_one() {
        let mut store = Store::open_in_memory().unwrap();
        let conn = store.connection();
        let file_id = context_cache_db::queries::insert_file(conn, "a.md", "fp").unwrap();

        let mut v = vec![0.0f32; 384];
        v[0] = 1.0;
        context_cache_db::queries::insert_fragment(conn, file_id, 0, "text", "text", Some(&v))
            .unwrap();

        let hits = rank(conn, &v, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].1 - 1.0).abs() < 1e-4);
        let _ = &mut store;
    }

    #[test]
    fn zero_norm_embedding_is_excluded() {
        let mut store = Store::open_in_memory().unwrap();
        let conn = store.connection();
        let file_id = context_cache_db::queries::insert_file(conn, "a.md", "fp").unwrap();
        let zero = vec![0.0f32; 384];
        context_cache_db::queries::insert_fragment(conn, file_id, 0, "text", "text", Some(&zero))
            .unwrap();

        let mut query = vec![0.0f32; 384];
        query[0] = 1.0;
        let hits = rank(conn, &query, 10).unwrap();
        assert!(hits.is_empty());
        let _ = &mut store;
    }

    #[test]
    fn results_ordered_by_similarity_descending() {
        let mut store = Store::open_in_memory().unwrap();
        let conn = store.connection();
        let file_id = context_cache_db::queries::insert_file(conn, "a.md", "fp").unwrap();

        let mut close = vec![0.0f32; 4];
        close[0] = 0.9;
        close[1] = 0.1;
        let mut far = vec![0.0f32; 4];
        far[1] = 1.0;

        context_cache_db::queries::insert_fragment(conn, file_id, 0, "far", "far", Some(&far))
            .unwrap();
        context_cache_db::queries::insert_fragment(conn, file_id, 1, "close", "close", Some(&close))
            .unwrap();

        let query = vec![1.0f32, 0.0, 0.0, 0.0];
        let hits = rank(conn, &query, 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].1 > hits[1].1);
        let _ = &mut store;
    }
}
