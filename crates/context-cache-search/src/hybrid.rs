//! Hybrid Search (spec.md §4.10): lexical + vector ranking fused by RRF,
//! hydrated against the Store, with min-max score normalization.

use rusqlite::Connection;

use crate::error::SearchResult;
use crate::fusion::fuse_rrf;
use crate::{lexical_ranker, vector_ranker};

/// One hydrated, scored hybrid search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub source_path: String,
    pub position: i64,
    pub text: String,
    pub score: f64,
}

/// Runs the full hybrid search pipeline described in spec.md §4.10.
pub fn search(
    conn: &Connection,
    query_text: &str,
    query_vector: &[f32],
    limit: usize,
    rrf_k: u32,
) -> SearchResult<Vec<SearchHit>> {
    let oversample = limit.saturating_mul(2).max(1);

    let lexical_hits = lexical_ranker::rank(conn, query_text, oversample)?;
    let vector_hits = vector_ranker::rank(conn, query_vector, oversample)?;

    let lexical_ids: Vec<i64> = lexical_hits.into_iter().map(|(id, _)| id).collect();
    let vector_ids: Vec<i64> = vector_hits.into_iter().map(|(id, _)| id).collect();

    let fused = fuse_rrf(&[lexical_ids.as_slice(), vector_ids.as_slice()], rrf_k);
    let retained: Vec<_> = fused.into_iter().take(limit).collect();

    if retained.is_empty() {
        return Ok(Vec::new());
    }

    let max_score = retained.iter().map(|e| e.score).fold(f64::MIN, f64::max);
    let min_score = retained.iter().map(|e| e.score).fold(f64::MAX, f64::min);
    let spread = max_score - min_score;

    let mut hits = Vec::with_capacity(retained.len());
    for entry in retained {
        let display = if spread.abs() < f64::EPSILON {
            1.0
        } else {
            (entry.score - min_score) / spread
        };

        // Hydration-miss is skipped, not reported as an error (spec.md §4.10).
        let Some(hydrated) = context_cache_db::queries::hydrate_fragment(conn, entry.id)? else {
            continue;
        };

        hits.push(SearchHit {
            source_path: hydrated.source_path,
            position: hydrated.position,
            text: hydrated.text,
            score: display,
        });
    }

    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_cache_db::Store;

    #[test]
    fn s1_single_file_roundtrip() {
        let mut store = Store::open_in_memory().unwrap();
        let conn = store.connection();
        let file_id =
            context_cache_db::queries::insert_file(conn, "test.md", "fp").unwrap();

        let vector = vec![0.1f32, 0.2, 0.3, 0.0];
        context_cache_db::queries::insert_fragment(
            conn,
            file_id,
            0,
            "TypeScript is a typed superset of JavaScript.",
            "TypeScript is a typed superset of JavaScript.",
            Some(&vector),
        )
        .unwrap();

        let hits = search(conn, "TypeScript", &vector, 10, 60).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source_path, "test.md");
        assert_eq!(hits[0].position, 0);
        assert!((hits[0].score - 1.0).abs() < 1e-9);
        let _ = &mut store;
    }

    #[test]
    fn top_result_always_scores_one() {
        let mut store = Store::open_in_memory().unwrap();
        let conn = store.connection();
        let file_id = context_cache_db::queries::insert_file(conn, "a.md", "fp").unwrap();
        for i in 0..3 {
            let mut v = vec![0.0f32; 4];
            v[i] = 1.0;
            context_cache_db::queries::insert_fragment(
                conn,
                file_id,
                i as i64,
                &format!("fragment number {i} about rust programming"),
                "orig",
                Some(&v),
            )
            .unwrap();
        }
        let query = vec![1.0, 0.0, 0.0, 0.0];
        let hits = search(conn, "rust", &query, 10, 60).unwrap();
        assert!(!hits.is_empty());
        assert!((hits[0].score - 1.0).abs() < 1e-9);
        for window in hits.windows(2) {
            assert!(window[0].score >= window[1].score);
        }
        let _ = &mut store;
    }

    #[test]
    fn empty_store_yields_no_hits() {
        let store = Store::open_in_memory().unwrap();
        let query = vec![0.0f32; 4];
        let hits = search(store.connection(), "anything", &query, 10, 60).unwrap();
        assert!(hits.is_empty());
    }
}
