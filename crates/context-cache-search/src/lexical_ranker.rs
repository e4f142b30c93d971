//! Lexical Ranker (spec.md §4.7): BM25 full-text query against the
//! lexical shadow table, using the store's native `bm25()` ranking
//! function.

use rusqlite::Connection;

use crate::error::SearchResult;

/// Runs a full-text match query against `fragments_fts` and returns up to
/// `limit` (fragment id, score) pairs ordered by score ascending — SQLite
/// FTS5's `bm25()` convention, smaller is better, unchanged here per
/// spec.md §4.7. Never raises on a query that matches nothing.
pub fn rank(conn: &Connection, query: &str, limit: usize) -> SearchResult<Vec<(i64, f64)>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }
    let match_query = to_fts5_match_query(query);

    let mut stmt = conn.prepare(
        "SELECT rowid, bm25(fragments_fts) AS score \
         FROM fragments_fts WHERE fragments_fts MATCH ?1 \
         ORDER BY score ASC LIMIT ?2",
    )?;

    let rows = stmt.query_map(rusqlite::params![match_query, limit as i64], |row| {
        let id: i64 = row.get(0)?;
        let score: f64 = row.get(1)?;
        Ok((id, score))
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Turns free text into an FTS5 `MATCH` string that can't raise a syntax
/// error. Each whitespace-separated token is wrapped as its own quoted
/// phrase (internal `"` doubled per FTS5's quoting rule), so query-syntax
/// metacharacters (`"`, `-`, `:`, `*`, parens) in ordinary search text are
/// always treated as literal characters rather than FTS5 operators.
fn to_fts5_match_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|token| format!("\"{}\"", token.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_cache_db::Store;

    #[test]
    fn ranks_matching_fragments() {
        let mut store = Store::open_in_memory().unwrap();
        let conn = store.connection();
        let file_id = context_cache_db::queries::insert_file(conn, "a.md", "fp").unwrap();
        context_cache_db::queries::insert_fragment(
            conn,
            file_id,
            0,
            "TypeScript is a typed superset of JavaScript.",
            "TypeScript is a typed superset of JavaScript.",
            None,
        )
        .unwrap();

        let hits = rank(conn, "TypeScript", 10).unwrap();
        assert_eq!(hits.len(), 1);
        let _ = &mut store;
    }

    #[test]
    fn empty_query_yields_no_hits() {
        let store = Store::open_in_memory().unwrap();
        let hits = rank(store.connection(), "", 10).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn nonmatching_query_yields_empty_not_error() {
        let store = Store::open_in_memory().unwrap();
        let hits = rank(store.connection(), "nonexistentterm", 10).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn syntax_loaded_query_does_not_raise() {
        let mut store = Store::open_in_memory().unwrap();
        let conn = store.connection();
        let file_id = context_cache_db::queries::insert_file(conn, "a.md", "fp").unwrap();
        context_cache_db::queries::insert_fragment(
            conn,
            file_id,
            0,
            "notes on error-handling and field:term edge cases",
            "notes on error-handling and field:term edge cases",
            None,
        )
        .unwrap();

        for query in ["error-handling", "field:term", "\"unbalanced quote", "(paren* -mix)"] {
            let hits = rank(conn, query, 10).unwrap();
            assert!(hits.len() <= 1);
        }
        let _ = &mut store;
    }
}
