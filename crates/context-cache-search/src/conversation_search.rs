//! Conversation Search (spec.md §4.11): substring + timestamp-range recall
//! over Exchanges, joined to their owning Conversation. Deliberately not
//! fused — a recall device, not a relevance device.

use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::error::SearchResult;

/// One hydrated conversation search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationHit {
    pub conversation_id: String,
    pub session_id: String,
    pub timestamp: NaiveDateTime,
    pub source_tag: String,
    pub position: i64,
    pub user_text: String,
    pub assistant_text: String,
    pub score: f64,
    pub archive_pointer: String,
}

/// Searches Exchanges whose user or assistant text contains `query`
/// (case-sensitive substring match), optionally bounded by the owning
/// Conversation's timestamp, ordered by Conversation timestamp descending
/// then Exchange position ascending.
pub fn search(
    conn: &Connection,
    query: &str,
    after: Option<NaiveDateTime>,
    before: Option<NaiveDateTime>,
    limit: usize,
) -> SearchResult<Vec<ConversationHit>> {
    let pattern = format!("%{}%", escape_like(query));
    let mut stmt = conn.prepare(
        "SELECT c.id, c.session_id, c.indexed_at, c.source_tag, e.position, \
                e.user_text, e.assistant_text, c.archive_pointer \
         FROM exchanges e JOIN conversations c ON c.id = e.conversation_id \
         WHERE (e.user_text LIKE ?1 ESCAPE '\\' OR e.assistant_text LIKE ?1 ESCAPE '\\') \
           AND (?2 IS NULL OR c.indexed_at >= ?2) \
           AND (?3 IS NULL OR c.indexed_at <= ?3) \
         ORDER BY c.indexed_at DESC, e.position ASC \
         LIMIT ?4",
    )?;

    let rows = stmt.query_map(
        rusqlite::params![pattern, after, before, limit as i64],
        |row| {
            Ok(ConversationHit {
                conversation_id: row.get(0)?,
                session_id: row.get(1)?,
                timestamp: row.get(2)?,
                source_tag: row.get(3)?,
                position: row.get(4)?,
                user_text: row.get(5)?,
                assistant_text: row.get(6)?,
                score: 1.0,
                archive_pointer: row.get(7)?,
            })
        },
    )?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Escapes `LIKE` wildcard metacharacters (`%`, `_`, `\`) so a caller's
/// literal query is matched as a literal substring rather than a pattern,
/// pairing with the query's `ESCAPE '\\'` clause.
fn escape_like(query: &str) -> String {
    query.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
