//! CRUD operations on the Store's tables.
//!
//! Every function here takes `&Connection` so it can be called either on a
//! bare connection or on a `rusqlite::Transaction` (which derefs to
//! `Connection`), matching the teacher crate's `queries.rs` convention of
//! writing connection-agnostic query functions that the indexers compose
//! inside their own transaction boundaries.

use chrono::NaiveDateTime;
use context_cache_core::models::{Conversation, Exchange, File, SourceTag};
use rusqlite::{Connection, OptionalExtension, params};

use crate::embedding::{decode_embedding, encode_embedding};
use crate::error::DbResult;

// =============================================================================
// Files
// =============================================================================

fn map_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<File> {
    Ok(File {
        id: Some(row.get(0)?),
        path: row.get(1)?,
        fingerprint: row.get(2)?,
        first_indexed_at: row.get::<_, NaiveDateTime>(3)?,
        last_updated_at: row.get::<_, NaiveDateTime>(4)?,
    })
}

pub fn get_file_by_path(conn: &Connection, path: &str) -> DbResult<Option<File>> {
    conn.query_row(
        "SELECT id, path, fingerprint, first_indexed_at, last_updated_at FROM files WHERE path = ?1",
        params![path],
        map_file,
    )
    .optional()
    .map_err(Into::into)
}

pub fn list_files(conn: &Connection) -> DbResult<Vec<File>> {
    let mut stmt = conn.prepare(
        "SELECT id, path, fingerprint, first_indexed_at, last_updated_at FROM files ORDER BY id",
    )?;
    let rows = stmt.query_map([], map_file)?;
    Ok(rows.collect::<Result<_, _>>()?)
}

pub fn insert_file(conn: &Connection, path: &str, fingerprint: &str) -> DbResult<i64> {
    conn.execute(
        "INSERT INTO files (path, fingerprint) VALUES (?1, ?2)",
        params![path, fingerprint],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_file_fingerprint(conn: &Connection, file_id: i64, fingerprint: &str) -> DbResult<()> {
    conn.execute(
        "UPDATE files SET fingerprint = ?1, last_updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
        params![fingerprint, file_id],
    )?;
    Ok(())
}

/// Deletes a `File` row. Cascades to its `Fragment`s (and, via trigger,
/// their lexical-shadow rows) in the same statement/transaction.
pub fn delete_file(conn: &Connection, file_id: i64) -> DbResult<()> {
    conn.execute("DELETE FROM files WHERE id = ?1", params![file_id])?;
    Ok(())
}

// =============================================================================
// Fragments + lexical shadow
// =============================================================================

/// Deletes all `Fragment`s owned by a `File`. Used on the replace-on-change
/// path, where the `File` row survives but its children are rebuilt.
pub fn delete_fragments_of_file(conn: &Connection, file_id: i64) -> DbResult<()> {
    conn.execute("DELETE FROM fragments WHERE file_id = ?1", params![file_id])?;
    Ok(())
}

/// Inserts a `Fragment` row and its matching lexical-shadow row. Per
/// spec.md §4.1, these two writes must succeed in the same transaction as
/// the owning `File` upsert; callers are expected to invoke this inside a
/// `Store::transaction` block.
pub fn insert_fragment(
    conn: &Connection,
    file_id: i64,
    position: i64,
    text: &str,
    original_text: &str,
    embedding: Option<&[f32]>,
) -> DbResult<i64> {
    let embedding_bytes = embedding.map(encode_embedding);
    conn.execute(
        "INSERT INTO fragments (file_id, position, text, original_text, embedding) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![file_id, position, text, original_text, embedding_bytes],
    )?;
    let fragment_id = conn.last_insert_rowid();
    conn.execute(
        "INSERT INTO fragments_fts (rowid, content) VALUES (?1, ?2)",
        params![fragment_id, text],
    )?;
    Ok(fragment_id)
}

/// A fragment hydrated with its owning file's relative path, for hybrid
/// search result hydration (spec.md §4.10 step 5).
pub struct HydratedFragment {
    pub fragment_id: i64,
    pub source_path: String,
    pub position: i64,
    pub text: String,
}

pub fn hydrate_fragment(conn: &Connection, fragment_id: i64) -> DbResult<Option<HydratedFragment>> {
    conn.query_row(
        "SELECT f.id, files.path, f.position, f.text \
         FROM fragments f JOIN files ON files.id = f.file_id \
         WHERE f.id = ?1",
        params![fragment_id],
        |row| {
            Ok(HydratedFragment {
                fragment_id: row.get(0)?,
                source_path: row.get(1)?,
                position: row.get(2)?,
                text: row.get(3)?,
            })
        },
    )
    .optional()
    .map_err(Into::into)
}

/// All fragments that carry an embedding, for the Vector Ranker's exact
/// scan (spec.md §4.8). Ordered by id ascending to give a stable,
/// insertion-order tie-break.
pub fn fragments_with_embeddings(conn: &Connection) -> DbResult<Vec<(i64, Vec<f32>)>> {
    let mut stmt = conn.prepare(
        "SELECT id, embedding FROM fragments WHERE embedding IS NOT NULL ORDER BY id ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        let id: i64 = row.get(0)?;
        let bytes: Vec<u8> = row.get(1)?;
        Ok((id, bytes))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, bytes) = row?;
        out.push((id, decode_embedding(&bytes)?));
    }
    Ok(out)
}

// =============================================================================
// Conversations
// =============================================================================

fn map_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let source_tag: String = row.get(1)?;
    Ok(Conversation {
        id: row.get(0)?,
        source_tag: SourceTag::from(source_tag.as_str()),
        session_id: row.get(2)?,
        indexed_at: row.get::<_, NaiveDateTime>(3)?,
        archive_pointer: row.get(4)?,
        exchange_count: row.get(5)?,
        fingerprint: row.get(6)?,
        client_version: row.get(7)?,
        working_directory: row.get(8)?,
    })
}

const CONVERSATION_COLUMNS: &str = "id, source_tag, session_id, indexed_at, archive_pointer, \
     exchange_count, fingerprint, client_version, working_directory";

pub fn get_conversation(conn: &Connection, id: &str) -> DbResult<Option<Conversation>> {
    conn.query_row(
        &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
        params![id],
        map_conversation,
    )
    .optional()
    .map_err(Into::into)
}

pub fn list_conversations_by_source(
    conn: &Connection,
    source_tag: &SourceTag,
) -> DbResult<Vec<Conversation>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE source_tag = ?1 ORDER BY indexed_at DESC"
    ))?;
    let rows = stmt.query_map(params![source_tag.as_str()], map_conversation)?;
    Ok(rows.collect::<Result<_, _>>()?)
}

/// Insert-or-replace a `Conversation` row, keyed by its identifier.
pub fn upsert_conversation(conn: &Connection, conversation: &Conversation) -> DbResult<()> {
    conn.execute(
        "INSERT INTO conversations \
         (id, source_tag, session_id, indexed_at, archive_pointer, exchange_count, \
          fingerprint, client_version, working_directory) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
         ON CONFLICT(id) DO UPDATE SET \
           source_tag = excluded.source_tag, \
           session_id = excluded.session_id, \
           indexed_at = excluded.indexed_at, \
           archive_pointer = excluded.archive_pointer, \
           exchange_count = excluded.exchange_count, \
           fingerprint = excluded.fingerprint, \
           client_version = excluded.client_version, \
           working_directory = excluded.working_directory",
        params![
            conversation.id,
            conversation.source_tag.as_str(),
            conversation.session_id,
            conversation.indexed_at,
            conversation.archive_pointer,
            conversation.exchange_count,
            conversation.fingerprint,
            conversation.client_version,
            conversation.working_directory,
        ],
    )?;
    Ok(())
}

/// Deletes a `Conversation` row. Cascades to its `Exchange`s.
pub fn delete_conversation(conn: &Connection, id: &str) -> DbResult<()> {
    conn.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
    Ok(())
}

// =============================================================================
// Exchanges
// =============================================================================

fn map_exchange(row: &rusqlite::Row<'_>) -> rusqlite::Result<Exchange> {
    let tool_calls: Option<String> = row.get(6)?;
    let tool_calls = tool_calls
        .map(|s| serde_json::from_str::<Vec<String>>(&s))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e)))?;

    Ok(Exchange {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        position: row.get(2)?,
        timestamp: row.get::<_, NaiveDateTime>(3)?,
        user_text: row.get(4)?,
        assistant_text: row.get(5)?,
        tool_calls,
        parent_turn_id: row.get(7)?,
        embedding: None,
    })
}

const EXCHANGE_COLUMNS: &str = "id, conversation_id, position, timestamp, user_text, \
     assistant_text, tool_calls, parent_turn_id";

pub fn delete_exchanges_of_conversation(conn: &Connection, conversation_id: &str) -> DbResult<()> {
    conn.execute(
        "DELETE FROM exchanges WHERE conversation_id = ?1",
        params![conversation_id],
    )?;
    Ok(())
}

pub fn insert_exchange(conn: &Connection, exchange: &Exchange) -> DbResult<()> {
    let tool_calls_json = exchange
        .tool_calls
        .as_ref()
        .map(|v| serde_json::to_string(v).expect("Vec<String> always serializes"));
    let embedding_bytes = exchange.embedding.as_deref().map(encode_embedding);
    conn.execute(
        "INSERT INTO exchanges \
         (id, conversation_id, position, timestamp, user_text, assistant_text, \
          tool_calls, parent_turn_id, embedding) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            exchange.id,
            exchange.conversation_id,
            exchange.position,
            exchange.timestamp,
            exchange.user_text,
            exchange.assistant_text,
            tool_calls_json,
            exchange.parent_turn_id,
            embedding_bytes,
        ],
    )?;
    Ok(())
}

pub fn list_exchanges_of_conversation(
    conn: &Connection,
    conversation_id: &str,
) -> DbResult<Vec<Exchange>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EXCHANGE_COLUMNS} FROM exchanges WHERE conversation_id = ?1 ORDER BY position ASC"
    ))?;
    let rows = stmt.query_map(params![conversation_id], map_exchange)?;
    Ok(rows.collect::<Result<_, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn file_lifecycle_round_trips() {
        let mut store = Store::open_in_memory().unwrap();
        let conn = &store.conn;
        let id = insert_file(conn, "a.md", "hash1").unwrap();
        let found = get_file_by_path(conn, "a.md").unwrap().unwrap();
        assert_eq!(found.id, Some(id));
        assert_eq!(found.fingerprint, "hash1");

        update_file_fingerprint(conn, id, "hash2").unwrap();
        let found = get_file_by_path(conn, "a.md").unwrap().unwrap();
        assert_eq!(found.fingerprint, "hash2");

        delete_file(conn, id).unwrap();
        assert!(get_file_by_path(conn, "a.md").unwrap().is_none());
        let _ = &mut store;
    }

    #[test]
    fn fragment_cascade_clears_lexical_shadow() {
        let mut store = Store::open_in_memory().unwrap();
        let conn = &store.conn;
        let file_id = insert_file(conn, "a.md", "hash1").unwrap();
        insert_fragment(conn, file_id, 0, "hello world", "hello world", None).unwrap();

        let fts_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM fragments_fts", [], |r| r.get(0))
            .unwrap();
        assert_eq!(fts_count, 1);

        delete_file(conn, file_id).unwrap();

        let fts_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM fragments_fts", [], |r| r.get(0))
            .unwrap();
        assert_eq!(fts_count, 0);
        let _ = &mut store;
    }

    #[test]
    fn conversation_upsert_replaces_existing() {
        let mut store = Store::open_in_memory().unwrap();
        let conn = &store.conn;
        let conv = Conversation {
            id: "c1".to_string(),
            session_id: "s1".to_string(),
            source_tag: SourceTag::ClaudeCode,
            indexed_at: NaiveDateTime::default(),
            archive_pointer: "/tmp/c1.jsonl".to_string(),
            exchange_count: 0,
            fingerprint: "fp1".to_string(),
            client_version: None,
            working_directory: None,
        };
        upsert_conversation(conn, &conv).unwrap();
        let mut conv2 = conv.clone();
        conv2.fingerprint = "fp2".to_string();
        upsert_conversation(conn, &conv2).unwrap();

        let fetched = get_conversation(conn, "c1").unwrap().unwrap();
        assert_eq!(fetched.fingerprint, "fp2");
        let _ = &mut store;
    }

    #[test]
    fn exchange_cascade_on_conversation_delete() {
        let mut store = Store::open_in_memory().unwrap();
        let conn = &store.conn;
        let conv = Conversation {
            id: "c1".to_string(),
            session_id: "s1".to_string(),
            source_tag: SourceTag::ClaudeCode,
            indexed_at: NaiveDateTime::default(),
            archive_pointer: "/tmp/c1.jsonl".to_string(),
            exchange_count: 1,
            fingerprint: "fp1".to_string(),
            client_version: None,
            working_directory: None,
        };
        upsert_conversation(conn, &conv).unwrap();
        insert_exchange(
            conn,
            &Exchange {
                id: "e1".to_string(),
                conversation_id: "c1".to_string(),
                position: 0,
                timestamp: NaiveDateTime::default(),
                user_text: "hi".to_string(),
                assistant_text: "hello".to_string(),
                tool_calls: None,
                parent_turn_id: None,
                embedding: None,
            },
        )
        .unwrap();

        assert_eq!(list_exchanges_of_conversation(conn, "c1").unwrap().len(), 1);
        delete_conversation(conn, "c1").unwrap();
        assert_eq!(list_exchanges_of_conversation(conn, "c1").unwrap().len(), 0);
        let _ = &mut store;
    }
}
