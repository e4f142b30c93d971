//! Schema creation and column migrations for the Store.
//!
//! Schema creation is idempotent (`CREATE TABLE IF NOT EXISTS` /
//! `CREATE INDEX IF NOT EXISTS` for every table and index, matching the
//! teacher crate's `schema.rs::CREATE_TABLES_SQL` convention). Deletion of
//! a parent cascades to its children via `ON DELETE CASCADE`, which
//! requires `PRAGMA foreign_keys = ON` on every connection (see
//! [`PRAGMA_CONN_SETTINGS_SQL`]) — a deliberate deviation from the teacher,
//! which runs with foreign keys off for reasons specific to its own
//! mail/reservation graph (see DESIGN.md).

use rusqlite::Connection;

use crate::error::DbResult;

/// Creates every table, index, and virtual table this crate owns.
///
/// `files`/`fragments` back the note corpus; `fragments_fts` is the lexical
/// shadow table (spec.md §3, §6) keyed by the fragment's rowid;
/// `conversations`/`exchanges` back the conversation corpus.
pub const CREATE_TABLES_SQL: &str = r"
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    fingerprint TEXT NOT NULL,
    first_indexed_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    last_updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_files_path ON files(path);

CREATE TABLE IF NOT EXISTS fragments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    text TEXT NOT NULL,
    original_text TEXT NOT NULL,
    embedding BLOB,
    UNIQUE(file_id, position)
);
CREATE INDEX IF NOT EXISTS idx_fragments_file ON fragments(file_id);

-- Lexical shadow table: one row per fragment, external rowid = fragment id.
CREATE VIRTUAL TABLE IF NOT EXISTS fragments_fts USING fts5(content);

-- Cascade from ON DELETE CASCADE bypasses application code, so the shadow
-- row is cleaned up here instead; this keeps it in the same transaction as
-- the cascading fragment delete (spec.md §3 lexical-shadow invariant).
CREATE TRIGGER IF NOT EXISTS fragments_shadow_cleanup AFTER DELETE ON fragments BEGIN
    DELETE FROM fragments_fts WHERE rowid = OLD.id;
END;

CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    source_tag TEXT NOT NULL,
    session_id TEXT NOT NULL,
    indexed_at TEXT NOT NULL,
    archive_pointer TEXT NOT NULL,
    exchange_count INTEGER NOT NULL DEFAULT 0,
    fingerprint TEXT NOT NULL DEFAULT '',
    last_indexed INTEGER,
    client_version TEXT,
    working_directory TEXT
);
CREATE INDEX IF NOT EXISTS idx_conversations_indexed_at_desc ON conversations(indexed_at DESC);
CREATE INDEX IF NOT EXISTS idx_conversations_session ON conversations(session_id);
CREATE INDEX IF NOT EXISTS idx_conversations_source_tag ON conversations(source_tag);

CREATE TABLE IF NOT EXISTS exchanges (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    user_text TEXT NOT NULL,
    assistant_text TEXT NOT NULL,
    tool_calls TEXT,
    parent_turn_id TEXT,
    embedding BLOB,
    UNIQUE(conversation_id, position)
);
CREATE INDEX IF NOT EXISTS idx_exchanges_conversation ON exchanges(conversation_id);
CREATE INDEX IF NOT EXISTS idx_exchanges_timestamp_desc ON exchanges(timestamp DESC);
";

/// Per-connection PRAGMAs, applied on every open. `foreign_keys` must come
/// first so cascade deletes are active before any DML runs.
pub const PRAGMA_CONN_SETTINGS_SQL: &str = r"
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
";

/// Creates the schema if absent. Safe to call on every open.
pub fn create_schema(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(CREATE_TABLES_SQL)
        .map_err(crate::error::DbError::Schema)?;
    Ok(())
}

/// Applies per-connection PRAGMAs.
pub fn apply_pragmas(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(PRAGMA_CONN_SETTINGS_SQL)
        .map_err(crate::error::DbError::Schema)?;
    Ok(())
}

/// Adds columns that were introduced after a store might already exist on
/// disk, e.g. the `fingerprint` column on `conversations`. Idempotent:
/// inspects `PRAGMA table_info` before attempting each `ALTER TABLE`,
/// matching the teacher crate's `migrate.rs` detect-then-add pattern.
pub fn run_migrations(conn: &Connection) -> DbResult<()> {
    ensure_column(conn, "conversations", "fingerprint", "TEXT NOT NULL DEFAULT ''")?;
    ensure_column(conn, "conversations", "last_indexed", "INTEGER")?;
    ensure_column(conn, "conversations", "client_version", "TEXT")?;
    ensure_column(conn, "conversations", "working_directory", "TEXT")?;
    Ok(())
}

fn ensure_column(conn: &Connection, table: &str, column: &str, decl: &str) -> DbResult<()> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .map_err(crate::error::DbError::Schema)?;
    let existing: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(crate::error::DbError::Schema)?
        .collect::<Result<_, _>>()
        .map_err(crate::error::DbError::Schema)?;

    if existing.iter().any(|c| c == column) {
        return Ok(());
    }

    conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl};"))
        .map_err(crate::error::DbError::Schema)?;
    Ok(())
}
