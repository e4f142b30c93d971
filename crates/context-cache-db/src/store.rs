//! The Store: a single embedded SQLite database file, opened synchronously.
//!
//! Spec.md §5: store connections are opened at operation boundary and
//! closed on all exit paths. This workspace runs single-threaded per
//! process (§5), so `Store` wraps one connection rather than a pool.

use std::path::Path;

use rusqlite::Connection;

use crate::error::{DbError, DbResult};
use crate::schema;

/// A handle to the engine's embedded relational store.
pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    /// Opens (creating if absent) the store file at `path`, applies
    /// PRAGMAs, and brings the schema up to date. Path-open failure is
    /// fatal per spec.md §4.1.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| DbError::Open {
            path: path.display().to_string(),
            source,
        })?;
        schema::apply_pragmas(&conn)?;
        schema::create_schema(&conn)?;
        schema::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Opens an in-memory store, used by tests and by one-shot CLI
    /// invocations that never need to persist across processes.
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::apply_pragmas(&conn)?;
        schema::create_schema(&conn)?;
        schema::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Runs `f` inside a single transaction; commits on `Ok`, rolls back on
    /// `Err`. Used by both indexers to make parent-delete/update →
    /// children-delete → parent-upsert → children-insert atomic (spec.md
    /// §5 ordering guarantee).
    pub fn transaction<T>(
        &mut self,
        f: impl FnOnce(&rusqlite::Transaction<'_>) -> DbResult<T>,
    ) -> DbResult<T> {
        let tx = self.conn.transaction().map_err(DbError::Transaction)?;
        let result = f(&tx)?;
        tx.commit().map_err(DbError::Transaction)?;
        Ok(result)
    }

    /// Truncates all content tables, clears autoincrement counters, and
    /// reclaims space (spec.md §4.1 Reset).
    pub fn reset(&mut self) -> DbResult<()> {
        self.conn
            .execute_batch(
                r"
                DELETE FROM fragments_fts;
                DELETE FROM fragments;
                DELETE FROM files;
                DELETE FROM exchanges;
                DELETE FROM conversations;
                DELETE FROM sqlite_sequence WHERE name IN ('files', 'fragments');
                VACUUM;
                ",
            )
            .map_err(DbError::Query)?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_creates_schema() {
        let store = Store::open_in_memory().unwrap();
        let count: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn reset_clears_all_tables() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO files (path, fingerprint) VALUES (?1, ?2)",
                rusqlite::params!["a.md", "deadbeef"],
            )
            .unwrap();
        store.reset().unwrap();
        let count: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
