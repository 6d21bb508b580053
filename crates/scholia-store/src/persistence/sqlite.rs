//! SQLite key-value table

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use super::storage::{check_key, KeyValueStorage};
use crate::error::PersistenceError;

/// SQLite-backed storage. Every key is a row of the `kv` table.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) a database at the given path.
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)
            .map_err(|e| PersistenceError::Database(format!("open: {}", e)))?;
        Self::init_with_connection(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| PersistenceError::Database(format!("open_in_memory: {}", e)))?;
        Self::init_with_connection(conn)
    }

    fn init_with_connection(conn: Connection) -> Result<Self, PersistenceError> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, PersistenceError> {
        self.conn
            .lock()
            .map_err(|e| PersistenceError::Database(format!("lock: {}", e)))
    }
}

impl KeyValueStorage for SqliteStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), PersistenceError> {
        check_key(key)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, datetime('now'))",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), PersistenceError> {
        check_key(to)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let moved = tx.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at)
             SELECT ?2, value, datetime('now') FROM kv WHERE key = ?1",
            params![from, to],
        )?;
        if moved == 0 {
            return Err(PersistenceError::Storage(format!("no value under '{}'", from)));
        }
        tx.execute("DELETE FROM kv WHERE key = ?1", params![from])?;
        tx.commit()?;
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT key FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )?;
        let keys = stmt
            .query_map(params![prefix], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}
