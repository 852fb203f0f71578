//! Durable session log backed by SQLite.
//!
//! The store is append-only and write-only from the engine's
//! perspective: one [`SessionStore::record`] call per terminated
//! session, no reads, no retries. A failed write is the engine's
//! problem to log and swallow — persistence trouble must never block
//! connection cleanup or take down the accept loop.
//!
//! # Schema
//!
//! The `sessions` table has columns: `peer_address`, `session_start`,
//! `final_directory`, `command_count`, `commands` (the ordered command
//! list as a JSON array), `logged_at`. Timestamps are RFC 3339 text.
//!
//! # Concurrency
//!
//! Sessions terminate concurrently, so the connection sits behind a
//! mutex and each record is a single INSERT — one atomic operation per
//! session, no interleaving between writers.

use std::path::Path;
use std::sync::{Arc, Mutex};

use mirage_core::session::SessionRecord;
use rusqlite::{Connection, params};
use thiserror::Error;
use tracing::debug;

/// Durable sink for terminated sessions.
///
/// Implementations must tolerate concurrent independent callers; the
/// engine holds no lock across the call.
pub trait SessionStore: Send + Sync {
    /// Append one session record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be persisted. Callers
    /// log and discard the error; the write is not retried.
    fn record(&self, record: &SessionRecord) -> Result<(), StoreError>;
}

/// Session store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Command list could not be serialized.
    #[error("failed to serialize command list: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A previous writer panicked while holding the connection.
    #[error("session store lock poisoned")]
    LockPoisoned,
}

/// SQLite-backed [`SessionStore`].
#[derive(Debug)]
pub struct SqliteSessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSessionStore {
    /// Open (or create) the database at `path` and ensure the schema
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the
    /// schema cannot be created.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory store. Each call is an independent database.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY,
                peer_address TEXT NOT NULL,
                session_start TEXT NOT NULL,
                final_directory TEXT NOT NULL,
                command_count INTEGER NOT NULL,
                commands TEXT NOT NULL,
                logged_at TEXT NOT NULL
            );",
        )
    }
}

impl SessionStore for SqliteSessionStore {
    fn record(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let commands_json = serde_json::to_string(&record.commands)?;

        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        conn.execute(
            "INSERT INTO sessions
                (peer_address, session_start, final_directory, command_count, commands, logged_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.peer_address,
                record.session_start.to_rfc3339(),
                record.final_directory,
                record.command_count as i64,
                commands_json,
                record.logged_at.to_rfc3339(),
            ],
        )?;

        debug!(
            peer = %record.peer_address,
            commands = record.command_count,
            "Session recorded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use mirage_core::session::Session;
    use tempfile::TempDir;

    use super::*;

    fn sample_record() -> SessionRecord {
        let mut session = Session::new("203.0.113.7:55555");
        session.change_directory("/home");
        session.push_history("cd /home");
        session.push_history("pwd");
        session.finalize()
    }

    #[test]
    fn test_record_inserts_one_row() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("sessions.db");

        let store = SqliteSessionStore::open(&db_path).unwrap();
        store.record(&sample_record()).unwrap();
        drop(store);

        // Inspect the file with an independent connection.
        let conn = Connection::open(&db_path).unwrap();
        let (peer, final_dir, count, commands_json): (String, String, i64, String) = conn
            .query_row(
                "SELECT peer_address, final_directory, command_count, commands FROM sessions",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .unwrap();

        assert_eq!(peer, "203.0.113.7:55555");
        assert_eq!(final_dir, "/home/");
        assert_eq!(count, 2);

        let commands: Vec<String> = serde_json::from_str(&commands_json).unwrap();
        assert_eq!(commands, ["cd /home", "pwd"]);
    }

    #[test]
    fn test_record_with_empty_history() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let record = Session::new("peer").finalize();
        store.record(&record).unwrap();
    }

    #[test]
    fn test_concurrent_writers_each_land_one_row() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("sessions.db");
        let store = Arc::new(SqliteSessionStore::open(&db_path).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let mut session = Session::new(format!("198.51.100.{i}:4000"));
                    session.push_history("pwd");
                    store.record(&session.finalize()).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        drop(store);

        let conn = Connection::open(&db_path).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 8);
    }

    #[test]
    fn test_timestamps_are_rfc3339() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let record = sample_record();
        store.record(&record).unwrap();

        let conn = store.conn.lock().unwrap();
        let logged_at: String = conn
            .query_row("SELECT logged_at FROM sessions", [], |row| row.get(0))
            .unwrap();
        let parsed = chrono::DateTime::parse_from_rfc3339(&logged_at).unwrap();
        assert!(parsed.with_timezone(&Utc) <= Utc::now());
    }
}
