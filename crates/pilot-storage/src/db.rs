//! Database connection management.
//!
//! A `Database` is a handle to a SQLite file, not a live connection. Every
//! logical operation opens its own connection, acts, commits, and closes, so
//! any number of tasks (or processes) can share one file and rely on SQLite's
//! own locking for consistency.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use tracing::info;

use pilot_core::error::{PilotError, Result};

use crate::migrations;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the on-disk SQLite store.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Database {
    /// Open (or create) a database at the given path and initialize its schema.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Like [`Database::open`], with an explicit lock wait for each connection.
    pub fn open_with_busy_timeout(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Self {
            path: path.to_path_buf(),
            busy_timeout,
        };

        db.with_conn(|conn| {
            // journal_mode is persistent, so setting it once per open is enough.
            conn.execute_batch("PRAGMA journal_mode = WAL;")
                .map_err(|e| PilotError::Storage(format!("Failed to set pragmas: {}", e)))?;
            Ok(())
        })?;

        db.initialize_schema()?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// Create missing tables and repair legacy layouts. Safe to call repeatedly.
    pub fn initialize_schema(&self) -> Result<()> {
        self.with_conn(migrations::initialize_schema)
    }

    /// Path of the underlying database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Execute a closure against a fresh connection.
    ///
    /// The connection is dropped (and thereby closed) when the closure returns.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = Connection::open(&self.path)
            .map_err(|e| PilotError::Storage(format!("Failed to open database: {}", e)))?;
        conn.busy_timeout(self.busy_timeout)
            .map_err(|e| PilotError::Storage(format!("Failed to set busy timeout: {}", e)))?;
        f(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");
        let db = Database::open(&path).unwrap();

        db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM leads", [], |row| row.get(0))
                .map_err(|e| PilotError::Storage(e.to_string()))?;
            assert_eq!(count, 0);
            Ok(())
        })
        .unwrap();

        assert!(path.exists());
        assert_eq!(db.path(), path.as_path());
    }

    #[test]
    fn test_wal_mode_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("wal.db")).unwrap();
        db.with_conn(|conn| {
            let mode: String = conn
                .query_row("PRAGMA journal_mode", [], |row| row.get(0))
                .map_err(|e| PilotError::Storage(e.to_string()))?;
            assert_eq!(mode, "wal");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_connections_see_each_others_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");
        let writer = Database::open(&path).unwrap();
        let reader = Database::open(&path).unwrap();

        writer
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO agent_memory (tenant_id, key, value) VALUES (1, 'k', 'v')",
                    [],
                )
                .map_err(|e| PilotError::Storage(e.to_string()))?;
                Ok(())
            })
            .unwrap();

        let value: String = reader
            .with_conn(|conn| {
                conn.query_row("SELECT value FROM agent_memory WHERE key = 'k'", [], |row| {
                    row.get(0)
                })
                .map_err(|e| PilotError::Storage(e.to_string()))
            })
            .unwrap();
        assert_eq!(value, "v");
    }
}
