// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All statements are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use parley_core::ParleyError;
use tracing::debug;

use crate::migrations;

/// Handle to the SQLite database: one background connection thread.
#[derive(Debug)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
    path: String,
}

impl Database {
    /// Open (creating if needed) the database at `path` in WAL mode and
    /// apply pending migrations.
    pub async fn open(path: &str) -> Result<Self, ParleyError> {
        Self::open_with_options(path, true).await
    }

    /// Like [`open`](Database::open) with explicit journal mode selection.
    pub async fn open_with_options(path: &str, wal_mode: bool) -> Result<Self, ParleyError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(ParleyError::storage)?;
        Self::prepare(&conn, wal_mode).await?;
        debug!(path, wal_mode, "database opened");
        Ok(Self {
            conn,
            path: path.to_string(),
        })
    }

    /// A private in-memory database with the schema applied.
    pub async fn open_in_memory() -> Result<Self, ParleyError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(ParleyError::storage)?;
        Self::prepare(&conn, false).await?;
        Ok(Self {
            conn,
            path: ":memory:".to_string(),
        })
    }

    async fn prepare(conn: &tokio_rusqlite::Connection, wal_mode: bool) -> Result<(), ParleyError> {
        conn.call(move |conn| -> Result<(), ParleyError> {
            let pragmas = if wal_mode {
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;"
            } else {
                "PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;"
            };
            conn.execute_batch(pragmas).map_err(ParleyError::storage)?;
            migrations::run_migrations(conn)
        })
        .await
        .map_err(map_call_err)
    }

    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Checkpoint the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), ParleyError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Stop the background thread. Every clone of the connection is closed,
    /// and later calls fail with a `Storage` error.
    pub async fn close(&self) -> Result<(), ParleyError> {
        self.conn.clone().close().await.map_err(map_tr_err)?;
        debug!(path = %self.path, "database closed");
        Ok(())
    }
}

/// Map a tokio-rusqlite error carrying a plain rusqlite error.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> ParleyError {
    ParleyError::Storage {
        source: Box::new(e),
    }
}

/// Map a tokio-rusqlite error whose closure already produced a `ParleyError`.
pub fn map_call_err(e: tokio_rusqlite::Error<ParleyError>) -> ParleyError {
    match e {
        tokio_rusqlite::Error::Error(inner) => inner,
        tokio_rusqlite::Error::ConnectionClosed => ParleyError::storage("database connection closed"),
        other => ParleyError::storage(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_schema() {
        let db = Database::open_in_memory().await.unwrap();
        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table'
                     AND name IN ('user', 'dialog') ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .unwrap();
        assert_eq!(tables, vec!["dialog", "user"]);
    }

    #[tokio::test]
    async fn open_enables_wal_and_foreign_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pragmas.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();

        let (mode, fk): (String, i64) = db
            .connection()
            .call(|conn| -> Result<(String, i64), rusqlite::Error> {
                let mode = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
                let fk = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
                Ok((mode, fk))
            })
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        assert_eq!(fk, 1);
    }

    #[tokio::test]
    async fn reopening_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reopen.db");
        let path = path.to_str().unwrap();

        let db = Database::open(path).await.unwrap();
        db.close().await.unwrap();
        let db = Database::open(path).await.unwrap();
        assert_eq!(db.path(), path);
    }

    #[tokio::test]
    async fn calls_after_close_fail() {
        let db = Database::open_in_memory().await.unwrap();
        db.close().await.unwrap();
        assert!(db.checkpoint().await.is_err());
    }
}
