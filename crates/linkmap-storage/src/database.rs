// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use linkmap_core::LinkmapError;
use tokio_rusqlite::Connection;

/// Handle to the SQLite database, shared by all query modules.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply pragmas, and run all
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, LinkmapError> {
        let conn = Connection::open(path).await.map_err(map_tr_err)?;
        Self::initialize(conn).await
    }

    /// Open an in-memory database with the full schema, for tests.
    pub async fn open_in_memory() -> Result<Self, LinkmapError> {
        let conn = Connection::open_in_memory().await.map_err(map_tr_err)?;
        Self::initialize(conn).await
    }

    async fn initialize(conn: Connection) -> Result<Self, LinkmapError> {
        conn.call(|conn| {
            // pragma_update handles the pragmas that echo their new value.
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            crate::migrations::run_migrations(conn)
                .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        Ok(Self { conn })
    }

    /// The underlying serialized connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoint the WAL. Called on graceful shutdown.
    pub async fn close(&self) -> Result<(), LinkmapError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

/// Current UTC time in the same ISO-8601 format SQLite's
/// `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')` produces, so string comparison
/// of timestamps stays correct.
pub fn now_iso() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Convert tokio-rusqlite errors into `LinkmapError`.
///
/// Unique and foreign-key violations surface as `Constraint` (fatal for the
/// step that caused them); everything else is retryable `Storage`.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> LinkmapError {
    if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(ref code, ref msg)) = e {
        if code.code == rusqlite::ErrorCode::ConstraintViolation {
            return LinkmapError::Constraint(
                msg.clone().unwrap_or_else(|| "constraint violation".to_string()),
            );
        }
    }
    LinkmapError::Storage { source: Box::new(e) }
}
