//! Database connection management with pragma configuration.
//!
//! This module handles opening the SQLite database, applying required pragmas
//! for performance and concurrency (WAL mode), probing liveness, and running
//! migrations. Startup connects with a bounded retry schedule.

use super::migrations;
use crate::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_rusqlite::Connection;

/// Where the metadata store lives, parsed from a connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    /// `sqlite://<path>`
    File(PathBuf),
    /// `sqlite::memory:`
    Memory,
}

impl StoreTarget {
    /// Parse a `sqlite://<path>` or `sqlite::memory:` connection string.
    pub fn parse(database_url: &str) -> Result<Self, Error> {
        let trimmed = database_url.trim();
        if trimmed == "sqlite::memory:" || trimmed == "sqlite://:memory:" {
            return Ok(StoreTarget::Memory);
        }

        match trimmed.strip_prefix("sqlite://") {
            Some(path) if !path.is_empty() => Ok(StoreTarget::File(PathBuf::from(path))),
            Some(_) => Err(Error::InvalidInput("connection string has an empty database path".into())),
            None => Err(Error::InvalidInput("connection string must start with sqlite://".into())),
        }
    }
}

/// Startup connection retry schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, delay: Duration::from_secs(2) }
    }
}

/// Whether `name` can be interpolated into SQL as a table name.
pub fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 64 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Metadata store handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread. Clones share the same connection, so every
/// write is serialized.
#[derive(Clone, Debug)]
pub struct MetadataDb {
    pub(crate) conn: Connection,
    pub(crate) table: Arc<str>,
}

impl MetadataDb {
    /// Connect to `target`, retrying according to `policy`.
    ///
    /// Each attempt opens the database, probes it with a round trip, and
    /// ensures the schema and unique URL index exist.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for an unusable table name and
    /// `Error::ConnectFailed` once every attempt has failed.
    pub async fn connect(target: &StoreTarget, table: &str, policy: RetryPolicy) -> Result<Self, Error> {
        ensure_table_name(table)?;
        let attempts = policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let result = match target {
                StoreTarget::File(path) => Self::open(path, table).await,
                StoreTarget::Memory => Self::open_in_memory(table).await,
            };

            match result {
                Ok(db) => {
                    tracing::info!(attempt, table, "connected to metadata store");
                    return Ok(db);
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "metadata store connection attempt failed"
                    );
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(policy.delay).await;
                    }
                }
            }
        }

        tracing::error!(attempts, "failed to connect to metadata store after all retries");
        Err(Error::ConnectFailed {
            attempts,
            reason: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and runs any pending migrations.
    pub async fn open(path: impl AsRef<Path>, table: &str) -> Result<Self, Error> {
        ensure_table_name(table)?;
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn, table).await
    }

    /// Open an in-memory database for testing.
    ///
    /// Creates a temporary in-memory SQLite database with the same
    /// pragma configuration as file-based databases.
    pub async fn open_in_memory(table: &str) -> Result<Self, Error> {
        ensure_table_name(table)?;
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::init(conn, table).await
    }

    async fn init(conn: Connection, table: &str) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA synchronous=NORMAL;
                 PRAGMA temp_store=MEMORY;
                 PRAGMA busy_timeout=5000;",
            )?;
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn, table).await?;

        Ok(Self { conn, table: Arc::from(table) })
    }

    /// Liveness probe.
    ///
    /// Never errors; a failed round trip is logged and reported as `false`.
    pub async fn ping(&self) -> bool {
        match self
            .conn
            .call(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(error = %e, "metadata store health check failed");
                false
            }
        }
    }

    /// Name of the records table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Close the underlying connection.
    ///
    /// Other clones of this handle fail with a closed-connection error afterwards.
    pub async fn close(self) -> Result<(), Error> {
        self.conn.close().await.map_err(|e| Error::Database(e.into()))?;
        tracing::info!("disconnected from metadata store");
        Ok(())
    }
}

fn ensure_table_name(table: &str) -> Result<(), Error> {
    if is_valid_table_name(table) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("invalid table name: {table:?}")))
    }
}
