//! Unified error types for urlmeta.
//!
//! Fetch failures are not errors; they are recorded as data (see [`crate::fetch::FetchFailure`]).
//! Everything here is a store or input problem that must reach the caller.

use tokio_rusqlite::rusqlite;

/// Unified error type for store and lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., a malformed table name).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Database operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// The store could not be reached after every connection attempt.
    #[error("STORE_UNAVAILABLE: gave up after {attempts} attempts: {reason}")]
    ConnectFailed { attempts: u32, reason: String },

    /// A stored row does not decode into a consistent record.
    #[error("CORRUPT_RECORD: {0}")]
    CorruptRecord(String),
}

impl Error {
    /// Short snake_case code for API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::Database(_) | Error::MigrationFailed(_) => "store_error",
            Error::ConnectFailed { .. } => "store_unavailable",
            Error::CorruptRecord(_) => "corrupt_record",
        }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::CorruptRecord(format!("invalid JSON column: {err}"))
    }
}
