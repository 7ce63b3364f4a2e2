//! Core error types.

use thiserror::Error;

/// Storage-level errors shared by the settings stores and the database handle.
#[derive(Debug, Error)]
pub enum Error {
    /// Settings store error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// SQLite error.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem error, e.g. creating the database directory.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}
