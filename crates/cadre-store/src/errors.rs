//! Error types for the durable key-value layer.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Filesystem error in the JSON-file backend.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// The backend refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
