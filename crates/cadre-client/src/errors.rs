//! Client error types.

use std::path::PathBuf;

use cadre_coordinator::CoordinatorError;
use cadre_store::StoreError;
use thiserror::Error;

/// Errors surfaced by either client mode.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not reach the server.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with an error body.
    #[error("server error {status} ({code}): {message}")]
    Server {
        /// HTTP status.
        status: u16,
        /// Machine-readable error code from the body.
        code: String,
        /// Message from the body.
        message: String,
    },

    /// The response did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The embedded coordinator rejected the operation.
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    /// The local state file could not be opened.
    #[error("local state: {0}")]
    Store(#[from] StoreError),

    /// Another process held the local state lock past the wait limit.
    #[error("timed out waiting for state lock {}", .path.display())]
    LockTimeout {
        /// Lock file path.
        path: PathBuf,
    },

    /// The lock file could not be created or inspected.
    #[error("state lock {}: {source}", .path.display())]
    Lock {
        /// Lock file path.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    /// Whether the request was rejected as invalid, in either mode.
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Server { code, .. } => code == "INVALID_PARAMS",
            Self::Coordinator(CoordinatorError::Validation(_)) => true,
            _ => false,
        }
    }
}

/// Convenience type alias for client results.
pub type Result<T> = std::result::Result<T, ClientError>;
