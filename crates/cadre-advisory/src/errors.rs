//! Advisory failures. None of these ever reach a coordinator caller.

use thiserror::Error;

/// Why an advisory call produced no usable answer.
#[derive(Debug, Error)]
pub enum AdvisoryError {
    /// No advisory service is configured.
    #[error("advisory service disabled")]
    Disabled,

    /// The request could not be sent or the connection failed.
    #[error("advisory transport error: {0}")]
    Transport(String),

    /// The call did not finish within the configured timeout.
    #[error("advisory call timed out after {after_ms}ms")]
    Timeout {
        /// The timeout that elapsed.
        after_ms: u64,
    },

    /// The service returned a non-success status.
    #[error("advisory service returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The response body did not match the contract.
    #[error("malformed advisory response: {0}")]
    Malformed(String),
}

impl AdvisoryError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Transport(_) => "transport",
            Self::Timeout { .. } => "timeout",
            Self::Status { .. } => "status",
            Self::Malformed(_) => "malformed",
        }
    }
}

impl From<reqwest::Error> for AdvisoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Result type for advisory calls.
pub type Result<T> = std::result::Result<T, AdvisoryError>;
