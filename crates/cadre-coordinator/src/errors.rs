//! Coordinator error types.
//!
//! Contention outcomes (losing a claim race, completing someone else's task)
//! are `Ok(false)`, not errors.

use cadre_store::StoreError;
use thiserror::Error;

/// Errors surfaced by coordinator operations.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The request was rejected before touching state.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The durable write for this operation failed; nothing was applied.
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl CoordinatorError {
    /// Build a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Result type for coordinator operations.
pub type Result<T> = std::result::Result<T, CoordinatorError>;
