//! Settings error types.

use thiserror::Error;

/// Failure to produce a usable [`crate::CadreSettings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read settings file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not JSON, or does not fit the settings schema.
    #[error("malformed settings: {0}")]
    Json(#[from] serde_json::Error),

    /// A value failed validation after merging.
    #[error("invalid setting `{field}`: {reason}")]
    Invalid {
        /// camelCase path of the offending field.
        field: &'static str,
        /// Constraint that was violated.
        reason: String,
    },
}

impl SettingsError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
