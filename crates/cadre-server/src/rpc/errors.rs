//! RPC error codes and error type.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cadre_coordinator::CoordinatorError;

use crate::rpc::types::RpcErrorBody;

/// Invalid or missing parameters, or a rejected request.
pub const INVALID_PARAMS: &str = "INVALID_PARAMS";
/// Method not found in the registry.
pub const METHOD_NOT_FOUND: &str = "METHOD_NOT_FOUND";
/// Durable storage rejected the write.
pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
/// Requested record does not exist.
pub const NOT_FOUND: &str = "NOT_FOUND";
/// Unexpected internal error.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// Error returned by method handlers.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Malformed params or a validation failure.
    #[error("{message}")]
    InvalidParams {
        /// Description of what is wrong.
        message: String,
    },

    /// No handler for the method.
    #[error("method '{method}' not found")]
    MethodNotFound {
        /// Requested method name.
        method: String,
    },

    /// Requested record not found.
    #[error("{message}")]
    NotFound {
        /// Human-readable message.
        message: String,
    },

    /// Persistence failed; nothing was applied.
    #[error("{message}")]
    Storage {
        /// Description.
        message: String,
    },

    /// Internal server error.
    #[error("{message}")]
    Internal {
        /// Description.
        message: String,
    },
}

impl RpcError {
    /// Build an `InvalidParams` error.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
        }
    }

    /// Build a `NotFound` error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParams { .. } => INVALID_PARAMS,
            Self::MethodNotFound { .. } => METHOD_NOT_FOUND,
            Self::NotFound { .. } => NOT_FOUND,
            Self::Storage { .. } => STORAGE_ERROR,
            Self::Internal { .. } => INTERNAL_ERROR,
        }
    }

    /// HTTP status for the REST surface.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidParams { .. } => StatusCode::BAD_REQUEST,
            Self::MethodNotFound { .. } | Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Storage { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Wire-format error body. Internal details are not exposed.
    pub fn to_error_body(&self) -> RpcErrorBody {
        let message = match self {
            Self::Storage { .. } => "storage unavailable; the operation was not applied".to_owned(),
            Self::Internal { .. } => "internal error".to_owned(),
            _ => self.to_string(),
        };
        RpcErrorBody {
            code: self.code().to_owned(),
            message,
        }
    }
}

impl From<CoordinatorError> for RpcError {
    fn from(err: CoordinatorError) -> Self {
        match err {
            CoordinatorError::Validation(message) => Self::InvalidParams { message },
            CoordinatorError::Storage(source) => Self::Storage {
                message: source.to_string(),
            },
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_error_body() });
        (self.status(), Json(body)).into_response()
    }
}
