//! RPC wire-format types for the WebSocket channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Incoming request from an observer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Request identifier, echoed in the response.
    pub id: String,
    /// Method name (e.g. `task.claim`).
    pub method: String,
    /// Optional parameters object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Outgoing response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Echoed request identifier.
    pub id: String,
    /// Whether the call succeeded.
    pub success: bool,
    /// Result payload (present when `success == true`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload (present when `success == false`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorBody>,
}

/// Structured error body, shared by RPC responses and HTTP error bodies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcErrorBody {
    /// Machine-readable error code (e.g. `INVALID_PARAMS`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl RpcResponse {
    /// Build a success response.
    pub fn success(id: impl Into<String>, result: Value) -> Self {
        Self {
            id: id.into(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response.
    pub fn error(id: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: false,
            result: None,
            error: Some(RpcErrorBody {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}
