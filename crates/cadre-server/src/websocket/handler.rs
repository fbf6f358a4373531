//! Inbound WebSocket message dispatch. Text frames are parsed as
//! [`RpcRequest`]s and routed through the [`MethodRegistry`].

use std::sync::Arc;

use tracing::{debug, error, instrument, warn};

use crate::rpc::context::RpcContext;
use crate::rpc::errors::INVALID_PARAMS;
use crate::rpc::registry::MethodRegistry;
use crate::rpc::types::{RpcRequest, RpcResponse};

/// Result of handling one inbound message.
#[derive(Debug)]
pub struct HandleResult {
    /// Serialized response to send back.
    pub response_json: Arc<String>,
    /// Method that was called (empty if parsing failed).
    pub method: String,
    /// Typed response.
    pub response: RpcResponse,
}

/// Parse and dispatch one inbound text message.
#[instrument(skip_all, fields(method))]
pub async fn handle_message(message: &str, registry: &MethodRegistry, ctx: &RpcContext) -> HandleResult {
    let request: RpcRequest = match serde_json::from_str(message) {
        Ok(request) => request,
        Err(err) => {
            warn!("invalid JSON received");
            let response = RpcResponse::error("unknown", INVALID_PARAMS, format!("invalid JSON: {err}"));
            return HandleResult {
                response_json: serialize(&response),
                method: String::new(),
                response,
            };
        }
    };

    let method = request.method.clone();
    let _ = tracing::Span::current().record("method", method.as_str());
    debug!(method, id = %request.id, "dispatching request");

    let response = registry.dispatch(request, ctx).await;
    HandleResult {
        response_json: serialize(&response),
        method,
        response,
    }
}

fn serialize(response: &RpcResponse) -> Arc<String> {
    Arc::new(serde_json::to_string(response).unwrap_or_else(|err| {
        error!(error = %err, "failed to serialize response");
        String::new()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::handlers::register_all;
    use crate::rpc::handlers::test_helpers::make_test_context;

    fn registry() -> MethodRegistry {
        let mut reg = MethodRegistry::new();
        register_all(&mut reg);
        reg
    }

    #[tokio::test]
    async fn valid_request_dispatches() {
        let ctx = make_test_context();
        let msg = r#"{"id":"r1","method":"status.get"}"#;
        let result = handle_message(msg, &registry(), &ctx).await;
        assert_eq!(result.method, "status.get");
        assert!(result.response.success);
        assert_eq!(result.response.id, "r1");
        let parsed: serde_json::Value = serde_json::from_str(&result.response_json).unwrap();
        assert_eq!(parsed["result"]["activeSessions"], 0);
    }

    #[tokio::test]
    async fn invalid_json_is_rejected() {
        let ctx = make_test_context();
        let result = handle_message("not json", &registry(), &ctx).await;
        assert!(result.method.is_empty());
        assert!(!result.response.success);
        assert_eq!(result.response.id, "unknown");
        assert_eq!(result.response.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn unknown_method() {
        let ctx = make_test_context();
        let msg = r#"{"id":"r2","method":"task.nope"}"#;
        let result = handle_message(msg, &registry(), &ctx).await;
        assert_eq!(result.response.error.unwrap().code, "METHOD_NOT_FOUND");
    }

    #[tokio::test]
    async fn claim_over_websocket() {
        let ctx = make_test_context();
        let reg = registry();
        let register = r#"{"id":"1","method":"session.register","params":{"sessionId":"a","capabilities":{"maxConcurrentTasks":1}}}"#;
        let sync = r#"{"id":"2","method":"state.sync","params":{"tasks":[{"id":"t1"}]}}"#;
        let claim = r#"{"id":"3","method":"task.claim","params":{"sessionId":"a","taskId":"t1"}}"#;
        assert!(handle_message(register, &reg, &ctx).await.response.success);
        assert!(handle_message(sync, &reg, &ctx).await.response.success);
        let result = handle_message(claim, &reg, &ctx).await;
        assert_eq!(result.response.result.unwrap()["success"], true);
    }
}
