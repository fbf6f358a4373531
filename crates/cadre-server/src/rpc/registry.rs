//! Method registry and async dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde_json::Value;
use tracing::{error, warn};

use crate::metrics::{RPC_ERRORS_TOTAL, RPC_REQUEST_DURATION_SECONDS, RPC_REQUESTS_TOTAL};
use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::types::{RpcRequest, RpcResponse};

/// Implemented by every method handler.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Execute the handler with the given params and context.
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError>;
}

/// Maps method names to handlers. Both the WebSocket channel and the HTTP
/// routes dispatch through it.
pub struct MethodRegistry {
    handlers: HashMap<String, Arc<dyn MethodHandler>>,
}

impl MethodRegistry {
    /// Maximum time a single handler may run.
    const HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a method name.
    pub fn register(&mut self, method: &str, handler: impl MethodHandler + 'static) {
        let _ = self.handlers.insert(method.to_owned(), Arc::new(handler));
    }

    /// Invoke `method`, recording request metrics.
    pub async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        counter!(RPC_REQUESTS_TOTAL, "method" => method.to_owned()).increment(1);

        let Some(handler) = self.handlers.get(method) else {
            counter!(RPC_ERRORS_TOTAL, "method" => method.to_owned(), "error_type" => "method_not_found")
                .increment(1);
            return Err(RpcError::MethodNotFound {
                method: method.to_owned(),
            });
        };

        let start = Instant::now();
        let result = match tokio::time::timeout(Self::HANDLER_TIMEOUT, handler.handle(params, ctx)).await {
            Ok(result) => result,
            Err(_elapsed) => {
                error!(method, "handler timed out after {:?}", Self::HANDLER_TIMEOUT);
                Err(RpcError::Internal {
                    message: format!("handler for '{method}' timed out"),
                })
            }
        };

        let duration = start.elapsed();
        histogram!(RPC_REQUEST_DURATION_SECONDS, "method" => method.to_owned())
            .record(duration.as_secs_f64());
        if duration.as_secs() >= 2 {
            warn!(method, duration_secs = duration.as_secs_f64(), "slow request");
        }

        if let Err(err) = &result {
            counter!(RPC_ERRORS_TOTAL, "method" => method.to_owned(), "error_type" => err.code())
                .increment(1);
            if matches!(err, RpcError::Storage { .. } | RpcError::Internal { .. }) {
                error!(method, error = %err, "request failed");
            }
        }
        result
    }

    /// Dispatch a WebSocket request and wrap the outcome.
    pub async fn dispatch(&self, request: RpcRequest, ctx: &RpcContext) -> RpcResponse {
        match self.call(&request.method, request.params, ctx).await {
            Ok(result) => RpcResponse::success(request.id, result),
            Err(err) => RpcResponse {
                id: request.id,
                success: false,
                result: None,
                error: Some(err.to_error_body()),
            },
        }
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether a method is registered.
    pub fn has_method(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}
