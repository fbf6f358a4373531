//! Method handlers, one module per domain.

pub mod session;
pub mod system;
pub mod task;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::rpc::errors::RpcError;
use crate::rpc::registry::MethodRegistry;

/// Register every coordinator method.
pub fn register_all(registry: &mut MethodRegistry) {
    // Session
    registry.register("session.register", session::RegisterHandler);
    registry.register("session.heartbeat", session::HeartbeatHandler);
    registry.register("session.deregister", session::DeregisterHandler);

    // Task
    registry.register("task.claim", task::ClaimHandler);
    registry.register("task.complete", task::CompleteHandler);
    registry.register("task.assign", task::AssignHandler);
    registry.register("task.get", task::GetTaskHandler);

    // System
    registry.register("status.get", system::StatusHandler);
    registry.register("state.sync", system::SyncHandler);
}

/// Deserialize the params object into a typed request.
pub(crate) fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, RpcError> {
    let params = params.ok_or_else(|| RpcError::invalid_params("missing params"))?;
    serde_json::from_value(params)
        .map_err(|err| RpcError::invalid_params(format!("invalid params: {err}")))
}

/// Serialize a handler result.
pub(crate) fn to_result<T: serde::Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|err| RpcError::Internal {
        message: format!("failed to serialize result: {err}"),
    })
}
