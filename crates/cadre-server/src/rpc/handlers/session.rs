//! Session handlers: register, heartbeat, deregister.

use async_trait::async_trait;
use cadre_core::types::{RegisterRequest, SessionRequest, SuccessResponse};
use serde_json::Value;
use tracing::instrument;

use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::handlers::{parse_params, to_result};
use crate::rpc::registry::MethodHandler;

/// Register or re-register a session.
pub struct RegisterHandler;

#[async_trait]
impl MethodHandler for RegisterHandler {
    #[instrument(skip(self, ctx), fields(method = "session.register"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let req: RegisterRequest = parse_params(params)?;
        let resp = ctx.coordinator.register_session(req).await?;
        to_result(&resp)
    }
}

/// Refresh a session's heartbeat. Unknown sessions answer `success: false`.
pub struct HeartbeatHandler;

#[async_trait]
impl MethodHandler for HeartbeatHandler {
    #[instrument(skip(self, ctx), fields(method = "session.heartbeat"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let req: SessionRequest = parse_params(params)?;
        let alive = ctx.coordinator.heartbeat(&req.session_id).await?;
        to_result(&SuccessResponse::from(alive))
    }
}

/// Terminate a session and release its tasks.
pub struct DeregisterHandler;

#[async_trait]
impl MethodHandler for DeregisterHandler {
    #[instrument(skip(self, ctx), fields(method = "session.deregister"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let req: SessionRequest = parse_params(params)?;
        let existed = ctx.coordinator.deregister_session(&req.session_id).await?;
        to_result(&SuccessResponse::from(existed))
    }
}
