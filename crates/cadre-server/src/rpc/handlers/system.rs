//! System handlers: status snapshot and bulk sync.

use async_trait::async_trait;
use cadre_core::types::{SuccessResponse, SyncRequest};
use serde_json::Value;
use tracing::instrument;

use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::handlers::{parse_params, to_result};
use crate::rpc::registry::MethodHandler;

/// Current sessions, task counts and last sync time.
pub struct StatusHandler;

#[async_trait]
impl MethodHandler for StatusHandler {
    #[instrument(skip(self, ctx), fields(method = "status.get"))]
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let snapshot = ctx.coordinator.status().await;
        to_result(&snapshot)
    }
}

/// Upsert sessions and tasks in one commit.
pub struct SyncHandler;

#[async_trait]
impl MethodHandler for SyncHandler {
    #[instrument(skip(self, ctx, params), fields(method = "state.sync"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let req: SyncRequest = parse_params(params)?;
        let _ = ctx.coordinator.sync_state(req).await?;
        to_result(&SuccessResponse::from(true))
    }
}
