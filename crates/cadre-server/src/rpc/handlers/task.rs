//! Task handlers: claim, complete, assign, get.
//!
//! Claim and complete answer `{success: false}` when the caller loses a race
//! or a precondition does not hold. That is an outcome, not an error.

use async_trait::async_trait;
use cadre_core::types::{ClaimRequest, CompleteRequest, SuccessResponse, TaskRequest};
use serde_json::Value;
use tracing::instrument;

use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::handlers::{parse_params, to_result};
use crate::rpc::registry::MethodHandler;

/// Claim a pending task for a session.
pub struct ClaimHandler;

#[async_trait]
impl MethodHandler for ClaimHandler {
    #[instrument(skip(self, ctx), fields(method = "task.claim"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let req: ClaimRequest = parse_params(params)?;
        let claimed = ctx
            .coordinator
            .claim_task(&req.session_id, &req.task_id)
            .await?;
        to_result(&SuccessResponse::from(claimed))
    }
}

/// Complete a task owned by the calling session.
pub struct CompleteHandler;

#[async_trait]
impl MethodHandler for CompleteHandler {
    #[instrument(skip(self, ctx), fields(method = "task.complete"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let req: CompleteRequest = parse_params(params)?;
        let completed = ctx
            .coordinator
            .complete_task(&req.session_id, &req.task_id, req.result)
            .await?;
        to_result(&SuccessResponse::from(completed))
    }
}

/// Let the coordinator pick a session for a pending task.
pub struct AssignHandler;

#[async_trait]
impl MethodHandler for AssignHandler {
    #[instrument(skip(self, ctx), fields(method = "task.assign"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let req: TaskRequest = parse_params(params)?;
        let resp = ctx.coordinator.assign_task(&req.task_id).await?;
        to_result(&resp)
    }
}

/// Fetch a single task.
pub struct GetTaskHandler;

#[async_trait]
impl MethodHandler for GetTaskHandler {
    #[instrument(skip(self, ctx), fields(method = "task.get"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let req: TaskRequest = parse_params(params)?;
        let task = ctx
            .coordinator
            .get_task(&req.task_id)
            .await
            .ok_or_else(|| RpcError::not_found(format!("task '{}' not found", req.task_id.as_str())))?;
        to_result(&task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::handlers::test_helpers::make_test_context;
    use cadre_core::types::{Capabilities, RegisterRequest, SyncRequest, TaskPriority, TaskSpec};
    use serde_json::json;

    async fn seeded() -> RpcContext {
        let ctx = make_test_context();
        for (id, capacity) in [("a", 2), ("b", 1)] {
            let _ = ctx
                .coordinator
                .register_session(RegisterRequest {
                    session_id: id.into(),
                    kind: "claude".into(),
                    capabilities: Capabilities::with_capacity(capacity),
                })
                .await
                .unwrap();
        }
        let _ = ctx
            .coordinator
            .sync_state(SyncRequest {
                sessions: vec![],
                tasks: vec![
                    TaskSpec::new("t1", "first", TaskPriority::High, []),
                    TaskSpec::new("t2", "second", TaskPriority::Medium, ["t1".into()]),
                ],
            })
            .await
            .unwrap();
        ctx
    }

    fn claim(session: &str, task: &str) -> Option<Value> {
        Some(json!({"sessionId": session, "taskId": task}))
    }

    #[tokio::test]
    async fn claim_then_lose_race() {
        let ctx = seeded().await;
        let first = ClaimHandler.handle(claim("a", "t1"), &ctx).await.unwrap();
        assert_eq!(first["success"], true);
        let second = ClaimHandler.handle(claim("b", "t1"), &ctx).await.unwrap();
        assert_eq!(second["success"], false);
    }

    #[tokio::test]
    async fn claim_blocked_task_fails() {
        let ctx = seeded().await;
        let result = ClaimHandler.handle(claim("a", "t2"), &ctx).await.unwrap();
        assert_eq!(result["success"], false);
    }

    #[tokio::test]
    async fn claim_missing_task_id_is_invalid() {
        let ctx = seeded().await;
        let err = ClaimHandler
            .handle(Some(json!({"sessionId": "a"})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn complete_unblocks_dependent() {
        let ctx = seeded().await;
        let _ = ClaimHandler.handle(claim("a", "t1"), &ctx).await.unwrap();
        let result = CompleteHandler
            .handle(
                Some(json!({"sessionId": "a", "taskId": "t1", "result": {"ok": true}})),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(result["success"], true);

        let t2 = GetTaskHandler
            .handle(Some(json!({"taskId": "t2"})), &ctx)
            .await
            .unwrap();
        assert_eq!(t2["status"], "pending");
    }

    #[tokio::test]
    async fn complete_by_non_owner_fails() {
        let ctx = seeded().await;
        let _ = ClaimHandler.handle(claim("a", "t1"), &ctx).await.unwrap();
        let result = CompleteHandler
            .handle(Some(json!({"sessionId": "b", "taskId": "t1"})), &ctx)
            .await
            .unwrap();
        assert_eq!(result["success"], false);

        let t1 = ctx.coordinator.get_task("t1").await.unwrap();
        assert_eq!(t1.owner.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn assign_picks_least_loaded() {
        let ctx = seeded().await;
        let result = AssignHandler
            .handle(Some(json!({"taskId": "t1"})), &ctx)
            .await
            .unwrap();
        assert_eq!(result, json!({"success": true, "sessionId": "a"}));
    }

    #[tokio::test]
    async fn assign_blocked_task_is_unassigned() {
        let ctx = seeded().await;
        let result = AssignHandler
            .handle(Some(json!({"taskId": "t2"})), &ctx)
            .await
            .unwrap();
        assert_eq!(result, json!({"success": false}));
    }

    #[tokio::test]
    async fn get_unknown_task_is_not_found() {
        let ctx = seeded().await;
        let err = GetTaskHandler
            .handle(Some(json!({"taskId": "nope"})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
