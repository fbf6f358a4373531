//! Boundary request and response payloads.
//!
//! Shared by the server, the remote client and the embedded local client so
//! every transport speaks the same JSON.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::session::{Capabilities, Session};
use super::task::{Task, TaskPriority, TaskStatus};
use crate::ids::{SessionId, TaskId};

/// `session/register` request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Session identity.
    pub session_id: SessionId,
    /// Declared kind or model tag.
    #[serde(default)]
    pub kind: String,
    /// Declared capabilities.
    pub capabilities: Capabilities,
}

/// `session/register` response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    /// The stored session record.
    pub session: Session,
    /// Pending tasks, highest priority first.
    pub available_tasks: Vec<Task>,
}

/// `session/heartbeat` and `session/deregister` request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    /// Session identity.
    pub session_id: SessionId,
}

/// `task/claim` request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    /// Claiming session.
    pub session_id: SessionId,
    /// Task to claim.
    pub task_id: TaskId,
}

/// `task/complete` request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    /// Completing session; must own the task.
    pub session_id: SessionId,
    /// Task to complete.
    pub task_id: TaskId,
    /// Opaque result payload.
    #[serde(default)]
    pub result: Value,
}

/// `task/assign` and `task/get` request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    /// Task identity.
    pub task_id: TaskId,
}

/// `task/assign` response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignResponse {
    /// Whether a session was assigned.
    pub success: bool,
    /// The assigned session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl AssignResponse {
    /// Response for a successful assignment.
    pub fn assigned(session_id: SessionId) -> Self {
        Self {
            success: true,
            session_id: Some(session_id),
        }
    }

    /// Response when no session could take the task.
    pub fn unassigned() -> Self {
        Self {
            success: false,
            session_id: None,
        }
    }
}

/// `{success}` response used by claim, complete, heartbeat, deregister and sync.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    /// Outcome. `false` is a contention outcome, not an error.
    pub success: bool,
}

impl From<bool> for SuccessResponse {
    fn from(success: bool) -> Self {
        Self { success }
    }
}

/// A session definition inside a bulk sync.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSpec {
    /// Session identity.
    pub id: SessionId,
    /// Declared kind.
    #[serde(default)]
    pub kind: String,
    /// Declared capabilities.
    pub capabilities: Capabilities,
}

/// A task definition inside a bulk sync.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    /// Task identity.
    pub id: TaskId,
    /// Human description.
    #[serde(default)]
    pub description: String,
    /// Scheduling priority.
    #[serde(default)]
    pub priority: TaskPriority,
    /// Prerequisite task ids.
    #[serde(default)]
    pub dependencies: BTreeSet<TaskId>,
    /// Only `completed` is honored; anything else is derived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// Result for tasks seeded as completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl TaskSpec {
    /// A spec with the given id, description and dependencies.
    pub fn new(
        id: impl Into<TaskId>,
        description: impl Into<String>,
        priority: TaskPriority,
        dependencies: impl IntoIterator<Item = TaskId>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            priority,
            dependencies: dependencies.into_iter().collect(),
            status: None,
            result: None,
        }
    }

    /// Whether the spec seeds the task as completed.
    pub fn seeds_completed(&self) -> bool {
        self.status == Some(TaskStatus::Completed)
    }
}

/// `sync` request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Sessions to upsert.
    #[serde(default)]
    pub sessions: Vec<SessionSpec>,
    /// Tasks to upsert.
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
}
