//! Task records in the shared task graph.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::advisory::TaskClassification;
use crate::ids::{SessionId, TaskId};

/// Task lifecycle status.
///
/// `Blocked` and `Pending` are the entry states; `Completed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// At least one dependency is not completed.
    Blocked,
    /// Ready to be claimed.
    Pending,
    /// Owned by exactly one session.
    Claimed,
    /// Finished; result recorded.
    Completed,
}

impl TaskStatus {
    /// Lowercase name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::Pending => "pending",
            Self::Claimed => "claimed",
            Self::Completed => "completed",
        }
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        self == Self::Completed
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority. Ordering is `Low < Medium < High < Critical`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Background work.
    Low,
    /// Normal work.
    #[default]
    Medium,
    /// Should be picked up before medium work.
    High,
    /// Picked up first.
    Critical,
}

/// A unit of work with optional dependencies and at most one owner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Caller-chosen identity.
    pub id: TaskId,
    /// Human description.
    pub description: String,
    /// Scheduling priority.
    #[serde(default)]
    pub priority: TaskPriority,
    /// Tasks that must complete before this one becomes pending.
    #[serde(default)]
    pub dependencies: BTreeSet<TaskId>,
    /// Current status.
    pub status: TaskStatus,
    /// Owning session while claimed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<SessionId>,
    /// When the task entered the store.
    pub created_at: DateTime<Utc>,
    /// When the current claim was made.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    /// When the task completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Opaque result payload, set only on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Informational classification from the advisory layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<TaskClassification>,
}

impl Task {
    /// Create a task. Status starts `Pending` when there are no dependencies,
    /// `Blocked` otherwise; callers re-evaluate against the store afterwards.
    pub fn new(
        id: TaskId,
        description: impl Into<String>,
        priority: TaskPriority,
        dependencies: BTreeSet<TaskId>,
        now: DateTime<Utc>,
    ) -> Self {
        let status = if dependencies.is_empty() {
            TaskStatus::Pending
        } else {
            TaskStatus::Blocked
        };
        Self {
            id,
            description: description.into(),
            priority,
            dependencies,
            status,
            owner: None,
            created_at: now,
            claimed_at: None,
            completed_at: None,
            result: None,
            classification: None,
        }
    }

    /// Whether `session_id` currently owns this task.
    pub fn is_owned_by(&self, session_id: &str) -> bool {
        self.owner.as_deref() == Some(session_id)
    }

    /// Whether this task lists `task_id` as a dependency.
    pub fn depends_on(&self, task_id: &str) -> bool {
        self.dependencies.contains(task_id)
    }
}
