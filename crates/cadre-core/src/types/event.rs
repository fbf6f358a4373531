//! Committed state-change events pushed to observers.
//!
//! Events are transient: built after a commit, serialized once, and handed to
//! every connected observer. They are never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::session::Session;
use super::task::Task;

/// Event discriminator on the push channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A session registered or re-registered.
    SessionRegistered,
    /// A task was claimed.
    TaskClaimed,
    /// A task was completed.
    TaskCompleted,
    /// A task was released from a stale or terminated session.
    TaskReclaimed,
    /// Any other committed change (unblocked tasks, session transitions, sync).
    StateUpdate,
}

impl EventType {
    /// Snake-case name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionRegistered => "session_registered",
            Self::TaskClaimed => "task_claimed",
            Self::TaskCompleted => "task_completed",
            Self::TaskReclaimed => "task_reclaimed",
            Self::StateUpdate => "state_update",
        }
    }
}

/// A committed state transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorEvent {
    /// Event discriminator.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Event-specific payload.
    pub payload: Value,
    /// Commit time.
    pub timestamp: DateTime<Utc>,
}

impl CoordinatorEvent {
    /// Create an event.
    pub fn new(event_type: EventType, payload: Value, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_type,
            payload,
            timestamp,
        }
    }

    /// `session_registered` with the full session record.
    pub fn session_registered(session: &Session, at: DateTime<Utc>) -> Self {
        Self::new(
            EventType::SessionRegistered,
            json!({ "session": session }),
            at,
        )
    }

    /// `task_claimed` for a freshly claimed task.
    pub fn task_claimed(task: &Task, at: DateTime<Utc>) -> Self {
        Self::new(
            EventType::TaskClaimed,
            json!({ "taskId": task.id, "sessionId": task.owner }),
            at,
        )
    }

    /// `task_completed` naming the completing session.
    pub fn task_completed(task: &Task, session_id: &str, at: DateTime<Utc>) -> Self {
        Self::new(
            EventType::TaskCompleted,
            json!({ "taskId": task.id, "sessionId": session_id, "result": task.result }),
            at,
        )
    }

    /// `task_reclaimed` naming the session the task was taken from.
    pub fn task_reclaimed(task: &Task, from_session: &str, at: DateTime<Utc>) -> Self {
        Self::new(
            EventType::TaskReclaimed,
            json!({ "taskId": task.id, "previousOwner": from_session, "status": task.status }),
            at,
        )
    }

    /// `state_update` announcing a task that became claimable.
    pub fn task_available(task: &Task, at: DateTime<Utc>) -> Self {
        Self::new(
            EventType::StateUpdate,
            json!({ "taskId": task.id, "status": task.status, "priority": task.priority }),
            at,
        )
    }

    /// `state_update` for a session lifecycle transition.
    pub fn session_transition(session_id: &str, transition: &str, at: DateTime<Utc>) -> Self {
        Self::new(
            EventType::StateUpdate,
            json!({ "sessionId": session_id, "transition": transition }),
            at,
        )
    }

    /// `state_update` summarizing a bulk sync.
    pub fn synced(sessions: usize, tasks: usize, at: DateTime<Utc>) -> Self {
        Self::new(
            EventType::StateUpdate,
            json!({ "sync": { "sessions": sessions, "tasks": tasks } }),
            at,
        )
    }
}
