//! Read-only status snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::Session;
use super::task::{Task, TaskStatus};

/// Per-status task counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    /// Tasks waiting on dependencies.
    pub blocked: usize,
    /// Tasks ready to claim.
    pub pending: usize,
    /// Tasks owned by a session.
    pub claimed: usize,
    /// Finished tasks.
    pub completed: usize,
    /// All tasks.
    pub total: usize,
}

impl TaskStats {
    /// Count one task.
    pub fn record(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Blocked => self.blocked += 1,
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Claimed => self.claimed += 1,
            TaskStatus::Completed => self.completed += 1,
        }
        self.total += 1;
    }

    /// Count for a single status.
    pub fn count(&self, status: TaskStatus) -> usize {
        match status {
            TaskStatus::Blocked => self.blocked,
            TaskStatus::Pending => self.pending,
            TaskStatus::Claimed => self.claimed,
            TaskStatus::Completed => self.completed,
        }
    }
}

impl<'a> FromIterator<&'a Task> for TaskStats {
    fn from_iter<I: IntoIterator<Item = &'a Task>>(iter: I) -> Self {
        let mut stats = Self::default();
        for task in iter {
            stats.record(task.status);
        }
        stats
    }
}

/// Point-in-time view of the coordinator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Number of active sessions.
    pub active_sessions: usize,
    /// Active sessions, ordered by id.
    pub sessions: Vec<Session>,
    /// Task counts by status.
    pub task_stats: TaskStats,
    /// Time of the last bulk sync, if any.
    pub last_sync: Option<DateTime<Utc>>,
    /// All tasks, ordered by id.
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl StatusSnapshot {
    /// Look up a task in the snapshot.
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id.as_str() == id)
    }

    /// Look up an active session in the snapshot.
    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id.as_str() == id)
    }
}
