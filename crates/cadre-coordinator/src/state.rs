//! In-memory Task Store and Session Registry.
//!
//! Plain maps with lookup helpers. All decisions live in `transitions`; this
//! module only stores records and answers questions about them.

use std::collections::BTreeMap;

use cadre_core::types::{Session, StatusSnapshot, Task, TaskStats, TaskStatus};
use cadre_core::{SessionId, TaskId};
use chrono::{DateTime, Utc};

use crate::commit::Commit;

// ─────────────────────────────────────────────────────────────────────────────
// Task Store
// ─────────────────────────────────────────────────────────────────────────────

/// Task records keyed by id.
#[derive(Clone, Debug, Default)]
pub struct TaskStore {
    tasks: BTreeMap<TaskId, Task>,
}

impl TaskStore {
    /// Look up a task.
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Whether a task exists.
    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    /// Insert or replace a task.
    pub fn upsert(&mut self, task: Task) {
        let _ = self.tasks.insert(task.id.clone(), task);
    }

    /// All tasks ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Whether `id` exists and is completed.
    pub fn is_completed(&self, id: &str) -> bool {
        self.get(id)
            .is_some_and(|t| t.status == TaskStatus::Completed)
    }

    /// Whether every dependency of `task` is completed. Unknown ids count as
    /// not completed.
    pub fn dependencies_met(&self, task: &Task) -> bool {
        task.dependencies.iter().all(|d| self.is_completed(d))
    }

    /// Tasks that list `id` as a dependency.
    pub fn dependents_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks.values().filter(move |t| t.depends_on(id))
    }

    /// Pending tasks ordered by priority (highest first), then age, then id.
    pub fn available(&self) -> Vec<Task> {
        let mut pending: Vec<Task> = self
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        pending
    }

    /// Tasks currently owned by `session_id`.
    pub fn owned_by<'a>(&'a self, session_id: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks.values().filter(move |t| t.is_owned_by(session_id))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Session records keyed by id.
#[derive(Clone, Debug, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<SessionId, Session>,
}

impl SessionRegistry {
    /// Look up a session.
    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Insert or replace a session.
    pub fn upsert(&mut self, session: Session) {
        let _ = self.sessions.insert(session.id.clone(), session);
    }

    /// Remove a session.
    pub fn remove(&mut self, id: &str) -> Option<Session> {
        self.sessions.remove(id)
    }

    /// All sessions ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Mutable access for startup repair.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.values_mut()
    }

    /// Active sessions ordered by id.
    pub fn active(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values().filter(|s| s.is_active())
    }

    /// Number of sessions in any status.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Combined state
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the coordinator guards behind its lock.
#[derive(Clone, Debug, Default)]
pub struct CoordinatorState {
    /// Task records.
    pub tasks: TaskStore,
    /// Session records.
    pub sessions: SessionRegistry,
    /// Time of the last bulk sync.
    pub last_sync: Option<DateTime<Utc>>,
}

impl CoordinatorState {
    /// Apply a commit that has already been persisted.
    pub fn apply(&mut self, commit: &Commit) {
        for task in &commit.tasks {
            self.tasks.upsert(task.clone());
        }
        for session in &commit.sessions {
            self.sessions.upsert(session.clone());
        }
        for id in &commit.removed_sessions {
            let _ = self.sessions.remove(id);
        }
        if let Some(at) = commit.last_sync {
            self.last_sync = Some(at);
        }
    }

    /// Read-only snapshot.
    pub fn snapshot(&self) -> StatusSnapshot {
        let sessions: Vec<Session> = self.sessions.active().cloned().collect();
        StatusSnapshot {
            active_sessions: sessions.len(),
            sessions,
            task_stats: self.tasks.iter().collect::<TaskStats>(),
            last_sync: self.last_sync,
            tasks: self.tasks.iter().cloned().collect(),
        }
    }
}
