//! The unit of change produced by a transition.
//!
//! A commit carries full replacement records, so persisting it is a list of
//! puts and deletes and applying it is a list of upserts and removals.

use cadre_core::constants::{LAST_SYNC_KEY, session_key, task_key};
use cadre_core::types::{CoordinatorEvent, Session, Task};
use cadre_core::SessionId;
use cadre_store::KvWrite;
use chrono::{DateTime, Utc};

/// Records to write, sessions to drop, and events to announce.
#[derive(Clone, Debug, Default)]
pub struct Commit {
    /// Tasks to insert or replace.
    pub tasks: Vec<Task>,
    /// Sessions to insert or replace.
    pub sessions: Vec<Session>,
    /// Sessions to delete.
    pub removed_sessions: Vec<SessionId>,
    /// New bulk-sync timestamp.
    pub last_sync: Option<DateTime<Utc>>,
    /// Events announced once the commit is applied.
    pub events: Vec<CoordinatorEvent>,
}

impl Commit {
    /// Whether the commit changes any durable record.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
            && self.sessions.is_empty()
            && self.removed_sessions.is_empty()
            && self.last_sync.is_none()
    }

    /// Replace or add a task, keeping one entry per id.
    pub fn put_task(&mut self, task: Task) {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(slot) => *slot = task,
            None => self.tasks.push(task),
        }
    }

    /// Replace or add a session, keeping one entry per id.
    pub fn put_session(&mut self, session: Session) {
        match self.sessions.iter_mut().find(|s| s.id == session.id) {
            Some(slot) => *slot = session,
            None => self.sessions.push(session),
        }
    }

    /// Drop a session, discarding any pending update to it.
    pub fn remove_session(&mut self, id: SessionId) {
        self.sessions.retain(|s| s.id != id);
        if !self.removed_sessions.contains(&id) {
            self.removed_sessions.push(id);
        }
    }

    /// Durable writes for this commit, as one batch.
    pub fn to_writes(&self) -> cadre_store::Result<Vec<KvWrite>> {
        let mut writes = Vec::with_capacity(
            self.tasks.len() + self.sessions.len() + self.removed_sessions.len() + 1,
        );
        for task in &self.tasks {
            writes.push(KvWrite::put(task_key(&task.id), task)?);
        }
        for session in &self.sessions {
            writes.push(KvWrite::put(session_key(&session.id), session)?);
        }
        for id in &self.removed_sessions {
            writes.push(KvWrite::delete(session_key(id)));
        }
        if let Some(at) = self.last_sync {
            writes.push(KvWrite::put(LAST_SYNC_KEY, &at)?);
        }
        Ok(writes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadre_core::types::{Capabilities, TaskPriority};
    use std::collections::BTreeSet;

    #[test]
    fn empty_commit() {
        assert!(Commit::default().is_empty());
        assert!(Commit::default().to_writes().unwrap().is_empty());
    }

    #[test]
    fn writes_use_namespaced_keys() {
        let now = Utc::now();
        let mut commit = Commit::default();
        commit.put_task(Task::new("t1".into(), "x", TaskPriority::Low, BTreeSet::new(), now));
        commit.put_session(Session::new("a".into(), "k", Capabilities::with_capacity(1), now));
        commit.remove_session("b".into());
        commit.last_sync = Some(now);

        let keys: Vec<String> = commit
            .to_writes()
            .unwrap()
            .iter()
            .map(|w| w.key().to_string())
            .collect();
        assert_eq!(keys, vec!["task:t1", "session:a", "session:b", "meta:last_sync"]);
    }

    #[test]
    fn removal_supersedes_update() {
        let now = Utc::now();
        let mut commit = Commit::default();
        commit.put_session(Session::new("a".into(), "k", Capabilities::with_capacity(1), now));
        commit.remove_session("a".into());
        commit.remove_session("a".into());
        assert!(commit.sessions.is_empty());
        assert_eq!(commit.removed_sessions.len(), 1);
    }

    #[test]
    fn put_task_deduplicates() {
        let now = Utc::now();
        let mut commit = Commit::default();
        let mut t = Task::new("t1".into(), "x", TaskPriority::Low, BTreeSet::new(), now);
        commit.put_task(t.clone());
        t.description = "y".into();
        commit.put_task(t);
        assert_eq!(commit.tasks.len(), 1);
        assert_eq!(commit.tasks[0].description, "y");
    }
}
