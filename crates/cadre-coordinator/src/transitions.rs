//! Pure state transitions.
//!
//! Each function reads the current state and returns the [`Commit`] that
//! would move it forward, or `None` when the request is a contention outcome
//! (nothing changes and the caller reports `false`). Nothing here performs
//! I/O, so every rule is testable against a plain [`CoordinatorState`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use cadre_core::types::{
    CoordinatorEvent, RegisterRequest, RegisterResponse, Session, SessionStatus, SyncRequest,
    Task, TaskClassification, TaskStatus,
};
use cadre_core::{SessionId, TaskId};
use cadre_settings::LivenessSettings;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::commit::Commit;
use crate::errors::{CoordinatorError, Result};
use crate::graph::find_cycle;
use crate::state::CoordinatorState;

/// Register a new session or refresh an existing one.
///
/// Re-registration keeps owned tasks and the original registration time. A
/// capacity below the number of tasks already owned is rejected.
pub fn register(
    state: &CoordinatorState,
    req: &RegisterRequest,
    now: DateTime<Utc>,
) -> Result<(Commit, RegisterResponse)> {
    validate_id("sessionId", &req.session_id)?;
    validate_capacity(&req.session_id, req.capabilities.max_concurrent_tasks)?;

    let session = match state.sessions.get(&req.session_id) {
        Some(existing) => {
            let owned = existing.owned_tasks.len();
            if (req.capabilities.max_concurrent_tasks as usize) < owned {
                return Err(CoordinatorError::validation(format!(
                    "session {} owns {owned} tasks; capacity {} is too small",
                    req.session_id, req.capabilities.max_concurrent_tasks
                )));
            }
            let mut session = existing.clone();
            session.kind.clone_from(&req.kind);
            session.capabilities = req.capabilities.clone();
            session.status = SessionStatus::Active;
            session.last_heartbeat = now;
            session
        }
        None => Session::new(
            req.session_id.clone(),
            req.kind.clone(),
            req.capabilities.clone(),
            now,
        ),
    };

    let mut commit = Commit::default();
    commit.events.push(CoordinatorEvent::session_registered(&session, now));
    commit.put_session(session.clone());

    let response = RegisterResponse {
        session,
        available_tasks: state.tasks.available(),
    };
    Ok((commit, response))
}

/// Claim a pending task for an active session with spare capacity.
pub fn claim(
    state: &CoordinatorState,
    session_id: &str,
    task_id: &str,
    now: DateTime<Utc>,
) -> Option<Commit> {
    let task = state.tasks.get(task_id)?;
    if task.status != TaskStatus::Pending || task.owner.is_some() {
        return None;
    }
    let session = state.sessions.get(session_id)?;
    if !session.can_claim() {
        return None;
    }
    // A pending task always has its dependencies met; re-check so a stale
    // status can never leak a claim.
    if !state.tasks.dependencies_met(task) {
        return None;
    }

    let mut task = task.clone();
    task.status = TaskStatus::Claimed;
    task.owner = Some(session.id.clone());
    task.claimed_at = Some(now);

    let mut session = session.clone();
    let _ = session.owned_tasks.insert(task.id.clone());

    let mut commit = Commit::default();
    commit.events.push(CoordinatorEvent::task_claimed(&task, now));
    commit.put_task(task);
    commit.put_session(session);
    Some(commit)
}

/// Complete a task owned by `session_id` and unblock its dependents.
pub fn complete(
    state: &CoordinatorState,
    session_id: &str,
    task_id: &str,
    result: Value,
    now: DateTime<Utc>,
) -> Option<Commit> {
    let task = state.tasks.get(task_id)?;
    if task.status != TaskStatus::Claimed || !task.is_owned_by(session_id) {
        return None;
    }

    let mut task = task.clone();
    task.status = TaskStatus::Completed;
    task.owner = None;
    task.result = Some(result);
    task.completed_at = Some(now);

    let mut commit = Commit::default();
    commit.events.push(CoordinatorEvent::task_completed(&task, session_id, now));

    if let Some(session) = state.sessions.get(session_id) {
        let mut session = session.clone();
        let _ = session.owned_tasks.remove(task_id);
        commit.put_session(session);
    }

    // Dependency sweep: the completed task counts as completed from here on.
    for dependent in state.tasks.dependents_of(task_id) {
        if dependent.status != TaskStatus::Blocked {
            continue;
        }
        let met = dependent
            .dependencies
            .iter()
            .all(|d| d.as_str() == task_id || state.tasks.is_completed(d));
        if met {
            let mut unblocked = dependent.clone();
            unblocked.status = TaskStatus::Pending;
            commit.events.push(CoordinatorEvent::task_available(&unblocked, now));
            commit.put_task(unblocked);
        }
    }

    commit.put_task(task);
    Some(commit)
}

/// Record a heartbeat. Unknown and terminated sessions are ignored; a stale
/// session is revived.
pub fn heartbeat(state: &CoordinatorState, session_id: &str, now: DateTime<Utc>) -> Option<Commit> {
    let session = state.sessions.get(session_id)?;
    if session.status == SessionStatus::Terminated {
        return None;
    }

    let mut commit = Commit::default();
    let mut session = session.clone();
    if session.status == SessionStatus::Stale {
        session.status = SessionStatus::Active;
        commit
            .events
            .push(CoordinatorEvent::session_transition(&session.id, "revived", now));
    }
    session.last_heartbeat = now;
    commit.put_session(session);
    Some(commit)
}

/// Terminate a session and return its work to the pool.
///
/// Returns an empty commit for a session that is already terminated.
pub fn deregister(state: &CoordinatorState, session_id: &str, now: DateTime<Utc>) -> Option<Commit> {
    let session = state.sessions.get(session_id)?;
    let mut commit = Commit::default();
    if session.status == SessionStatus::Terminated {
        return Some(commit);
    }

    let mut session = session.clone();
    let _ = release_owned(state, &mut session, &mut commit, now);
    session.status = SessionStatus::Terminated;
    commit
        .events
        .push(CoordinatorEvent::session_transition(&session.id, "terminated", now));
    commit.put_session(session);
    Some(commit)
}

/// Outcome of one liveness sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sessions newly marked stale.
    pub stale: Vec<SessionId>,
    /// Tasks returned to the pool.
    pub reclaimed: Vec<TaskId>,
    /// Sessions removed entirely.
    pub purged: Vec<SessionId>,
}

impl SweepReport {
    /// Whether the sweep changed anything.
    pub fn is_empty(&self) -> bool {
        self.stale.is_empty() && self.reclaimed.is_empty() && self.purged.is_empty()
    }
}

/// Demote silent sessions, reclaim their tasks, and purge long-silent ones.
pub fn sweep(
    state: &CoordinatorState,
    liveness: &LivenessSettings,
    now: DateTime<Utc>,
) -> (Commit, SweepReport) {
    let stale_after = seconds(liveness.stale_threshold_secs);
    let purge_after = seconds(liveness.purge_after_secs);

    let mut commit = Commit::default();
    let mut report = SweepReport::default();

    for session in state.sessions.iter() {
        let silence = now - session.last_heartbeat;
        let mut session = session.clone();

        if session.is_active() && silence > stale_after {
            let released = release_owned(state, &mut session, &mut commit, now);
            report.reclaimed.extend(released);
            session.status = SessionStatus::Stale;
            report.stale.push(session.id.clone());
            commit
                .events
                .push(CoordinatorEvent::session_transition(&session.id, "stale", now));
            commit.put_session(session.clone());
        }

        if !session.is_active() && silence > purge_after {
            report.purged.push(session.id.clone());
            commit
                .events
                .push(CoordinatorEvent::session_transition(&session.id, "purged", now));
            commit.remove_session(session.id);
        }
    }

    (commit, report)
}

/// Release every task `session` owns back to `pending`, recording the task
/// updates and `task_reclaimed` events in `commit`.
fn release_owned(
    state: &CoordinatorState,
    session: &mut Session,
    commit: &mut Commit,
    now: DateTime<Utc>,
) -> Vec<TaskId> {
    let mut released = Vec::new();
    for task in state.tasks.owned_by(&session.id) {
        if task.status == TaskStatus::Completed {
            continue;
        }
        let mut task = task.clone();
        task.owner = None;
        task.claimed_at = None;
        task.status = if state.tasks.dependencies_met(&task) {
            TaskStatus::Pending
        } else {
            TaskStatus::Blocked
        };
        commit
            .events
            .push(CoordinatorEvent::task_reclaimed(&task, &session.id, now));
        released.push(task.id.clone());
        commit.put_task(task);
    }
    session.owned_tasks.clear();
    released
}

/// Candidates for coordinator-driven assignment of `task_id`.
///
/// `None` when the task is unknown or not pending. Candidates are active
/// sessions with spare capacity, ordered by id.
pub fn assignment_candidates<'a>(
    state: &'a CoordinatorState,
    task_id: &str,
) -> Option<(&'a Task, Vec<&'a Session>)> {
    let task = state.tasks.get(task_id)?;
    if task.status != TaskStatus::Pending {
        return None;
    }
    let candidates = state.sessions.active().filter(|s| s.has_spare_capacity()).collect();
    Some((task, candidates))
}

/// Least-loaded candidates: all sessions tied for the fewest owned tasks,
/// ordered by id.
pub fn least_loaded<'a>(candidates: &[&'a Session]) -> Vec<&'a Session> {
    let Some(min) = candidates.iter().map(|s| s.owned_tasks.len()).min() else {
        return Vec::new();
    };
    candidates
        .iter()
        .filter(|s| s.owned_tasks.len() == min)
        .copied()
        .collect()
}

/// Upsert sessions and tasks from an external source.
///
/// `classifications` holds advisory results for tasks first seen in this
/// sync. Rejects cyclic dependency graphs and edits that would break a claim.
pub fn sync(
    state: &CoordinatorState,
    req: &SyncRequest,
    classifications: &HashMap<TaskId, TaskClassification>,
    now: DateTime<Utc>,
) -> Result<Commit> {
    let mut commit = Commit::default();

    // ── Sessions ────────────────────────────────────────────────────
    let mut sessions: BTreeMap<SessionId, Session> = BTreeMap::new();
    for spec in &req.sessions {
        validate_id("session id", &spec.id)?;
        validate_capacity(&spec.id, spec.capabilities.max_concurrent_tasks)?;
        let base = sessions
            .remove(&spec.id)
            .or_else(|| state.sessions.get(&spec.id).cloned());
        let session = match base {
            Some(mut existing) => {
                if (spec.capabilities.max_concurrent_tasks as usize) < existing.owned_tasks.len() {
                    return Err(CoordinatorError::validation(format!(
                        "session {} owns {} tasks; capacity {} is too small",
                        spec.id,
                        existing.owned_tasks.len(),
                        spec.capabilities.max_concurrent_tasks
                    )));
                }
                existing.kind.clone_from(&spec.kind);
                existing.capabilities = spec.capabilities.clone();
                existing
            }
            None => Session::new(spec.id.clone(), spec.kind.clone(), spec.capabilities.clone(), now),
        };
        let _ = sessions.insert(session.id.clone(), session);
    }

    // ── Tasks: merge specs over current records ─────────────────────
    let mut merged: BTreeMap<TaskId, Task> = state
        .tasks
        .iter()
        .map(|t| (t.id.clone(), t.clone()))
        .collect();

    for spec in &req.tasks {
        validate_id("task id", &spec.id)?;
        let task = match merged.remove(&spec.id) {
            Some(mut existing) => {
                let locked = matches!(existing.status, TaskStatus::Claimed | TaskStatus::Completed);
                if locked && existing.dependencies != spec.dependencies {
                    return Err(CoordinatorError::validation(format!(
                        "task {} is {}; its dependencies cannot change",
                        spec.id, existing.status
                    )));
                }
                if spec.seeds_completed() && existing.status == TaskStatus::Claimed {
                    return Err(CoordinatorError::validation(format!(
                        "task {} is claimed and cannot be marked completed by sync",
                        spec.id
                    )));
                }
                existing.description.clone_from(&spec.description);
                existing.priority = spec.priority;
                existing.dependencies.clone_from(&spec.dependencies);
                if spec.seeds_completed() && existing.status != TaskStatus::Completed {
                    existing.status = TaskStatus::Completed;
                    existing.completed_at = Some(now);
                    existing.result.clone_from(&spec.result);
                }
                existing
            }
            None => {
                let mut task = Task::new(
                    spec.id.clone(),
                    spec.description.clone(),
                    spec.priority,
                    spec.dependencies.clone(),
                    now,
                );
                task.classification = classifications.get(&spec.id).cloned();
                if spec.seeds_completed() {
                    task.status = TaskStatus::Completed;
                    task.completed_at = Some(now);
                    task.result.clone_from(&spec.result);
                }
                task
            }
        };
        let _ = merged.insert(task.id.clone(), task);
    }

    let graph: BTreeMap<TaskId, BTreeSet<TaskId>> = merged
        .values()
        .map(|t| (t.id.clone(), t.dependencies.clone()))
        .collect();
    if let Some(cycle) = find_cycle(&graph) {
        let path: Vec<&str> = cycle.iter().map(TaskId::as_str).collect();
        return Err(CoordinatorError::validation(format!(
            "dependency cycle: {}",
            path.join(" -> ")
        )));
    }

    // ── Recompute derived status ────────────────────────────────────
    let completed: BTreeSet<TaskId> = merged
        .values()
        .filter(|t| t.status == TaskStatus::Completed)
        .map(|t| t.id.clone())
        .collect();
    for task in merged.values_mut() {
        if matches!(task.status, TaskStatus::Claimed | TaskStatus::Completed) {
            continue;
        }
        task.status = if task.dependencies.iter().all(|d| completed.contains(d)) {
            TaskStatus::Pending
        } else {
            TaskStatus::Blocked
        };
    }

    // ── Diff against current state ──────────────────────────────────
    let mut changed_tasks = 0;
    for task in merged.into_values() {
        let previous = state.tasks.get(&task.id);
        if previous == Some(&task) {
            continue;
        }
        if task.status == TaskStatus::Pending
            && previous.is_none_or(|p| p.status != TaskStatus::Pending)
        {
            commit.events.push(CoordinatorEvent::task_available(&task, now));
        }
        changed_tasks += 1;
        commit.put_task(task);
    }

    let mut changed_sessions = 0;
    for session in sessions.into_values() {
        if state.sessions.get(&session.id) == Some(&session) {
            continue;
        }
        changed_sessions += 1;
        commit.put_session(session);
    }

    commit
        .events
        .insert(0, CoordinatorEvent::synced(changed_sessions, changed_tasks, now));
    commit.last_sync = Some(now);
    Ok(commit)
}

fn validate_id(field: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(CoordinatorError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn validate_capacity(id: &str, capacity: u32) -> Result<()> {
    if capacity == 0 {
        return Err(CoordinatorError::validation(format!(
            "session {id}: maxConcurrentTasks must be at least 1"
        )));
    }
    Ok(())
}

fn seconds(secs: u64) -> Duration {
    Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
}
