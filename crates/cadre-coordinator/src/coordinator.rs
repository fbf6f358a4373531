//! The authoritative coordinator.
//!
//! Every mutation runs a pure transition under the write lock, persists the
//! resulting commit, applies it to memory, and only then broadcasts its
//! events. A failed write leaves memory untouched and no events go out.
//! Advisory calls happen before the write lock is taken.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use cadre_advisory::AdvisoryBridge;
use cadre_core::constants::{LAST_SYNC_KEY, SESSION_KEY_PREFIX, TASK_KEY_PREFIX};
use cadre_core::types::{
    AssignResponse, CandidateSession, CoordinatorEvent, RegisterRequest, RegisterResponse,
    Session, StatusSnapshot, SyncRequest, Task, TaskClassification, TaskStatus,
};
use cadre_core::{SessionId, TaskId};
use cadre_settings::LivenessSettings;
use cadre_store::{KvStore, KvStoreExt, KvWrite};
use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use serde_json::Value;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, instrument, warn};

use crate::commit::Commit;
use crate::errors::Result;
use crate::state::CoordinatorState;
use crate::transitions::{self, SweepReport};

/// Broadcast channel capacity for coordinator events.
const EVENT_CAPACITY: usize = 1024;

/// Task coordination service over a durable key-value store.
pub struct Coordinator {
    state: RwLock<CoordinatorState>,
    store: Arc<dyn KvStore>,
    advisory: AdvisoryBridge,
    liveness: LivenessSettings,
    events: broadcast::Sender<CoordinatorEvent>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("advisory", &self.advisory)
            .field("liveness", &self.liveness)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Load persisted state and start serving from it.
    ///
    /// Owned-task sets are rebuilt from task owners. A claimed task whose
    /// owner no longer exists is returned to the pool and the repair is
    /// written back.
    pub fn load(
        store: Arc<dyn KvStore>,
        advisory: AdvisoryBridge,
        liveness: LivenessSettings,
    ) -> Result<Self> {
        let mut state = CoordinatorState::default();

        for session in store.list_prefix_as::<Session>(SESSION_KEY_PREFIX)? {
            state.sessions.upsert(session);
        }
        for task in store.list_prefix_as::<Task>(TASK_KEY_PREFIX)? {
            state.tasks.upsert(task);
        }
        state.last_sync = store.get_as::<DateTime<Utc>>(LAST_SYNC_KEY)?;

        let repair = reconcile(&mut state);
        if !repair.is_empty() {
            warn!(
                tasks = repair.tasks.len(),
                sessions = repair.sessions.len(),
                "repaired inconsistent state on load"
            );
            store.write_batch(repair.to_writes()?)?;
            state.apply(&repair);
        }

        info!(
            sessions = state.sessions.len(),
            tasks = state.tasks.len(),
            advisory = advisory.is_enabled(),
            "coordinator state loaded"
        );
        record_gauges(&state);

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            state: RwLock::new(state),
            store,
            advisory,
            liveness,
            events,
        })
    }

    /// Subscribe to committed events.
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.events.subscribe()
    }

    /// Liveness thresholds in effect.
    pub fn liveness(&self) -> &LivenessSettings {
        &self.liveness
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────

    /// Register or refresh a session and list claimable tasks.
    #[instrument(skip_all, fields(session_id = %req.session_id))]
    pub async fn register_session(&self, req: RegisterRequest) -> Result<RegisterResponse> {
        let mut state = self.state.write().await;
        let (commit, response) = transitions::register(&state, &req, Utc::now())?;
        self.commit(&mut state, commit, "register")?;
        info!(
            kind = %response.session.kind,
            capacity = response.session.capabilities.max_concurrent_tasks,
            available = response.available_tasks.len(),
            "session registered"
        );
        Ok(response)
    }

    /// Record a heartbeat. `false` for unknown or terminated sessions.
    pub async fn heartbeat(&self, session_id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        match transitions::heartbeat(&state, session_id, Utc::now()) {
            Some(commit) => {
                self.commit(&mut state, commit, "heartbeat")?;
                Ok(true)
            }
            None => {
                debug!(session_id, "heartbeat ignored");
                Ok(false)
            }
        }
    }

    /// Terminate a session and reclaim its tasks. `false` if unknown.
    #[instrument(skip(self))]
    pub async fn deregister_session(&self, session_id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        match transitions::deregister(&state, session_id, Utc::now()) {
            Some(commit) => {
                let reclaimed = commit.tasks.len();
                self.commit(&mut state, commit, "deregister")?;
                info!(reclaimed, "session deregistered");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Tasks
    // ─────────────────────────────────────────────────────────────────────

    /// Claim a pending task. `false` on any contention outcome.
    #[instrument(skip(self))]
    pub async fn claim_task(&self, session_id: &str, task_id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(commit) = transitions::claim(&state, session_id, task_id, Utc::now()) else {
            counter!("coordinator_claims_total", "outcome" => "rejected").increment(1);
            debug!("claim rejected");
            return Ok(false);
        };
        self.commit(&mut state, commit, "claim")?;
        counter!("coordinator_claims_total", "outcome" => "claimed").increment(1);
        info!("task claimed");
        Ok(true)
    }

    /// Complete a task owned by `session_id`. `false` unless the caller owns
    /// it.
    #[instrument(skip(self, result))]
    pub async fn complete_task(&self, session_id: &str, task_id: &str, result: Value) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(commit) = transitions::complete(&state, session_id, task_id, result, Utc::now())
        else {
            debug!("completion rejected");
            return Ok(false);
        };
        let unblocked = commit.tasks.len().saturating_sub(1);
        self.commit(&mut state, commit, "complete")?;
        counter!("coordinator_completions_total").increment(1);
        info!(unblocked, "task completed");
        Ok(true)
    }

    /// Pick a session for a pending task and claim it on their behalf.
    ///
    /// The advisory recommendation is used when confident; otherwise the
    /// least-loaded candidate wins, with ties broken by the advisor or by
    /// session id.
    #[instrument(skip(self))]
    pub async fn assign_task(&self, task_id: &str) -> Result<AssignResponse> {
        let (task, candidates) = {
            let state = self.state.read().await;
            let Some((task, sessions)) = transitions::assignment_candidates(&state, task_id) else {
                return Ok(AssignResponse::unassigned());
            };
            let tied: Vec<CandidateSession> = transitions::least_loaded(&sessions)
                .into_iter()
                .map(CandidateSession::from)
                .collect();
            let all: Vec<CandidateSession> =
                sessions.into_iter().map(CandidateSession::from).collect();
            (task.clone(), (all, tied))
        };
        let (all, tied) = candidates;
        if all.is_empty() {
            debug!("no candidate sessions");
            return Ok(AssignResponse::unassigned());
        }

        let pick = match self.advisory.recommend(&task, &all).await {
            Some(id) => Some(id),
            None => match self.advisory.break_tie(&task, &tied).await {
                Some(id) => Some(id),
                None => tied.first().map(|c| c.id.clone()),
            },
        };
        let Some(session_id) = pick else {
            return Ok(AssignResponse::unassigned());
        };

        if self.claim_task(&session_id, task_id).await? {
            Ok(AssignResponse::assigned(session_id))
        } else {
            // Lost a race between the read and the claim.
            Ok(AssignResponse::unassigned())
        }
    }

    /// Look up a task.
    pub async fn get_task(&self, task_id: &str) -> Option<Task> {
        self.state.read().await.tasks.get(task_id).cloned()
    }

    /// Look up a session in any status.
    pub async fn get_session(&self, session_id: &str) -> Option<Session> {
        self.state.read().await.sessions.get(session_id).cloned()
    }

    /// Read-only status snapshot.
    pub async fn status(&self) -> StatusSnapshot {
        self.state.read().await.snapshot()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sync
    // ─────────────────────────────────────────────────────────────────────

    /// Upsert sessions and tasks in bulk.
    ///
    /// Tasks seen for the first time are classified by the advisor before
    /// the commit when advisory is enabled.
    #[instrument(skip_all, fields(sessions = req.sessions.len(), tasks = req.tasks.len()))]
    pub async fn sync_state(&self, req: SyncRequest) -> Result<StatusSnapshot> {
        let classifications = self.classify_new(&req).await;

        let mut state = self.state.write().await;
        let commit = transitions::sync(&state, &req, &classifications, Utc::now())?;
        self.commit(&mut state, commit, "sync")?;
        info!("state synced");
        Ok(state.snapshot())
    }

    async fn classify_new(&self, req: &SyncRequest) -> HashMap<TaskId, TaskClassification> {
        if !self.advisory.is_enabled() {
            return HashMap::new();
        }
        let fresh: Vec<Task> = {
            let state = self.state.read().await;
            let now = Utc::now();
            req.tasks
                .iter()
                .filter(|spec| !state.tasks.contains(&spec.id))
                .map(|spec| {
                    Task::new(
                        spec.id.clone(),
                        spec.description.clone(),
                        spec.priority,
                        spec.dependencies.clone(),
                        now,
                    )
                })
                .collect()
        };

        let results =
            futures::future::join_all(fresh.iter().map(|task| self.advisory.classify(task))).await;
        fresh
            .into_iter()
            .zip(results)
            .filter_map(|(task, classification)| classification.map(|c| (task.id, c)))
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Liveness
    // ─────────────────────────────────────────────────────────────────────

    /// Run one liveness sweep against the current time.
    pub async fn sweep(&self) -> Result<SweepReport> {
        self.sweep_at(Utc::now()).await
    }

    /// Run one liveness sweep as if the time were `now`.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut state = self.state.write().await;
        let (commit, report) = transitions::sweep(&state, &self.liveness, now);
        self.commit(&mut state, commit, "sweep")?;
        if !report.is_empty() {
            counter!("coordinator_reclaimed_tasks_total").increment(report.reclaimed.len() as u64);
            counter!("coordinator_purged_sessions_total").increment(report.purged.len() as u64);
            info!(
                stale = report.stale.len(),
                reclaimed = report.reclaimed.len(),
                purged = report.purged.len(),
                "liveness sweep"
            );
        }
        Ok(report)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Commit
    // ─────────────────────────────────────────────────────────────────────

    /// Persist, apply, then broadcast.
    fn commit(&self, state: &mut CoordinatorState, commit: Commit, op: &'static str) -> Result<()> {
        if !commit.is_empty() {
            let start = Instant::now();
            let writes = commit.to_writes()?;
            if let Err(err) = self.store.write_batch(writes) {
                counter!("coordinator_storage_errors_total", "op" => op).increment(1);
                warn!(op, error = %err, "commit failed, state unchanged");
                return Err(err.into());
            }
            histogram!("coordinator_commit_duration_seconds", "op" => op)
                .record(start.elapsed().as_secs_f64());
            state.apply(&commit);
            record_gauges(state);
        }
        for event in commit.events {
            counter!("coordinator_events_total", "type" => event.event_type.as_str()).increment(1);
            let _ = self.events.send(event);
        }
        Ok(())
    }
}

/// Rebuild owned-task sets from task owners and release orphaned claims.
fn reconcile(state: &mut CoordinatorState) -> Commit {
    let mut repair = Commit::default();

    let owners: HashMap<SessionId, Vec<TaskId>> =
        state
            .tasks
            .iter()
            .filter_map(|t| t.owner.clone().map(|o| (o, t.id.clone())))
            .fold(HashMap::new(), |mut acc, (owner, task)| {
                acc.entry(owner).or_default().push(task);
                acc
            });

    for session in state.sessions.iter_mut() {
        let rebuilt: BTreeSet<TaskId> = owners
            .get(&session.id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        if session.owned_tasks != rebuilt {
            session.owned_tasks = rebuilt;
            repair.put_session(session.clone());
        }
    }

    let orphaned: Vec<Task> = state
        .tasks
        .iter()
        .filter(|t| {
            t.status == TaskStatus::Claimed
                && t.owner.as_deref().is_none_or(|o| state.sessions.get(o).is_none())
        })
        .cloned()
        .collect();
    for mut task in orphaned {
        warn!(task_id = %task.id, owner = ?task.owner, "releasing claim held by missing session");
        task.owner = None;
        task.claimed_at = None;
        task.status = if state.tasks.dependencies_met(&task) {
            TaskStatus::Pending
        } else {
            TaskStatus::Blocked
        };
        repair.put_task(task);
    }
    repair
}

fn record_gauges(state: &CoordinatorState) {
    gauge!("coordinator_sessions_active").set(state.sessions.active().count() as f64);
    gauge!("coordinator_tasks_total").set(state.tasks.len() as f64);
}

/// Writes a caller can use to seed a store before [`Coordinator::load`].
pub fn seed_writes(sessions: &[Session], tasks: &[Task]) -> cadre_store::Result<Vec<KvWrite>> {
    let commit = Commit {
        tasks: tasks.to_vec(),
        sessions: sessions.to_vec(),
        ..Commit::default()
    };
    commit.to_writes()
}
