//! End-to-end coordinator behavior against real stores.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use cadre_advisory::{Advisor, AdvisoryBridge, AdvisoryError};
use cadre_core::TaskId;
use cadre_core::types::{
    AssignmentRecommendation, Capabilities, CandidateSession, ConflictResolution, EventType,
    RegisterRequest, SessionStatus, SyncRequest, Task, TaskClassification, TaskPriority, TaskSpec,
    TaskStatus,
};
use cadre_coordinator::{Coordinator, CoordinatorError};
use cadre_settings::LivenessSettings;
use cadre_store::{KvStore, KvWrite, MemoryKvStore, SqliteKvStore, StoreError};
use chrono::Utc;
use serde_json::{Value, json};

fn coordinator(store: Arc<dyn KvStore>) -> Arc<Coordinator> {
    Arc::new(Coordinator::load(store, AdvisoryBridge::disabled(), LivenessSettings::default()).unwrap())
}

fn register(id: &str, capacity: u32) -> RegisterRequest {
    RegisterRequest {
        session_id: id.into(),
        kind: "claude".into(),
        capabilities: Capabilities::with_capacity(capacity),
    }
}

fn task(id: &str, priority: TaskPriority, deps: &[&str]) -> TaskSpec {
    TaskSpec::new(id, format!("task {id}"), priority, deps.iter().map(|d| TaskId::from(*d)))
}

fn sync(tasks: Vec<TaskSpec>) -> SyncRequest {
    SyncRequest {
        sessions: vec![],
        tasks,
    }
}

async fn status_of(coord: &Coordinator, id: &str) -> TaskStatus {
    coord.get_task(id).await.unwrap().status
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn two_sessions_share_a_dependency_chain() {
    let coord = coordinator(Arc::new(MemoryKvStore::new()));
    let _ = coord.register_session(register("A", 2)).await.unwrap();
    let _ = coord.register_session(register("B", 1)).await.unwrap();
    let _ = coord
        .sync_state(sync(vec![
            task("t1", TaskPriority::High, &[]),
            task("t2", TaskPriority::Medium, &["t1"]),
        ]))
        .await
        .unwrap();

    assert_eq!(status_of(&coord, "t2").await, TaskStatus::Blocked);
    assert!(!coord.claim_task("A", "t2").await.unwrap());

    assert!(coord.claim_task("A", "t1").await.unwrap());
    assert_eq!(status_of(&coord, "t1").await, TaskStatus::Claimed);
    assert!(!coord.claim_task("B", "t1").await.unwrap());

    assert!(coord.complete_task("A", "t1", json!({"files": 3})).await.unwrap());
    assert_eq!(status_of(&coord, "t2").await, TaskStatus::Pending);
    assert!(coord.claim_task("B", "t2").await.unwrap());

    let status = coord.status().await;
    assert_eq!(status.active_sessions, 2);
    assert_eq!(status.task_stats.completed, 1);
    assert_eq!(status.task_stats.claimed, 1);
    assert!(status.last_sync.is_some());
}

// ─────────────────────────────────────────────────────────────────────────────
// Concurrency
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_have_exactly_one_winner() {
    let coord = coordinator(Arc::new(MemoryKvStore::new()));
    let sessions: Vec<String> = (0..16).map(|i| format!("s{i:02}")).collect();
    for id in &sessions {
        let _ = coord.register_session(register(id, 1)).await.unwrap();
    }
    let _ = coord
        .sync_state(sync(vec![task("hot", TaskPriority::Critical, &[])]))
        .await
        .unwrap();

    let handles: Vec<_> = sessions
        .iter()
        .cloned()
        .map(|id| {
            let coord = coord.clone();
            tokio::spawn(async move { (coord.claim_task(&id, "hot").await.unwrap(), id) })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        let (won, id) = handle.await.unwrap();
        if won {
            winners.push(id);
        }
    }
    assert_eq!(winners.len(), 1);
    let hot = coord.get_task("hot").await.unwrap();
    assert_eq!(hot.owner.as_deref(), Some(winners[0].as_str()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_respect_capacity() {
    let coord = coordinator(Arc::new(MemoryKvStore::new()));
    let _ = coord.register_session(register("solo", 3)).await.unwrap();
    let specs = (0..20).map(|i| task(&format!("t{i:02}"), TaskPriority::Low, &[])).collect();
    let _ = coord.sync_state(sync(specs)).await.unwrap();

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let coord = coord.clone();
            tokio::spawn(async move { coord.claim_task("solo", &format!("t{i:02}")).await.unwrap() })
        })
        .collect();
    let mut claimed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            claimed += 1;
        }
    }
    assert_eq!(claimed, 3);
    assert_eq!(coord.get_session("solo").await.unwrap().owned_tasks.len(), 3);
}

// ─────────────────────────────────────────────────────────────────────────────
// Liveness
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reclaimed_work_is_visible_in_status_and_lost_by_original_owner() {
    let coord = coordinator(Arc::new(MemoryKvStore::new()));
    let mut events = coord.subscribe();
    let _ = coord.register_session(register("A", 1)).await.unwrap();
    let _ = coord.register_session(register("B", 1)).await.unwrap();
    let _ = coord
        .sync_state(sync(vec![task("t1", TaskPriority::High, &[])]))
        .await
        .unwrap();
    assert!(coord.claim_task("A", "t1").await.unwrap());

    let later = Utc::now() + chrono::Duration::seconds(301);
    let report = coord.sweep_at(later).await.unwrap();
    assert_eq!(report.reclaimed, vec![TaskId::from("t1")]);
    assert_eq!(report.stale.len(), 2);

    let snapshot = coord.status().await;
    let t1 = snapshot.task("t1").unwrap();
    assert_eq!(t1.status, TaskStatus::Pending);
    assert!(t1.owner.is_none());

    assert!(!coord.complete_task("A", "t1", Value::Null).await.unwrap());
    assert_eq!(status_of(&coord, "t1").await, TaskStatus::Pending);

    // Reviving B lets it pick the task up.
    assert!(coord.heartbeat("B").await.unwrap());
    assert!(coord.claim_task("B", "t1").await.unwrap());

    let mut saw_reclaim = false;
    while let Ok(event) = events.try_recv() {
        if event.event_type == EventType::TaskReclaimed {
            assert_eq!(event.payload["previousOwner"], "A");
            saw_reclaim = true;
        }
    }
    assert!(saw_reclaim);
}

#[tokio::test]
async fn silent_sessions_are_purged_from_storage() {
    let store = Arc::new(MemoryKvStore::new());
    let coord = coordinator(store.clone());
    let _ = coord.register_session(register("A", 1)).await.unwrap();
    assert!(store.get("session:A").unwrap().is_some());

    let report = coord
        .sweep_at(Utc::now() + chrono::Duration::seconds(3601))
        .await
        .unwrap();
    assert_eq!(report.purged.len(), 1);
    assert!(coord.get_session("A").await.is_none());
    assert!(store.get("session:A").unwrap().is_none());
}

#[tokio::test]
async fn deregister_returns_work_to_the_pool() {
    let coord = coordinator(Arc::new(MemoryKvStore::new()));
    let _ = coord.register_session(register("A", 2)).await.unwrap();
    let _ = coord
        .sync_state(sync(vec![task("t1", TaskPriority::High, &[])]))
        .await
        .unwrap();
    assert!(coord.claim_task("A", "t1").await.unwrap());

    assert!(coord.deregister_session("A").await.unwrap());
    assert_eq!(status_of(&coord, "t1").await, TaskStatus::Pending);
    assert_eq!(coord.get_session("A").await.unwrap().status, SessionStatus::Terminated);
    assert!(!coord.claim_task("A", "t1").await.unwrap());
    assert!(!coord.heartbeat("A").await.unwrap());

    // Registering again brings the session back.
    let resp = coord.register_session(register("A", 2)).await.unwrap();
    assert!(resp.session.is_active());
    assert_eq!(resp.available_tasks.len(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Sync
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sync_round_trips_through_status() {
    let coord = coordinator(Arc::new(MemoryKvStore::new()));
    let req = SyncRequest {
        sessions: vec![cadre_core::types::SessionSpec {
            id: "A".into(),
            kind: "gpt".into(),
            capabilities: Capabilities::with_capacity(2),
        }],
        tasks: vec![
            task("t1", TaskPriority::High, &[]),
            task("t2", TaskPriority::Low, &["t1"]),
        ],
    };
    let first = coord.sync_state(req.clone()).await.unwrap();
    let second = coord.sync_state(req).await.unwrap();

    assert_eq!(first.tasks, second.tasks);
    assert_eq!(first.sessions, second.sessions);
    assert_eq!(second.task_stats.total, 2);
    assert_eq!(second.session("A").unwrap().kind, "gpt");
}

#[tokio::test]
async fn cyclic_sync_is_rejected_without_change() {
    let store = Arc::new(MemoryKvStore::new());
    let coord = coordinator(store.clone());
    let err = coord
        .sync_state(sync(vec![
            task("a", TaskPriority::Low, &["c"]),
            task("b", TaskPriority::Low, &["a"]),
            task("c", TaskPriority::Low, &["b"]),
        ]))
        .await
        .unwrap_err();
    assert_matches!(err, CoordinatorError::Validation(_));
    assert_eq!(coord.status().await.task_stats.total, 0);
    assert!(store.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Storage
// ─────────────────────────────────────────────────────────────────────────────

/// Store that fails every write while `failing` is set.
struct FlakyStore {
    inner: MemoryKvStore,
    failing: AtomicBool,
}

impl KvStore for FlakyStore {
    fn get(&self, key: &str) -> cadre_store::Result<Option<Value>> {
        self.inner.get(key)
    }

    fn list_prefix(&self, prefix: &str) -> cadre_store::Result<Vec<(String, Value)>> {
        self.inner.list_prefix(prefix)
    }

    fn delete(&self, key: &str) -> cadre_store::Result<bool> {
        self.inner.delete(key)
    }

    fn write_batch(&self, writes: Vec<KvWrite>) -> cadre_store::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk full".into()));
        }
        self.inner.write_batch(writes)
    }
}

#[tokio::test]
async fn storage_failure_fails_the_request_and_keeps_state() {
    let store = Arc::new(FlakyStore {
        inner: MemoryKvStore::new(),
        failing: AtomicBool::new(false),
    });
    let coord = coordinator(store.clone());
    let _ = coord.register_session(register("A", 1)).await.unwrap();
    let _ = coord
        .sync_state(sync(vec![task("t1", TaskPriority::High, &[])]))
        .await
        .unwrap();
    let mut events = coord.subscribe();

    store.failing.store(true, Ordering::SeqCst);
    let err = coord.claim_task("A", "t1").await.unwrap_err();
    assert_matches!(err, CoordinatorError::Storage(_));
    assert_eq!(status_of(&coord, "t1").await, TaskStatus::Pending);
    assert!(coord.get_session("A").await.unwrap().owned_tasks.is_empty());
    assert!(events.try_recv().is_err());

    store.failing.store(false, Ordering::SeqCst);
    assert!(coord.claim_task("A", "t1").await.unwrap());
}

#[tokio::test]
async fn state_survives_restart_on_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cadre.db");
    {
        let store = Arc::new(SqliteKvStore::open(&path, &Default::default()).unwrap());
        let coord = coordinator(store);
        let _ = coord.register_session(register("A", 2)).await.unwrap();
        let _ = coord
            .sync_state(sync(vec![
                task("t1", TaskPriority::High, &[]),
                task("t2", TaskPriority::Low, &["t1"]),
            ]))
            .await
            .unwrap();
        assert!(coord.claim_task("A", "t1").await.unwrap());
    }

    let store = Arc::new(SqliteKvStore::open(&path, &Default::default()).unwrap());
    let coord = coordinator(store);
    let t1 = coord.get_task("t1").await.unwrap();
    assert_eq!(t1.status, TaskStatus::Claimed);
    assert_eq!(t1.owner.as_deref(), Some("A"));
    assert!(coord.get_session("A").await.unwrap().owned_tasks.contains("t1"));
    assert!(coord.status().await.last_sync.is_some());

    assert!(coord.complete_task("A", "t1", json!("done")).await.unwrap());
    assert_eq!(status_of(&coord, "t2").await, TaskStatus::Pending);
}

// ─────────────────────────────────────────────────────────────────────────────
// Advisory
// ─────────────────────────────────────────────────────────────────────────────

struct FixedAdvisor {
    recommend: Option<(String, f64)>,
    tie_pick: Option<String>,
    delay: Duration,
}

#[async_trait]
impl Advisor for FixedAdvisor {
    async fn classify(&self, _task: &Task) -> cadre_advisory::Result<TaskClassification> {
        tokio::time::sleep(self.delay).await;
        Ok(TaskClassification {
            complexity: "low".into(),
            task_type: "docs".into(),
            urgency: "normal".into(),
            estimated_effort: json!("1h"),
            reasoning: String::new(),
        })
    }

    async fn recommend_assignment(
        &self,
        _task: &Task,
        _candidates: &[CandidateSession],
    ) -> cadre_advisory::Result<AssignmentRecommendation> {
        tokio::time::sleep(self.delay).await;
        let (session, confidence) = self.recommend.clone().ok_or(AdvisoryError::Disabled)?;
        Ok(AssignmentRecommendation {
            recommended_session: session.into(),
            confidence,
            alternatives: vec![],
            reasoning: String::new(),
        })
    }

    async fn resolve_conflict(
        &self,
        _conflict_type: &str,
        _task: &Task,
        _competing: &[CandidateSession],
        _context: Value,
    ) -> cadre_advisory::Result<ConflictResolution> {
        Ok(ConflictResolution {
            resolution: "pick".into(),
            assign_to: self.tie_pick.clone().map(Into::into),
            compensation_actions: vec![],
            reasoning: String::new(),
        })
    }
}

fn advised(advisor: FixedAdvisor) -> Arc<Coordinator> {
    let bridge = AdvisoryBridge::new(Arc::new(advisor), Duration::from_millis(200), 0.8);
    Arc::new(
        Coordinator::load(Arc::new(MemoryKvStore::new()), bridge, LivenessSettings::default())
            .unwrap(),
    )
}

async fn seed_three(coord: &Coordinator) {
    for id in ["a", "b", "c"] {
        let _ = coord.register_session(register(id, 2)).await.unwrap();
    }
    let _ = coord
        .sync_state(sync(vec![task("t1", TaskPriority::High, &[])]))
        .await
        .unwrap();
}

#[tokio::test]
async fn confident_recommendation_is_applied() {
    let coord = advised(FixedAdvisor {
        recommend: Some(("c".into(), 0.95)),
        tie_pick: None,
        delay: Duration::ZERO,
    });
    seed_three(&coord).await;
    let resp = coord.assign_task("t1").await.unwrap();
    assert_eq!(resp.session_id.as_deref(), Some("c"));
    assert_eq!(coord.get_task("t1").await.unwrap().owner.as_deref(), Some("c"));
}

#[tokio::test]
async fn low_confidence_falls_back_to_tie_break() {
    let coord = advised(FixedAdvisor {
        recommend: Some(("c".into(), 0.5)),
        tie_pick: Some("b".into()),
        delay: Duration::ZERO,
    });
    seed_three(&coord).await;
    let resp = coord.assign_task("t1").await.unwrap();
    assert_eq!(resp.session_id.as_deref(), Some("b"));
}

#[tokio::test]
async fn unknown_recommendation_falls_back_to_deterministic_pick() {
    let coord = advised(FixedAdvisor {
        recommend: Some(("ghost".into(), 0.99)),
        tie_pick: Some("ghost".into()),
        delay: Duration::ZERO,
    });
    seed_three(&coord).await;
    let resp = coord.assign_task("t1").await.unwrap();
    assert_eq!(resp.session_id.as_deref(), Some("a"));
}

#[tokio::test(start_paused = true)]
async fn slow_advisor_times_out_and_claims_still_work() {
    let coord = advised(FixedAdvisor {
        recommend: Some(("c".into(), 0.99)),
        tie_pick: None,
        delay: Duration::from_secs(30),
    });
    seed_three(&coord).await;
    assert!(coord.get_task("t1").await.unwrap().classification.is_none());

    let resp = coord.assign_task("t1").await.unwrap();
    assert_eq!(resp.session_id.as_deref(), Some("a"));
}

#[tokio::test]
async fn new_tasks_are_classified_on_sync() {
    let coord = advised(FixedAdvisor {
        recommend: None,
        tie_pick: None,
        delay: Duration::ZERO,
    });
    seed_three(&coord).await;
    let t1 = coord.get_task("t1").await.unwrap();
    assert_eq!(t1.classification.unwrap().task_type, "docs");
}

// ─────────────────────────────────────────────────────────────────────────────
// Invariants
// ─────────────────────────────────────────────────────────────────────────────

mod invariants {
    use super::*;
    use proptest::prelude::*;

    #[derive(Clone, Debug)]
    enum Op {
        Claim(usize, usize),
        Complete(usize, usize),
        Heartbeat(usize),
        Deregister(usize),
        Register(usize),
        Sweep(i64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0..4usize, 0..8usize).prop_map(|(s, t)| Op::Claim(s, t)),
            3 => (0..4usize, 0..8usize).prop_map(|(s, t)| Op::Complete(s, t)),
            1 => (0..4usize).prop_map(Op::Heartbeat),
            1 => (0..4usize).prop_map(Op::Deregister),
            1 => (0..4usize).prop_map(Op::Register),
            1 => (0..4000i64).prop_map(Op::Sweep),
        ]
    }

    async fn check(coord: &Coordinator) {
        let snapshot = coord.status().await;
        for id in ["s0", "s1", "s2", "s3"] {
            if let Some(session) = coord.get_session(id).await {
                assert!(session.owned_tasks.len() <= session.capabilities.max_concurrent_tasks as usize);
                for owned in &session.owned_tasks {
                    let task = snapshot.task(owned).unwrap();
                    assert_eq!(task.owner.as_deref(), Some(id));
                }
            }
        }
        for task in &snapshot.tasks {
            assert_eq!(task.status == TaskStatus::Claimed, task.owner.is_some());
            if matches!(task.status, TaskStatus::Pending | TaskStatus::Claimed) {
                for dep in &task.dependencies {
                    assert_eq!(snapshot.task(dep).unwrap().status, TaskStatus::Completed);
                }
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn random_operations_keep_invariants(ops in prop::collection::vec(op(), 1..60)) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let coord = coordinator(Arc::new(MemoryKvStore::new()));
                for s in 0..4u32 {
                    let _ = coord.register_session(register(&format!("s{s}"), s % 2 + 1)).await.unwrap();
                }
                let specs = (0..8)
                    .map(|i| {
                        let deps: Vec<String> = if i >= 2 { vec![format!("t{}", i / 2 - 1)] } else { vec![] };
                        let deps: Vec<&str> = deps.iter().map(String::as_str).collect();
                        task(&format!("t{i}"), TaskPriority::Medium, &deps)
                    })
                    .collect();
                let _ = coord.sync_state(sync(specs)).await.unwrap();

                let start = Utc::now();
                for op in ops {
                    match op {
                        Op::Claim(s, t) => { let _ = coord.claim_task(&format!("s{s}"), &format!("t{t}")).await.unwrap(); }
                        Op::Complete(s, t) => { let _ = coord.complete_task(&format!("s{s}"), &format!("t{t}"), Value::Null).await.unwrap(); }
                        Op::Heartbeat(s) => { let _ = coord.heartbeat(&format!("s{s}")).await.unwrap(); }
                        Op::Deregister(s) => { let _ = coord.deregister_session(&format!("s{s}")).await.unwrap(); }
                        Op::Register(s) => {
                            let _ = coord.register_session(register(&format!("s{s}"), 2)).await;
                        }
                        Op::Sweep(secs) => { let _ = coord.sweep_at(start + chrono::Duration::seconds(secs)).await.unwrap(); }
                    }
                    check(&coord).await;
                }
            });
        }
    }
}
