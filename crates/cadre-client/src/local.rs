//! Embedded coordinator over a JSON state file.
//!
//! Used when no server is reachable. Several worker processes may share one
//! state file, so every operation holds the file's [`StateFileLock`], loads
//! the current state from disk, runs, persists and then releases. Claims stay
//! exclusive across processes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cadre_advisory::AdvisoryBridge;
use cadre_coordinator::Coordinator;
use cadre_core::types::{AssignResponse, RegisterRequest, RegisterResponse, StatusSnapshot, SyncRequest, Task};
use cadre_settings::LivenessSettings;
use cadre_store::JsonFileKvStore;
use serde_json::Value;
use tracing::{debug, info};

use crate::client::{ClientMode, CoordinatorClient};
use crate::errors::Result;
use crate::lock::{LOCK_WAIT, StateFileLock};

/// [`CoordinatorClient`] backed by an in-process coordinator.
#[derive(Debug)]
pub struct LocalFileCoordinatorClient {
    path: PathBuf,
    liveness: LivenessSettings,
    lock_wait: Duration,
}

impl LocalFileCoordinatorClient {
    /// Open (or create) the state file and check that it loads.
    ///
    /// A liveness sweep runs once on open so work held by long-silent
    /// sessions is reclaimed even without a server's monitor.
    pub async fn open(path: impl AsRef<Path>, liveness: LivenessSettings) -> Result<Self> {
        let client = Self {
            path: path.as_ref().to_path_buf(),
            liveness,
            lock_wait: LOCK_WAIT,
        };
        let (_lock, coordinator) = client.load().await?;
        let report = coordinator.sweep().await?;
        if !report.is_empty() {
            info!(
                stale = report.stale.len(),
                reclaimed = report.reclaimed.len(),
                purged = report.purged.len(),
                "local state swept on open"
            );
        }
        debug!(path = %client.path.display(), "local coordinator ready");
        Ok(client)
    }

    /// Location of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the lock and load the state as it is on disk now. The
    /// coordinator must not outlive the returned lock.
    async fn load(&self) -> Result<(StateFileLock, Coordinator)> {
        let lock = StateFileLock::acquire(&self.path, self.lock_wait).await?;
        let store = Arc::new(JsonFileKvStore::open(&self.path)?);
        let coordinator = Coordinator::load(store, AdvisoryBridge::disabled(), self.liveness.clone())?;
        Ok((lock, coordinator))
    }
}

#[async_trait]
impl CoordinatorClient for LocalFileCoordinatorClient {
    fn mode(&self) -> ClientMode {
        ClientMode::Local
    }

    async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse> {
        let (_lock, coordinator) = self.load().await?;
        Ok(coordinator.register_session(req).await?)
    }

    async fn heartbeat(&self, session_id: &str) -> Result<bool> {
        let (_lock, coordinator) = self.load().await?;
        Ok(coordinator.heartbeat(session_id).await?)
    }

    async fn deregister(&self, session_id: &str) -> Result<bool> {
        let (_lock, coordinator) = self.load().await?;
        Ok(coordinator.deregister_session(session_id).await?)
    }

    async fn claim(&self, session_id: &str, task_id: &str) -> Result<bool> {
        let (_lock, coordinator) = self.load().await?;
        Ok(coordinator.claim_task(session_id, task_id).await?)
    }

    async fn complete(&self, session_id: &str, task_id: &str, result: Value) -> Result<bool> {
        let (_lock, coordinator) = self.load().await?;
        Ok(coordinator.complete_task(session_id, task_id, result).await?)
    }

    async fn assign(&self, task_id: &str) -> Result<AssignResponse> {
        let (_lock, coordinator) = self.load().await?;
        Ok(coordinator.assign_task(task_id).await?)
    }

    async fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        let (_lock, coordinator) = self.load().await?;
        Ok(coordinator.get_task(task_id).await)
    }

    async fn status(&self) -> Result<StatusSnapshot> {
        let (_lock, coordinator) = self.load().await?;
        Ok(coordinator.status().await)
    }

    async fn sync(&self, req: SyncRequest) -> Result<()> {
        let (_lock, coordinator) = self.load().await?;
        let _ = coordinator.sync_state(req).await?;
        Ok(())
    }
}
