//! The contract shared by both client modes.

use std::fmt;

use async_trait::async_trait;
use cadre_core::types::{AssignResponse, RegisterRequest, RegisterResponse, StatusSnapshot, SyncRequest, Task};
use serde_json::Value;

use crate::errors::Result;

/// Which backend a client talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientMode {
    /// A running coordinator server over HTTP.
    Remote,
    /// An embedded coordinator over the local state file.
    Local,
}

impl fmt::Display for ClientMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Remote => "remote",
            Self::Local => "local",
        })
    }
}

/// Boundary operations available to workers.
///
/// `false` from claim, complete, heartbeat or deregister is a contention
/// outcome, not an error.
#[async_trait]
pub trait CoordinatorClient: Send + Sync {
    /// Which backend this client uses.
    fn mode(&self) -> ClientMode;

    /// Register or re-register a session.
    async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse>;

    /// Refresh a session's heartbeat.
    async fn heartbeat(&self, session_id: &str) -> Result<bool>;

    /// Terminate a session and release its tasks.
    async fn deregister(&self, session_id: &str) -> Result<bool>;

    /// Claim a pending task.
    async fn claim(&self, session_id: &str, task_id: &str) -> Result<bool>;

    /// Complete an owned task.
    async fn complete(&self, session_id: &str, task_id: &str, result: Value) -> Result<bool>;

    /// Let the coordinator pick a session for a task.
    async fn assign(&self, task_id: &str) -> Result<AssignResponse>;

    /// Fetch one task, `None` if unknown.
    async fn get_task(&self, task_id: &str) -> Result<Option<Task>>;

    /// Current status snapshot.
    async fn status(&self) -> Result<StatusSnapshot>;

    /// Upsert sessions and tasks.
    async fn sync(&self, req: SyncRequest) -> Result<()>;
}
