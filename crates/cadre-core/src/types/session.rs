//! Worker session records.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{SessionId, TaskId};

/// Declared capacity and skills of a worker session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Maximum number of tasks this session may own at once (at least 1).
    pub max_concurrent_tasks: u32,
    /// Free-form specialization tags.
    #[serde(default)]
    pub specializations: BTreeSet<String>,
}

impl Capabilities {
    /// Capabilities with the given capacity and no specializations.
    pub fn with_capacity(max_concurrent_tasks: u32) -> Self {
        Self {
            max_concurrent_tasks,
            specializations: BTreeSet::new(),
        }
    }
}

/// Session lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Heartbeating within the stale threshold.
    Active,
    /// Missed the stale threshold; owned work has been reclaimed.
    Stale,
    /// Explicitly deregistered; awaiting purge.
    Terminated,
}

impl SessionStatus {
    /// Lowercase name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Stale => "stale",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered worker identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Caller-chosen identity.
    pub id: SessionId,
    /// Declared kind or model tag.
    pub kind: String,
    /// Capacity and specializations.
    pub capabilities: Capabilities,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Time of the last heartbeat or registration.
    pub last_heartbeat: DateTime<Utc>,
    /// Time the session was first registered.
    pub registered_at: DateTime<Utc>,
    /// Tasks currently owned by this session.
    #[serde(default)]
    pub owned_tasks: BTreeSet<TaskId>,
}

impl Session {
    /// Create a fresh active session.
    pub fn new(
        id: SessionId,
        kind: impl Into<String>,
        capabilities: Capabilities,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind: kind.into(),
            capabilities,
            status: SessionStatus::Active,
            last_heartbeat: now,
            registered_at: now,
            owned_tasks: BTreeSet::new(),
        }
    }

    /// Whether the session is active.
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Number of additional tasks this session may claim.
    pub fn spare_capacity(&self) -> usize {
        (self.capabilities.max_concurrent_tasks as usize).saturating_sub(self.owned_tasks.len())
    }

    /// Whether the session may claim at least one more task.
    pub fn has_spare_capacity(&self) -> bool {
        self.spare_capacity() > 0
    }

    /// Whether the session is active and has room for another task.
    pub fn can_claim(&self) -> bool {
        self.is_active() && self.has_spare_capacity()
    }
}
