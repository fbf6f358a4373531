//! # cadre-coordinator
//!
//! The authoritative state of a cadre deployment: sessions, tasks, claims,
//! and the dependency graph between tasks.
//!
//! - [`transitions`]: pure functions from state and request to a [`Commit`]
//! - [`Coordinator`]: serializes transitions, persists each commit through a
//!   [`cadre_store::KvStore`], then broadcasts its events
//! - [`LivenessMonitor`]: periodic stale detection, reclamation and purge

#![deny(unsafe_code)]

pub mod commit;
pub mod coordinator;
pub mod errors;
pub mod graph;
pub mod liveness;
pub mod state;
pub mod transitions;

pub use commit::Commit;
pub use coordinator::{Coordinator, seed_writes};
pub use errors::{CoordinatorError, Result};
pub use liveness::LivenessMonitor;
pub use state::{CoordinatorState, SessionRegistry, TaskStore};
pub use transitions::SweepReport;
