//! # cadre-core
//!
//! Shared vocabulary for the cadre task coordination service.
//!
//! - **Branded IDs**: `SessionId`, `TaskId`, `ConnectionId` newtypes
//! - **Records**: `Session` and `Task` with their status enums
//! - **Events**: `CoordinatorEvent` pushed to observers after each commit
//! - **Wire types**: request/response bodies shared by the server and clients
//! - **Advisory contract**: classification, recommendation, and conflict types
//! - **Logging**: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod constants;
pub mod ids;
pub mod logging;
pub mod types;

pub use ids::{ConnectionId, SessionId, TaskId};
