//! Shared context passed to every method handler.

use std::sync::Arc;

use cadre_coordinator::Coordinator;

/// Dependencies available to handlers.
#[derive(Clone, Debug)]
pub struct RpcContext {
    /// The authoritative coordinator.
    pub coordinator: Arc<Coordinator>,
}

impl RpcContext {
    /// Wrap a coordinator.
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}
