//! Forwards committed coordinator events to the [`BroadcastManager`].

use std::sync::Arc;

use cadre_core::types::CoordinatorEvent;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::broadcast::BroadcastManager;

/// Bridges the coordinator's event channel to connected observers.
pub struct EventBridge {
    rx: broadcast::Receiver<CoordinatorEvent>,
    broadcast: Arc<BroadcastManager>,
}

impl EventBridge {
    /// Create a new event bridge.
    pub fn new(rx: broadcast::Receiver<CoordinatorEvent>, broadcast: Arc<BroadcastManager>) -> Self {
        Self { rx, broadcast }
    }

    /// Run until the sender is dropped or `cancel` fires.
    #[tracing::instrument(skip_all, name = "event_bridge")]
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            let received = tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("event bridge cancelled");
                    break;
                }
                received = self.rx.recv() => received,
            };
            match received {
                Ok(event) => {
                    let _ = self.broadcast.broadcast_all(&event).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "event bridge lagged, events skipped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("event bridge: sender closed, exiting");
                    break;
                }
            }
        }
    }
}
