//! Periodic liveness sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::coordinator::Coordinator;

/// Runs [`Coordinator::sweep`] on a fixed interval until cancelled.
#[derive(Debug)]
pub struct LivenessMonitor {
    coordinator: Arc<Coordinator>,
    interval: Duration,
}

impl LivenessMonitor {
    /// Monitor using the coordinator's configured sweep interval.
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        let interval = coordinator.liveness().sweep_interval();
        Self::with_interval(coordinator, interval)
    }

    /// Monitor with an explicit interval (at least one millisecond).
    pub fn with_interval(coordinator: Arc<Coordinator>, interval: Duration) -> Self {
        Self {
            coordinator,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Sweep until `cancel` fires. Storage errors are logged and the next
    /// tick tries again.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so a fresh server
        // does not sweep before anyone could have heartbeated.
        let _ = ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.coordinator.sweep().await {
                        error!(error = %err, "liveness sweep failed");
                    }
                }
                () = cancel.cancelled() => {
                    debug!("liveness monitor stopped");
                    return;
                }
            }
        }
    }

    /// Run on the current runtime.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
