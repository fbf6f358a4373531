//! Graceful shutdown coordination via `CancellationToken`.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default timeout for graceful shutdown before abandoning tasks.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Coordinates graceful shutdown across the listener, event bridge and
/// liveness monitor.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// A clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve on Ctrl-C or when shutdown is initiated elsewhere.
    pub async fn wait_for_signal(&self) {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    warn!(error = %err, "failed to listen for ctrl-c");
                    self.token.cancelled().await;
                } else {
                    info!("ctrl-c received");
                }
            }
            () = self.token.cancelled() => {}
        }
    }

    /// Cancel the token, then wait up to `timeout` for `handles` to finish.
    pub async fn graceful_shutdown(&self, handles: Vec<JoinHandle<()>>, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);

        self.shutdown();
        info!(
            task_count = handles.len(),
            timeout_secs = timeout.as_secs(),
            "waiting for tasks to complete"
        );

        let drain = futures::future::join_all(handles);
        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!("shutdown timed out after {timeout:?}, some tasks may still be running");
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_sets_flag() {
        let coord = ShutdownCoordinator::new();
        assert!(!coord.is_shutting_down());
        coord.shutdown();
        assert!(coord.is_shutting_down());
        assert!(coord.token().is_cancelled());
    }

    #[tokio::test]
    async fn graceful_shutdown_waits_for_tasks() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        let handle = tokio::spawn(async move { token.cancelled().await });
        coord
            .graceful_shutdown(vec![handle], Some(Duration::from_secs(1)))
            .await;
        assert!(coord.is_shutting_down());
    }

    #[tokio::test(start_paused = true)]
    async fn graceful_shutdown_times_out() {
        let coord = ShutdownCoordinator::new();
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        coord
            .graceful_shutdown(vec![handle], Some(Duration::from_millis(50)))
            .await;
        assert!(coord.is_shutting_down());
    }

    #[tokio::test]
    async fn wait_for_signal_returns_on_shutdown() {
        let coord = std::sync::Arc::new(ShutdownCoordinator::new());
        let waiter = coord.clone();
        let handle = tokio::spawn(async move { waiter.wait_for_signal().await });
        coord.shutdown();
        handle.await.unwrap();
    }
}
