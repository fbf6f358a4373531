//! Startup selection between remote and local mode.

use std::path::Path;
use std::time::Duration;

use cadre_settings::{CadreSettings, LivenessSettings};
use tracing::{info, warn};

use crate::client::CoordinatorClient;
use crate::errors::Result;
use crate::local::LocalFileCoordinatorClient;
use crate::remote::RemoteCoordinatorClient;

/// Pick a client using `settings.client` and `settings.storage`.
///
/// The server is probed once. Selection is not revisited per call.
pub async fn connect(settings: &CadreSettings) -> Result<Box<dyn CoordinatorClient>> {
    connect_with(
        &settings.client.server_url,
        Duration::from_millis(settings.client.probe_timeout_ms),
        &settings.storage.state_file(),
        settings.liveness.clone(),
    )
    .await
}

/// Probe `server_url`; fall back to the state file at `state_file` when the
/// server does not answer within `probe_timeout`.
pub async fn connect_with(
    server_url: &str,
    probe_timeout: Duration,
    state_file: &Path,
    liveness: LivenessSettings,
) -> Result<Box<dyn CoordinatorClient>> {
    let remote = RemoteCoordinatorClient::new(server_url);
    if remote.probe(probe_timeout).await {
        info!(server_url, "using remote coordinator");
        return Ok(Box::new(remote));
    }

    warn!(
        server_url,
        state_file = %state_file.display(),
        "coordinator server unreachable, using local state file"
    );
    let local = LocalFileCoordinatorClient::open(state_file, liveness).await?;
    Ok(Box::new(local))
}
