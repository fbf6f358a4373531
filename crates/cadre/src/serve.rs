//! `cadre serve`: wire the coordinator stack and run until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use cadre_advisory::AdvisoryBridge;
use cadre_coordinator::{Coordinator, LivenessMonitor};
use cadre_server::{CadreServer, MethodRegistry, RpcContext, ServerConfig, register_all};
use cadre_settings::CadreSettings;
use cadre_store::{ConnectionConfig, SqliteKvStore};
use tracing::{info, warn};

use crate::ensure_parent_dir;

/// Command-line values that take precedence over settings.
#[derive(Debug, Default)]
pub(crate) struct Overrides {
    pub(crate) host: Option<String>,
    pub(crate) port: Option<u16>,
    pub(crate) db_path: Option<PathBuf>,
}

impl Overrides {
    fn apply(self, settings: &mut CadreSettings) -> PathBuf {
        if let Some(host) = self.host {
            settings.server.host = host;
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        self.db_path.unwrap_or_else(|| settings.storage.db_path())
    }
}

pub(crate) async fn run(mut settings: CadreSettings, overrides: Overrides) -> Result<()> {
    let db_path = overrides.apply(&mut settings);
    ensure_parent_dir(&db_path)?;

    let store = SqliteKvStore::open(&db_path, &ConnectionConfig::default())
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
    info!(path = %db_path.display(), "state store opened");

    let advisory = AdvisoryBridge::from_settings(&settings.advisory);
    // State is fully reloaded before the listener accepts traffic.
    let coordinator = Arc::new(
        Coordinator::load(Arc::new(store), advisory, settings.liveness.clone())
            .context("Failed to load coordinator state")?,
    );

    let mut registry = MethodRegistry::new();
    register_all(&mut registry);
    let method_count = registry.methods().len();

    let mut server = CadreServer::new(
        ServerConfig::from(&settings.server),
        registry,
        RpcContext::new(Arc::clone(&coordinator)),
    );
    match cadre_server::metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(err) => warn!(error = %err, "metrics recorder unavailable, /metrics disabled"),
    }

    let shutdown = Arc::clone(server.shutdown());
    let monitor = LivenessMonitor::new(Arc::clone(&coordinator)).spawn(shutdown.token());

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    info!("cadre coordinator listening on http://{addr} ({method_count} methods registered)");

    shutdown.wait_for_signal().await;
    info!("shutting down");
    shutdown.graceful_shutdown(vec![handle, monitor], None).await;

    info!("shutdown complete");
    Ok(())
}
