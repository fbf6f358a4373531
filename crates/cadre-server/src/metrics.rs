//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder.
///
/// Returns the handle used to render `/metrics`. Fails if a recorder is
/// already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// RPC requests total (counter, labels: method).
pub const RPC_REQUESTS_TOTAL: &str = "rpc_requests_total";
/// RPC errors total (counter, labels: method, error_type).
pub const RPC_ERRORS_TOTAL: &str = "rpc_errors_total";
/// RPC request duration seconds (histogram, labels: method).
pub const RPC_REQUEST_DURATION_SECONDS: &str = "rpc_request_duration_seconds";
/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// WebSocket connections refused at capacity (counter).
pub const WS_CONNECTIONS_REJECTED_TOTAL: &str = "ws_connections_rejected_total";
/// Observers dropped during fan-out (counter).
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
/// Events fanned out to observers (counter, labels: type).
pub const WS_EVENTS_BROADCAST_TOTAL: &str = "ws_events_broadcast_total";
