//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Current WebSocket observer count.
    pub connections: usize,
    /// Number of active worker sessions.
    pub active_sessions: usize,
    /// Server version.
    pub version: &'static str,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize, active_sessions: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        active_sessions,
        version: cadre_core::constants::VERSION,
    }
}
