//! Server listener, client connection, and logging settings.

use serde::{Deserialize, Serialize};

/// HTTP and WebSocket listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port. `0` picks an ephemeral port.
    pub port: u16,
    /// Maximum concurrent observer connections.
    pub max_connections: usize,
    /// Interval between WebSocket pings, in seconds.
    pub ping_interval_secs: u64,
    /// Observer is dropped when no pong arrives within this window, in seconds.
    pub pong_timeout_secs: u64,
    /// Maximum inbound WebSocket message size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7420,
            max_connections: 256,
            ping_interval_secs: 30,
            pong_timeout_secs: 60,
            max_message_size: 1024 * 1024,
        }
    }
}

/// Settings used by the CLI when it acts as a coordinator client.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Base URL of the coordinator server.
    pub server_url: String,
    /// Reachability probe timeout in milliseconds.
    pub probe_timeout_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:7420".to_string(),
            probe_timeout_ms: 500,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit one JSON object per line instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
