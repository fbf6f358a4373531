//! Server configuration.

use std::time::Duration;

use cadre_settings::ServerSettings;

/// Runtime configuration for [`crate::server::CadreServer`].
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket observers.
    pub max_connections: usize,
    /// Interval between server pings.
    pub ping_interval: Duration,
    /// Observers silent for longer than this are disconnected.
    pub pong_timeout: Duration,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            ..Self::from(&ServerSettings::default())
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            max_connections: settings.max_connections,
            ping_interval: Duration::from_secs(settings.ping_interval_secs.max(1)),
            pong_timeout: Duration::from_secs(settings.pong_timeout_secs.max(1)),
            max_message_size: settings.max_message_size,
        }
    }
}

impl ServerConfig {
    /// `host:port` bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
