//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so partial JSON
//! files deserialize with missing fields taking their default value.

mod advisory;
mod liveness;
mod server;
mod storage;

pub use advisory::*;
pub use liveness::*;
pub use server::*;
pub use storage::*;

use serde::{Deserialize, Serialize};

/// Root settings type for the cadre coordinator and its clients.
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "liveness": { "staleThresholdSecs": 120 },
///   "advisory": { "enabled": true, "baseUrl": "http://127.0.0.1:8790" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CadreSettings {
    /// HTTP and WebSocket listener.
    pub server: ServerSettings,
    /// Heartbeat, reclamation and purge thresholds.
    pub liveness: LivenessSettings,
    /// External advisory service.
    pub advisory: AdvisorySettings,
    /// Durable storage locations.
    pub storage: StorageSettings,
    /// Log level and format.
    pub logging: LoggingSettings,
    /// Client-side connection behavior.
    pub client: ClientSettings,
}
