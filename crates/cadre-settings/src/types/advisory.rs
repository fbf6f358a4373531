//! Advisory service settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// External advisory service connection and policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdvisorySettings {
    /// Consult the advisory service at all.
    pub enabled: bool,
    /// Base URL of the advisory service.
    pub base_url: String,
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
    /// Recommendations at or below this confidence are ignored.
    pub confidence_threshold: f64,
}

impl Default for AdvisorySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://127.0.0.1:8790".to_string(),
            timeout_ms: 2000,
            confidence_threshold: 0.8,
        }
    }
}

impl AdvisorySettings {
    /// Per-call timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
