//! Liveness thresholds.
//!
//! These are the only place the heartbeat, stale and purge windows are
//! defined; the coordinator and the monitor both read them from here.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Heartbeat, reclamation and purge windows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LivenessSettings {
    /// Expected heartbeat period of a worker, in seconds.
    pub heartbeat_interval_secs: u64,
    /// Silence after which a session is marked stale and its work reclaimed.
    pub stale_threshold_secs: u64,
    /// Silence after which a stale or terminated session is purged.
    pub purge_after_secs: u64,
    /// How often the monitor sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for LivenessSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 30,
            stale_threshold_secs: 300,
            purge_after_secs: 3600,
            sweep_interval_secs: 15,
        }
    }
}

impl LivenessSettings {
    /// Stale threshold as a [`Duration`].
    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_threshold_secs)
    }

    /// Purge window as a [`Duration`].
    pub fn purge_after(&self) -> Duration {
        Duration::from_secs(self.purge_after_secs)
    }

    /// Sweep interval as a [`Duration`].
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_threshold_is_ten_heartbeats() {
        let l = LivenessSettings::default();
        assert_eq!(l.stale_threshold_secs, 10 * l.heartbeat_interval_secs);
        assert_eq!(l.stale_threshold(), Duration::from_secs(300));
        assert!(l.purge_after() > l.stale_threshold());
    }
}
