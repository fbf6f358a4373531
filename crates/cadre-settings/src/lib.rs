//! # cadre-settings
//!
//! Layered configuration for the cadre coordinator.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`CadreSettings::default()`]
//! 2. **User file**: `~/.cadre/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `CADRE_*` overrides (highest priority)
//!
//! The merged result is validated before it is returned.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, cadre_home, deep_merge, expand_home, load_settings,
    load_settings_from_path, settings_path, validate,
};
pub use types::*;

use std::sync::OnceLock;

static SETTINGS: OnceLock<CadreSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.cadre/settings.json` with env var
/// overrides. If loading fails, returns compiled defaults.
pub fn get_settings() -> &'static CadreSettings {
    SETTINGS.get_or_init(|| load_settings().unwrap_or_default())
}

/// Initialize the global settings with a specific value.
///
/// Returns the settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: CadreSettings) -> std::result::Result<(), CadreSettings> {
    SETTINGS.set(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_documented_values() {
        let s = CadreSettings::default();
        assert_eq!(s.server.host, "127.0.0.1");
        assert_eq!(s.server.port, 7420);
        assert_eq!(s.server.max_connections, 256);
        assert_eq!(s.liveness.heartbeat_interval_secs, 30);
        assert_eq!(s.liveness.purge_after_secs, 3600);
        assert_eq!(s.advisory.timeout_ms, 2000);
        assert_eq!(s.client.probe_timeout_ms, 500);
        assert_eq!(s.logging.level, "info");
        assert!(s.storage.db_path().ends_with(".cadre/cadre.db"));
    }
}
