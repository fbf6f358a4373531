//! Settings loading with deep merge, environment overrides, and validation.
//!
//! Loading flow:
//! 1. Start with compiled [`CadreSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply `CADRE_*` environment overrides (highest priority)
//! 4. Validate cross-field constraints
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::CadreSettings;

/// `$HOME/.cadre`.
pub fn cadre_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".cadre")
}

/// Resolve the path to the settings file (`~/.cadre/settings.json`).
pub fn settings_path() -> PathBuf {
    cadre_home().join("settings.json")
}

/// Expand a leading `~/` to `$HOME/`.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(rest)
        }
        None => PathBuf::from(path),
    }
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<CadreSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or a failed validation is an
/// error.
pub fn load_settings_from_path(path: &Path) -> Result<CadreSettings> {
    let defaults = serde_json::to_value(CadreSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: CadreSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Check cross-field constraints.
pub fn validate(settings: &CadreSettings) -> Result<()> {
    let l = &settings.liveness;
    if l.heartbeat_interval_secs == 0 {
        return Err(SettingsError::invalid("liveness.heartbeatIntervalSecs", "must be positive"));
    }
    if l.sweep_interval_secs == 0 {
        return Err(SettingsError::invalid("liveness.sweepIntervalSecs", "must be positive"));
    }
    if l.stale_threshold_secs <= l.heartbeat_interval_secs {
        return Err(SettingsError::invalid(
            "liveness.staleThresholdSecs",
            format!(
                "{} must exceed heartbeatIntervalSecs ({})",
                l.stale_threshold_secs, l.heartbeat_interval_secs
            ),
        ));
    }
    if l.purge_after_secs <= l.stale_threshold_secs {
        return Err(SettingsError::invalid(
            "liveness.purgeAfterSecs",
            format!(
                "{} must exceed staleThresholdSecs ({})",
                l.purge_after_secs, l.stale_threshold_secs
            ),
        ));
    }
    let threshold = settings.advisory.confidence_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(SettingsError::invalid(
            "advisory.confidenceThreshold",
            format!("{threshold} is outside [0, 1]"),
        ));
    }
    if settings.advisory.timeout_ms == 0 {
        return Err(SettingsError::invalid("advisory.timeoutMs", "must be positive"));
    }
    if settings.server.max_connections == 0 {
        return Err(SettingsError::invalid("server.maxConnections", "must be positive"));
    }
    Ok(())
}

/// Apply `CADRE_*` environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning.
pub fn apply_env_overrides(settings: &mut CadreSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable lookup.
pub fn apply_overrides(settings: &mut CadreSettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("CADRE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env
        .u64("CADRE_PORT", 0, 65535)
        .and_then(|v| u16::try_from(v).ok())
    {
        settings.server.port = v;
    }

    // ── Storage ─────────────────────────────────────────────────────
    if let Some(v) = env.string("CADRE_DB_PATH") {
        settings.storage.db_path = v;
    }
    if let Some(v) = env.string("CADRE_STATE_FILE") {
        settings.storage.state_file = v;
    }

    // ── Liveness ────────────────────────────────────────────────────
    if let Some(v) = env.u64("CADRE_STALE_THRESHOLD_SECS", 1, 86_400) {
        settings.liveness.stale_threshold_secs = v;
    }
    if let Some(v) = env.u64("CADRE_PURGE_AFTER_SECS", 1, 604_800) {
        settings.liveness.purge_after_secs = v;
    }
    if let Some(v) = env.u64("CADRE_SWEEP_INTERVAL_SECS", 1, 3600) {
        settings.liveness.sweep_interval_secs = v;
    }

    // ── Advisory ────────────────────────────────────────────────────
    if let Some(v) = env.bool("CADRE_ADVISORY_ENABLED") {
        settings.advisory.enabled = v;
    }
    if let Some(v) = env.string("CADRE_ADVISORY_URL") {
        settings.advisory.base_url = v;
    }
    if let Some(v) = env.u64("CADRE_ADVISORY_TIMEOUT_MS", 1, 60_000) {
        settings.advisory.timeout_ms = v;
    }
    if let Some(v) = env.unit_f64("CADRE_CONFIDENCE_THRESHOLD") {
        settings.advisory.confidence_threshold = v;
    }

    // ── Logging / client ────────────────────────────────────────────
    if let Some(v) = env.string("CADRE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("CADRE_LOG_JSON") {
        settings.logging.json = v;
    }
    if let Some(v) = env.string("CADRE_SERVER_URL") {
        settings.client.server_url = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a finite `f64` within `[0, 1]`.
pub fn parse_unit_f64(val: &str) -> Option<f64> {
    let n: f64 = val.parse().ok()?;
    (n.is_finite() && (0.0..=1.0).contains(&n)).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid integer env var, ignoring");
        }
        result
    }

    fn unit_f64(&self, name: &str) -> Option<f64> {
        let val = (self.lookup)(name)?;
        let result = parse_unit_f64(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid fraction env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
