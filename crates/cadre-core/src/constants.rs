//! Package-level constants and durable key layout.

/// Current version of the coordinator (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = "cadre";

/// Key prefix for session records in the durable store.
pub const SESSION_KEY_PREFIX: &str = "session:";

/// Key prefix for task records in the durable store.
pub const TASK_KEY_PREFIX: &str = "task:";

/// Key holding the last bulk-sync timestamp.
pub const LAST_SYNC_KEY: &str = "meta:last_sync";

/// Durable key for a session record.
pub fn session_key(id: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{id}")
}

/// Durable key for a task record.
pub fn task_key(id: &str) -> String {
    format!("{TASK_KEY_PREFIX}{id}")
}
