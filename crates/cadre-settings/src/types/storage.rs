//! Durable storage locations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::loader::expand_home;

/// Where the coordinator and the local fallback client keep state.
///
/// Paths may start with `~/`, which expands to `$HOME`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// SQLite database used by the server.
    pub db_path: String,
    /// JSON state file used by the local fallback client.
    pub state_file: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            db_path: "~/.cadre/cadre.db".to_string(),
            state_file: "~/.cadre/local-state.json".to_string(),
        }
    }
}

impl StorageSettings {
    /// Resolved database path.
    pub fn db_path(&self) -> PathBuf {
        expand_home(&self.db_path)
    }

    /// Resolved state file path.
    pub fn state_file(&self) -> PathBuf {
        expand_home(&self.state_file)
    }
}
