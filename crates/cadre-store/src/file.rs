//! Single-file JSON backend used by the local fallback client.
//!
//! The whole map is rewritten on every batch: serialized to a sibling temp
//! file, then renamed over the target. Memory is only updated after the
//! rename succeeds.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::kv::{KvStore, KvWrite};
use crate::memory::{apply_writes, collect_prefix};

/// A [`KvStore`] persisted as one JSON object on disk.
#[derive(Debug)]
pub struct JsonFileKvStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, Value>>,
}

impl JsonFileKvStore {
    /// Open the file at `path`, or start empty if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), keys = entries.len(), "opened json state file");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KvStore for JsonFileKvStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>> {
        Ok(collect_prefix(&self.entries.lock(), prefix))
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock();
        if !entries.contains_key(key) {
            return Ok(false);
        }
        let mut next = entries.clone();
        let _ = next.remove(key);
        self.persist(&next)?;
        *entries = next;
        Ok(true)
    }

    fn write_batch(&self, writes: Vec<KvWrite>) -> Result<()> {
        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        apply_writes(&mut next, writes);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}
