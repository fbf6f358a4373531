//! In-memory backend for tests and ephemeral coordinators.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde_json::Value;

use crate::errors::Result;
use crate::kv::{KvStore, KvWrite};

/// A [`KvStore`] held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

pub(crate) fn apply_writes(entries: &mut BTreeMap<String, Value>, writes: Vec<KvWrite>) {
    for write in writes {
        match write {
            KvWrite::Put { key, value } => {
                let _ = entries.insert(key, value);
            }
            KvWrite::Delete { key } => {
                let _ = entries.remove(&key);
            }
        }
    }
}

pub(crate) fn collect_prefix(
    entries: &BTreeMap<String, Value>,
    prefix: &str,
) -> Vec<(String, Value)> {
    entries
        .range(prefix.to_string()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>> {
        Ok(collect_prefix(&self.entries.read(), prefix))
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    fn write_batch(&self, writes: Vec<KvWrite>) -> Result<()> {
        apply_writes(&mut self.entries.write(), writes);
        Ok(())
    }
}
