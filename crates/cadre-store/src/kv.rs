//! The key-value contract every backend implements.
//!
//! Keys are flat strings namespaced by prefix (`session:<id>`, `task:<id>`,
//! `meta:<name>`). Values are JSON documents.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::Result;

/// One write inside an atomic batch.
#[derive(Clone, Debug, PartialEq)]
pub enum KvWrite {
    /// Insert or replace a key.
    Put {
        /// Key to write.
        key: String,
        /// JSON value.
        value: Value,
    },
    /// Remove a key. Removing a missing key is not an error.
    Delete {
        /// Key to remove.
        key: String,
    },
}

impl KvWrite {
    /// Build a put from any serializable value.
    pub fn put(key: impl Into<String>, value: &impl Serialize) -> Result<Self> {
        Ok(Self::Put {
            key: key.into(),
            value: serde_json::to_value(value)?,
        })
    }

    /// Build a delete.
    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }

    /// Key touched by this write.
    pub fn key(&self) -> &str {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// Durable key-value storage.
///
/// Implementations are synchronous and must be safe to share across threads.
/// [`KvStore::write_batch`] is all-or-nothing: after an error, none of the
/// batch is visible.
pub trait KvStore: Send + Sync {
    /// Read one key.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Insert or replace one key.
    fn put(&self, key: &str, value: Value) -> Result<()> {
        self.write_batch(vec![KvWrite::Put {
            key: key.to_string(),
            value,
        }])
    }

    /// All entries whose key starts with `prefix`, ordered by key.
    fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>>;

    /// Remove one key. Returns whether it existed.
    fn delete(&self, key: &str) -> Result<bool>;

    /// Apply every write atomically, in order.
    fn write_batch(&self, writes: Vec<KvWrite>) -> Result<()>;
}

/// Typed helpers over any [`KvStore`].
pub trait KvStoreExt: KvStore {
    /// Read and deserialize one key.
    fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Read and deserialize every value under a prefix.
    fn list_prefix_as<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>> {
        self.list_prefix(prefix)?
            .into_iter()
            .map(|(_, value)| Ok(serde_json::from_value(value)?))
            .collect()
    }

    /// Serialize and write one key.
    fn put_as<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.put(key, serde_json::to_value(value)?)
    }
}

impl<S: KvStore + ?Sized> KvStoreExt for S {}
