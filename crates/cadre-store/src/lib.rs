//! # cadre-store
//!
//! Durable key-value layer for the cadre coordinator.
//!
//! - [`KvStore`]: `get` / `put` / `list_prefix` / `delete` plus atomic
//!   `write_batch`
//! - [`SqliteKvStore`]: pooled `SQLite` backend with embedded migrations
//! - [`JsonFileKvStore`]: single JSON file, used by the local fallback client
//! - [`MemoryKvStore`]: volatile, for tests

#![deny(unsafe_code)]

pub mod errors;
pub mod file;
pub mod kv;
pub mod memory;
pub mod sqlite;

pub use errors::{Result, StoreError};
pub use file::JsonFileKvStore;
pub use kv::{KvStore, KvStoreExt, KvWrite};
pub use memory::MemoryKvStore;
pub use sqlite::{ConnectionConfig, SqliteKvStore};
