//! `SQLite` backend used by the coordinator server.

pub mod connection;
pub mod migrations;

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use serde_json::Value;
use tracing::{debug, instrument};

pub use connection::{ConnectionConfig, ConnectionPool};

use crate::errors::Result;
use crate::kv::{KvStore, KvWrite};

/// A [`KvStore`] backed by a pooled `SQLite` database.
#[derive(Clone)]
pub struct SqliteKvStore {
    pool: ConnectionPool,
}

impl SqliteKvStore {
    /// Open (or create) a database file and run migrations.
    #[instrument(skip(config), fields(path = %path.display()))]
    pub fn open(path: &Path, config: &ConnectionConfig) -> Result<Self> {
        let pool = connection::new_file(path, config)?;
        Self::from_pool(pool)
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::from_pool(connection::new_in_memory()?)
    }

    fn from_pool(pool: ConnectionPool) -> Result<Self> {
        let conn = pool.get()?;
        let applied = migrations::run_migrations(&conn)?;
        debug!(applied, "sqlite store ready");
        drop(conn);
        Ok(Self { pool })
    }
}

impl std::fmt::Debug for SqliteKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteKvStore")
            .field("max_size", &self.pool.max_size())
            .finish()
    }
}

impl KvStore for SqliteKvStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let conn = self.pool.get()?;
        let raw: Option<String> = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        raw.map(|s| serde_json::from_str(&s).map_err(Into::into))
            .transpose()
    }

    fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT key, value FROM kv \
             WHERE substr(key, 1, length(?1)) = ?1 \
             ORDER BY key",
        )?;
        let rows = stmt.query_map(params![prefix], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (key, raw) = row?;
            out.push((key, serde_json::from_str(&raw)?));
        }
        Ok(out)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        let changed = conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(changed > 0)
    }

    fn write_batch(&self, writes: Vec<KvWrite>) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        for write in &writes {
            match write {
                KvWrite::Put { key, value } => {
                    let _ = tx.execute(
                        "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3) \
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value, \
                         updated_at = excluded.updated_at",
                        params![key, serde_json::to_string(value)?, now],
                    )?;
                }
                KvWrite::Delete { key } => {
                    let _ = tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}
