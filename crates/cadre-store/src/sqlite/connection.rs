//! `SQLite` connection pool with WAL mode.
//!
//! The customizer runs on every new pooled connection so each one has the
//! same journal, timeout and sync pragmas.

use std::path::Path;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::errors::Result;

/// Alias for the connection pool type.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Pool sizing and pragma values.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Maximum pool size.
    pub pool_size: u32,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug)]
struct PragmaCustomizer {
    busy_timeout_ms: u32,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;\
             PRAGMA busy_timeout = {};\
             PRAGMA synchronous = NORMAL;",
            self.busy_timeout_ms
        ))
    }
}

fn build(manager: SqliteConnectionManager, config: &ConnectionConfig) -> Result<ConnectionPool> {
    let pool = Pool::builder()
        .max_size(config.pool_size)
        .connection_timeout(Duration::from_secs(5))
        .idle_timeout(None)
        .max_lifetime(None)
        .connection_customizer(Box::new(PragmaCustomizer {
            busy_timeout_ms: config.busy_timeout_ms,
        }))
        .build(manager)?;
    Ok(pool)
}

/// Create a file-backed pool, creating parent directories as needed.
pub fn new_file(path: &Path, config: &ConnectionConfig) -> Result<ConnectionPool> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    build(SqliteConnectionManager::file(path), config)
}

/// Create a pool over a single shared in-memory database.
///
/// Every `:memory:` connection is its own database, so the pool is capped at
/// one connection that is never recycled.
pub fn new_in_memory() -> Result<ConnectionPool> {
    build(
        SqliteConnectionManager::memory(),
        &ConnectionConfig {
            pool_size: 1,
            ..ConnectionConfig::default()
        },
    )
}
