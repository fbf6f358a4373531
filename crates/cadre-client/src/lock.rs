//! Cross-process exclusion for the local state file.
//!
//! The lock is a sibling `<state>.lock` file created with `create_new`, so at
//! most one process holds it at a time. The holder's pid is written inside
//! for diagnostics. A lock file older than [`STALE_AFTER`] was left by a
//! crashed process and is removed.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::errors::{ClientError, Result};

/// How long to wait for another process to release the lock.
pub const LOCK_WAIT: Duration = Duration::from_secs(10);

/// Age after which an unreleased lock is considered abandoned.
pub const STALE_AFTER: Duration = Duration::from_secs(30);

const INITIAL_BACKOFF: Duration = Duration::from_millis(5);
const MAX_BACKOFF: Duration = Duration::from_millis(200);

/// Held exclusive lock. Released on drop.
#[derive(Debug)]
pub struct StateFileLock {
    path: PathBuf,
}

impl StateFileLock {
    /// Lock file path for a state file.
    pub fn path_for(state_path: &Path) -> PathBuf {
        let mut path = state_path.as_os_str().to_owned();
        path.push(".lock");
        PathBuf::from(path)
    }

    /// Wait up to `wait` for the lock on `state_path`.
    pub async fn acquire(state_path: &Path, wait: Duration) -> Result<Self> {
        let path = Self::path_for(state_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ClientError::Lock {
                path: path.clone(),
                source,
            })?;
        }

        let deadline = Instant::now() + wait;
        let mut backoff = INITIAL_BACKOFF;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let _ = writeln!(file, "{}", std::process::id());
                    debug!(path = %path.display(), "state lock acquired");
                    return Ok(Self { path });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path) && std::fs::remove_file(&path).is_ok() {
                        warn!(path = %path.display(), "removed abandoned state lock");
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(ClientError::LockTimeout { path });
                    }
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
                Err(source) => return Err(ClientError::Lock { path, source }),
            }
        }
    }

    /// Lock file location.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateFileLock {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %err, "failed to release state lock");
        }
    }
}

fn is_stale(path: &Path) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age > STALE_AFTER)
}
