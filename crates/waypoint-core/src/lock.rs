//! Advisory file locks guarding the snapshot cache.
//!
//! Several `wp` processes may share one cache file. Readers take a shared
//! lock and writers an exclusive one on a sibling `.lock` file, so a reader
//! never observes a rename in progress from another process.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use thiserror::Error;

use crate::error::ErrorCode;

const RETRY_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock on {path} not acquired after {waited:?}")]
    Timeout { path: PathBuf, waited: Duration },

    #[error("lock file error: {0}")]
    Io(#[from] io::Error),
}

impl LockError {
    /// Machine-readable code associated with this lock error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockContention,
            Self::Io(_) => ErrorCode::CacheWriteFailed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// RAII guard; the lock is released on drop.
#[derive(Debug)]
pub struct SnapshotLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl SnapshotLock {
    /// Acquire `mode` on `path`, polling until `timeout` has elapsed.
    ///
    /// # Errors
    ///
    /// [`LockError::Timeout`] when another process holds a conflicting
    /// lock for longer than `timeout`, [`LockError::Io`] when the lock file
    /// cannot be created.
    pub fn acquire(path: &Path, mode: LockMode, timeout: Duration) -> Result<Self, LockError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let start = Instant::now();
        loop {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(path)?;

            let acquired = match mode {
                LockMode::Shared => file.try_lock_shared().is_ok(),
                LockMode::Exclusive => file.try_lock_exclusive().is_ok(),
            };
            if acquired {
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                    mode,
                });
            }

            let waited = start.elapsed();
            if waited >= timeout {
                return Err(LockError::Timeout {
                    path: path.to_path_buf(),
                    waited,
                });
            }
            thread::sleep(RETRY_INTERVAL);
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for SnapshotLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
