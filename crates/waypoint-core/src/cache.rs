//! On-disk snapshot of the last known record set.
//!
//! The snapshot is written after every successful load and every applied
//! mutation, and read only when the remote store cannot be reached. It is
//! never authoritative: the next successful load replaces it.
//!
//! Layout: one JSON document `{version, saved_at, initiatives}` written to a
//! temp file and renamed into place under an exclusive advisory lock.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::error::ErrorCode;
use crate::lock::{LockError, LockMode, SnapshotLock};
use crate::model::Initiative;

pub const SNAPSHOT_VERSION: u32 = 1;

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to read snapshot {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write snapshot {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("snapshot {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("snapshot version {found} is not supported")]
    UnsupportedVersion { found: u32 },

    #[error(transparent)]
    Lock(#[from] LockError),
}

impl CacheError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } | Self::Corrupt { .. } | Self::UnsupportedVersion { .. } => {
                ErrorCode::CacheReadFailed
            }
            Self::Write { .. } => ErrorCode::CacheWriteFailed,
            Self::Lock(err) => err.code(),
        }
    }
}

/// Persisted snapshot document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub initiatives: Vec<Initiative>,
}

/// A snapshot file plus its lock file.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    path: PathBuf,
    lock_timeout: Duration,
}

impl SnapshotCache {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    /// Read the snapshot. `Ok(None)` when none has been written yet.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the file cannot be read or decoded, or
    /// the lock is contended past the timeout.
    pub fn load(&self) -> Result<Option<Snapshot>, CacheError> {
        let _lock = SnapshotLock::acquire(&self.lock_path(), LockMode::Shared, self.lock_timeout)?;
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CacheError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let snapshot: Snapshot =
            serde_json::from_str(&raw).map_err(|err| CacheError::Corrupt {
                path: self.path.clone(),
                message: err.to_string(),
            })?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CacheError::UnsupportedVersion {
                found: snapshot.version,
            });
        }
        debug!(path = %self.path.display(), count = snapshot.initiatives.len(), "snapshot loaded");
        Ok(Some(snapshot))
    }

    /// Replace the snapshot with `records`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the file cannot be written or the lock
    /// is contended past the timeout.
    pub fn save(&self, records: &[Initiative]) -> Result<(), CacheError> {
        let write_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| CacheError::Write { path, source }
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err(parent))?;
        }
        let _lock =
            SnapshotLock::acquire(&self.lock_path(), LockMode::Exclusive, self.lock_timeout)?;

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            initiatives: records.to_vec(),
        };
        let encoded = serde_json::to_vec_pretty(&snapshot).map_err(|err| CacheError::Write {
            path: self.path.clone(),
            source: io::Error::other(err),
        })?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, encoded).map_err(write_err(&tmp))?;
        fs::rename(&tmp, &self.path).map_err(write_err(&self.path))?;
        debug!(path = %self.path.display(), count = records.len(), "snapshot saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CacheError, SnapshotCache};
    use crate::error::ErrorCode;
    use crate::model::{Initiative, InitiativeId, starter_initiatives};

    fn records() -> Vec<Initiative> {
        starter_initiatives()
            .into_iter()
            .enumerate()
            .map(|(i, f)| Initiative::from_fields(InitiativeId::from(format!("id-{i}")), f))
            .collect()
    }

    #[test]
    fn missing_snapshot_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(dir.path().join("snapshot.json"));
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(dir.path().join("nested").join("snapshot.json"));
        cache.save(&records()).unwrap();

        let snapshot = cache.load().unwrap().unwrap();
        assert_eq!(snapshot.initiatives, records());
        assert!(!dir.path().join("nested").join("snapshot.tmp").exists());
    }

    #[test]
    fn corrupt_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = SnapshotCache::new(&path).load().unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
        assert_eq!(err.code(), ErrorCode::CacheReadFailed);
    }

    #[test]
    fn future_versions_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(
            &path,
            r#"{"version": 9, "saved_at": "2026-01-01T00:00:00Z", "initiatives": []}"#,
        )
        .unwrap();
        assert!(matches!(
            SnapshotCache::new(&path).load(),
            Err(CacheError::UnsupportedVersion { found: 9 })
        ));
    }
}
