//! Create, read, update and delete against the remote store.
//!
//! The gateway performs only the network phase of each operation and hands
//! back the record the store reconciled. Applying that result to a
//! [`crate::store::LocalStore`] is the caller's job (see
//! [`crate::session`]), which keeps every store mutation on one task.
//!
//! Field sets are validated before any request is sent.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::error::SyncError;
use crate::mapper::{from_remote, to_write};
use crate::model::{Initiative, InitiativeFields, InitiativeId, Team, starter_initiatives};
use crate::remote::{ChangeFeed, RemoteError, RemoteStore};

/// Where a loaded record set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Rows read from the remote table.
    Remote,
    /// The table was empty and the starter set was inserted.
    Seeded,
    /// The remote was unreachable and the local snapshot was used.
    Cache,
}

impl LoadSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Seeded => "seeded",
            Self::Cache => "cache",
        }
    }
}

/// Result of [`SyncGateway::load_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded {
    pub records: Vec<Initiative>,
    pub source: LoadSource,
}

/// Network half of every mutation. Cheap to clone.
#[derive(Clone)]
pub struct SyncGateway {
    remote: Arc<dyn RemoteStore>,
    seed: Arc<[InitiativeFields]>,
}

impl std::fmt::Debug for SyncGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncGateway")
            .field("seed", &self.seed.len())
            .finish_non_exhaustive()
    }
}

fn write_failed(err: &RemoteError) -> SyncError {
    SyncError::WriteFailed(err.to_string())
}

impl SyncGateway {
    /// Gateway seeding empty tables with the starter initiatives.
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self::with_seed(remote, starter_initiatives())
    }

    /// Gateway with a custom seed set; an empty set disables seeding.
    #[must_use]
    pub fn with_seed(remote: Arc<dyn RemoteStore>, seed: Vec<InitiativeFields>) -> Self {
        Self {
            remote,
            seed: seed.into(),
        }
    }

    /// Every row ordered by creation time. An empty table is seeded with one
    /// batch insert and the stored seed rows are returned.
    ///
    /// # Errors
    ///
    /// [`SyncError::RemoteUnavailable`] when the read fails,
    /// [`SyncError::WriteFailed`] when the seed insert fails.
    pub async fn load_all(&self) -> Result<Loaded, SyncError> {
        let rows = self.remote.select_all().await.map_err(|err| {
            warn!(error = %err, "load failed");
            SyncError::RemoteUnavailable(err.to_string())
        })?;

        if !rows.is_empty() || self.seed.is_empty() {
            info!(count = rows.len(), "loaded initiatives");
            return Ok(Loaded {
                records: rows.into_iter().map(from_remote).collect(),
                source: LoadSource::Remote,
            });
        }

        let now = Utc::now();
        let writes = self.seed.iter().map(|f| to_write(f, now)).collect();
        let stored = self.remote.insert(writes).await.map_err(|err| {
            error!(error = %err, "seeding failed");
            write_failed(&err)
        })?;
        info!(count = stored.len(), "seeded empty table");
        Ok(Loaded {
            records: stored.into_iter().map(from_remote).collect(),
            source: LoadSource::Seeded,
        })
    }

    /// Persist a new initiative and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// [`SyncError::Invalid`] before any request, [`SyncError::WriteFailed`]
    /// when the insert fails or returns nothing.
    pub async fn create(&self, fields: InitiativeFields) -> Result<Initiative, SyncError> {
        fields.validate()?;
        let stored = self
            .remote
            .insert(vec![to_write(&fields, Utc::now())])
            .await
            .map_err(|err| {
                error!(error = %err, "create failed");
                write_failed(&err)
            })?;
        let row = stored
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::WriteFailed("insert returned no row".into()))?;
        debug!(id = %row.id, "created initiative");
        Ok(from_remote(row))
    }

    /// Replace every mutable field of `id`.
    ///
    /// # Errors
    ///
    /// [`SyncError::Invalid`] before any request, [`SyncError::NotFound`]
    /// when the remote has no such row, [`SyncError::WriteFailed`] on
    /// transport failure.
    pub async fn update(
        &self,
        id: &InitiativeId,
        patch: InitiativeFields,
    ) -> Result<Initiative, SyncError> {
        patch.validate()?;
        let stored = self
            .remote
            .update(id, to_write(&patch, Utc::now()))
            .await
            .map_err(|err| {
                error!(id = %id, error = %err, "update failed");
                write_failed(&err)
            })?;
        let row = stored.ok_or_else(|| SyncError::NotFound(id.clone()))?;
        debug!(id = %row.id, "updated initiative");
        Ok(from_remote(row))
    }

    /// Move `current` to another team and start month, keeping its duration
    /// (end month clamped to the last month of the quarter).
    ///
    /// # Errors
    ///
    /// Same as [`SyncGateway::update`].
    pub async fn reassign(
        &self,
        current: &Initiative,
        team: Team,
        start_month: u8,
    ) -> Result<Initiative, SyncError> {
        let moved = current.fields.reassigned(team, start_month);
        self.update(&current.id, moved).await
    }

    /// Delete `id` on the remote.
    ///
    /// # Errors
    ///
    /// [`SyncError::NotFound`] when no row was deleted,
    /// [`SyncError::WriteFailed`] on transport failure.
    pub async fn delete(&self, id: &InitiativeId) -> Result<(), SyncError> {
        let deleted = self.remote.delete(id).await.map_err(|err| {
            error!(id = %id, error = %err, "delete failed");
            write_failed(&err)
        })?;
        if !deleted {
            return Err(SyncError::NotFound(id.clone()));
        }
        debug!(id = %id, "deleted initiative");
        Ok(())
    }

    /// Open the remote change feed.
    ///
    /// # Errors
    ///
    /// The backend's error when the subscription cannot be opened.
    pub async fn subscribe(&self) -> Result<ChangeFeed, RemoteError> {
        self.remote.subscribe().await
    }
}

#[cfg(test)]
mod tests {
    use super::{LoadSource, SyncGateway};
    use crate::error::SyncError;
    use crate::model::{InitiativeId, Team, ValidationError, starter_initiatives};
    use crate::remote::memory::MemoryRemote;
    use std::sync::Arc;

    #[tokio::test]
    async fn empty_table_is_seeded_once() {
        let remote = Arc::new(MemoryRemote::new());
        let gateway = SyncGateway::new(remote.clone());

        let first = gateway.load_all().await.unwrap();
        assert_eq!(first.source, LoadSource::Seeded);
        assert_eq!(first.records.len(), 6);

        let second = gateway.load_all().await.unwrap();
        assert_eq!(second.source, LoadSource::Remote);
        assert_eq!(second.records, first.records);
        assert_eq!(remote.len(), 6);
    }

    #[tokio::test]
    async fn seed_can_be_disabled() {
        let gateway = SyncGateway::with_seed(Arc::new(MemoryRemote::new()), Vec::new());
        let loaded = gateway.load_all().await.unwrap();
        assert_eq!(loaded.source, LoadSource::Remote);
        assert!(loaded.records.is_empty());
    }

    #[tokio::test]
    async fn failures_map_to_sync_errors() {
        let remote = Arc::new(MemoryRemote::new());
        let gateway = SyncGateway::new(remote.clone());
        remote.set_offline(true);

        assert!(matches!(
            gateway.load_all().await,
            Err(SyncError::RemoteUnavailable(_))
        ));
        assert!(matches!(
            gateway.create(starter_initiatives().remove(0)).await,
            Err(SyncError::WriteFailed(_))
        ));
        assert!(matches!(
            gateway.delete(&InitiativeId::from("x")).await,
            Err(SyncError::WriteFailed(_))
        ));
    }

    #[tokio::test]
    async fn seed_failure_is_a_write_failure() {
        let remote = Arc::new(MemoryRemote::new());
        remote.fail_next_writes(1);
        let gateway = SyncGateway::new(remote);
        assert!(matches!(
            gateway.load_all().await,
            Err(SyncError::WriteFailed(_))
        ));
    }

    #[tokio::test]
    async fn invalid_fields_never_reach_the_remote() {
        let remote = Arc::new(MemoryRemote::new());
        let gateway = SyncGateway::new(remote.clone());
        let mut fields = starter_initiatives().remove(0);
        fields.start_month = 3;
        fields.end_month = 1;

        assert_eq!(
            gateway.create(fields).await,
            Err(SyncError::Invalid(ValidationError::EndBeforeStart {
                start: 3,
                end: 1
            }))
        );
        assert!(remote.is_empty());
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let gateway = SyncGateway::new(Arc::new(MemoryRemote::new()));
        let id = InitiativeId::from("gone");
        assert_eq!(
            gateway.update(&id, starter_initiatives().remove(0)).await,
            Err(SyncError::NotFound(id.clone()))
        );
        assert_eq!(gateway.delete(&id).await, Err(SyncError::NotFound(id)));
    }

    #[tokio::test]
    async fn reassign_keeps_duration_and_clamps() {
        let gateway = SyncGateway::new(Arc::new(MemoryRemote::new()));
        let mut fields = starter_initiatives().remove(0);
        fields.start_month = 1;
        fields.end_month = 2;
        let created = gateway.create(fields).await.unwrap();

        let moved = gateway.reassign(&created, Team::Product, 3).await.unwrap();
        assert_eq!(moved.id, created.id);
        assert_eq!(moved.fields.team, Team::Product);
        assert_eq!((moved.fields.start_month, moved.fields.end_month), (3, 3));
    }
}
