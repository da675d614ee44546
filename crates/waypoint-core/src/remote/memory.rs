//! In-process remote store with deterministic fault injection.
//!
//! Behaves like the hosted table: ids are assigned on insert, rows come back
//! in creation order, and every committed change is pushed to subscribers
//! while the table lock is held, so per-row events keep commit order.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::trace;
use uuid::Uuid;

use super::row::{RemoteRow, RowWrite};
use super::{ChangeEvent, ChangeFeed, RemoteError, RemoteStore};
use crate::mapper::{to_remote, to_write};
use crate::model::{Initiative, InitiativeFields, InitiativeId};

/// Fault injection configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FaultConfig {
    /// Every call fails as if the network were down.
    pub offline: bool,
    /// Number of upcoming writes (insert, update, delete) to fail.
    pub failing_writes: u32,
    /// Delay before each call completes, unless a scripted delay is queued.
    pub latency: Duration,
}

#[derive(Debug, Default)]
struct Table {
    rows: Vec<RemoteRow>,
    subscribers: Vec<mpsc::UnboundedSender<ChangeEvent>>,
}

impl Table {
    fn publish(&mut self, event: &ChangeEvent) {
        trace!(kind = event.kind(), id = %event.id(), "memory remote publish");
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// In-memory table shared by every client holding the same `Arc`.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    table: Mutex<Table>,
    faults: Mutex<FaultConfig>,
    scripted: Mutex<VecDeque<Duration>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn stored_row(id: InitiativeId, created_at: Option<chrono::DateTime<Utc>>, w: RowWrite) -> RemoteRow {
    RemoteRow {
        id,
        title: w.title,
        description: w.description,
        team: w.team,
        priority: w.priority,
        status: w.status,
        progress: w.progress,
        assignee: w.assignee,
        start_month: w.start_month,
        end_month: w.end_month,
        quarter: w.quarter,
        year: w.year,
        created_at,
        updated_at: Some(w.updated_at),
    }
}

impl MemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A table pre-populated with `rows`, ids assigned in order.
    #[must_use]
    pub fn with_rows(rows: impl IntoIterator<Item = InitiativeFields>) -> Self {
        let remote = Self::new();
        {
            let mut table = lock(&remote.table);
            let now = Utc::now();
            for fields in rows {
                let id = InitiativeId::from(Uuid::new_v4().to_string());
                table.rows.push(stored_row(id, Some(now), to_write(&fields, now)));
            }
        }
        remote
    }

    /// A table holding `records` with their ids kept, in the given order.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = Initiative>) -> Self {
        let remote = Self::new();
        {
            let mut table = lock(&remote.table);
            let now = Utc::now();
            table
                .rows
                .extend(records.into_iter().map(|record| to_remote(&record, now)));
        }
        remote
    }

    /// Take the store offline (or bring it back).
    pub fn set_offline(&self, offline: bool) {
        lock(&self.faults).offline = offline;
    }

    /// Fail the next `count` writes with a transport error.
    pub fn fail_next_writes(&self, count: u32) {
        lock(&self.faults).failing_writes = count;
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.faults).latency = latency;
    }

    /// Queue one delay per upcoming call, in call order. Calls beyond the
    /// queue use the configured latency.
    pub fn script_latencies(&self, delays: impl IntoIterator<Item = Duration>) {
        lock(&self.scripted).extend(delays);
    }

    /// Current fault configuration.
    #[must_use]
    pub fn faults(&self) -> FaultConfig {
        *lock(&self.faults)
    }

    /// Snapshot of the stored rows in creation order.
    #[must_use]
    pub fn rows(&self) -> Vec<RemoteRow> {
        lock(&self.table).rows.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.table).rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.table).rows.is_empty()
    }

    /// Number of live change subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut table = lock(&self.table);
        table.subscribers.retain(|tx| !tx.is_closed());
        table.subscribers.len()
    }

    /// Close every open change feed, as a server restart would.
    pub fn disconnect_subscribers(&self) {
        lock(&self.table).subscribers.clear();
    }

    async fn enter(&self, write: bool) -> Result<(), RemoteError> {
        let delay = lock(&self.scripted)
            .pop_front()
            .unwrap_or_else(|| lock(&self.faults).latency);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut faults = lock(&self.faults);
        if faults.offline {
            return Err(RemoteError::Transport("remote offline".into()));
        }
        if write && faults.failing_writes > 0 {
            faults.failing_writes -= 1;
            return Err(RemoteError::Transport("injected write failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn select_all(&self) -> Result<Vec<RemoteRow>, RemoteError> {
        self.enter(false).await?;
        Ok(self.rows())
    }

    async fn insert(&self, rows: Vec<RowWrite>) -> Result<Vec<RemoteRow>, RemoteError> {
        self.enter(true).await?;
        let mut table = lock(&self.table);
        let now = Utc::now();
        let mut stored = Vec::with_capacity(rows.len());
        for write in rows {
            let id = InitiativeId::from(Uuid::new_v4().to_string());
            let row = stored_row(id, Some(now), write);
            table.rows.push(row.clone());
            table.publish(&ChangeEvent::Insert(row.clone()));
            stored.push(row);
        }
        Ok(stored)
    }

    async fn update(
        &self,
        id: &InitiativeId,
        row: RowWrite,
    ) -> Result<Option<RemoteRow>, RemoteError> {
        self.enter(true).await?;
        let mut table = lock(&self.table);
        let Some(pos) = table.rows.iter().position(|r| &r.id == id) else {
            return Ok(None);
        };
        let created_at = table.rows[pos].created_at;
        let updated = stored_row(id.clone(), created_at, row);
        table.rows[pos] = updated.clone();
        table.publish(&ChangeEvent::Update(updated.clone()));
        Ok(Some(updated))
    }

    async fn delete(&self, id: &InitiativeId) -> Result<bool, RemoteError> {
        self.enter(true).await?;
        let mut table = lock(&self.table);
        let Some(pos) = table.rows.iter().position(|r| &r.id == id) else {
            return Ok(false);
        };
        table.rows.remove(pos);
        table.publish(&ChangeEvent::Delete { id: id.clone() });
        Ok(true)
    }

    async fn subscribe(&self) -> Result<ChangeFeed, RemoteError> {
        if lock(&self.faults).offline {
            return Err(RemoteError::FeedClosed("remote offline".into()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.table).subscribers.push(tx);
        Ok(ChangeFeed::new(rx))
    }
}
