//! The remote store boundary.
//!
//! A [`RemoteStore`] is a single table of initiative rows keyed by a
//! server-assigned id, plus a push subscription that reports row-level
//! changes made by any client. Implementations:
//!
//! - [`memory::MemoryRemote`]: in-process table with fault injection.
//! - [`rest::RestRemote`]: PostgREST over HTTP with a realtime websocket
//!   change feed ([`realtime`]).

pub mod memory;
pub mod realtime;
pub mod rest;
pub mod row;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::ErrorCode;
use crate::model::InitiativeId;
use row::{RemoteRow, RowWrite};

/// Transport-level failure talking to the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The store answered with a non-success status.
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// The response body did not match the row shape.
    #[error("malformed response: {0}")]
    Decode(String),

    /// The change feed could not be opened or was closed by the server.
    #[error("change feed closed: {0}")]
    FeedClosed(String),
}

impl RemoteError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Transport(_) | Self::Server { .. } => ErrorCode::RemoteUnavailable,
            Self::Decode(_) => ErrorCode::MalformedRow,
            Self::FeedClosed(_) => ErrorCode::FeedDisconnected,
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// A row-level change pushed by the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Insert(RemoteRow),
    Update(RemoteRow),
    Delete { id: InitiativeId },
}

impl ChangeEvent {
    /// The id of the row the event concerns.
    #[must_use]
    pub const fn id(&self) -> &InitiativeId {
        match self {
            Self::Insert(row) | Self::Update(row) => &row.id,
            Self::Delete { id } => id,
        }
    }

    /// Upper-case event type name as used on the wire.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Insert(_) => "INSERT",
            Self::Update(_) => "UPDATE",
            Self::Delete { .. } => "DELETE",
        }
    }
}

/// One long-lived subscription to a table's change events.
///
/// Events for a given row arrive in commit order. Dropping the feed stops
/// any background task feeding it.
#[derive(Debug)]
pub struct ChangeFeed {
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    worker: Option<JoinHandle<()>>,
}

impl ChangeFeed {
    /// A feed that is filled directly by the store, with no worker task.
    #[must_use]
    pub fn new(events: mpsc::UnboundedReceiver<ChangeEvent>) -> Self {
        Self {
            events,
            worker: None,
        }
    }

    /// A feed filled by `worker`; the task is aborted when the feed drops.
    #[must_use]
    pub fn with_worker(
        events: mpsc::UnboundedReceiver<ChangeEvent>,
        worker: JoinHandle<()>,
    ) -> Self {
        Self {
            events,
            worker: Some(worker),
        }
    }

    /// Wait for the next event. `None` once the subscription has ended.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

/// A hosted table of initiative rows.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Every row, ordered by creation time (oldest first).
    async fn select_all(&self) -> Result<Vec<RemoteRow>, RemoteError>;

    /// Insert one or more rows; returns the stored rows in input order.
    async fn insert(&self, rows: Vec<RowWrite>) -> Result<Vec<RemoteRow>, RemoteError>;

    /// Replace the mutable columns of `id`. `Ok(None)` when no such row.
    async fn update(
        &self,
        id: &InitiativeId,
        row: RowWrite,
    ) -> Result<Option<RemoteRow>, RemoteError>;

    /// Delete `id`. `Ok(false)` when no such row.
    async fn delete(&self, id: &InitiativeId) -> Result<bool, RemoteError>;

    /// Open a change subscription covering insert, update and delete.
    async fn subscribe(&self) -> Result<ChangeFeed, RemoteError>;
}
