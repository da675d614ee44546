//! The session event loop.
//!
//! One task owns the [`AppState`]. Callers send commands through a
//! [`SessionHandle`]; each command starts a gateway network phase that runs
//! concurrently with others, and its completion is applied back on the
//! session task together with pushed change events, one at a time. The
//! projected [`View`] is republished after every change and user-facing
//! [`Notice`]s are broadcast as operations finish.
//!
//! Change events that arrive while a load is in flight are held back and
//! replayed on top of the loaded records.

pub mod state;

use futures::FutureExt;
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::cache::SnapshotCache;
use crate::error::SyncError;
use crate::gateway::{LoadSource, Loaded, SyncGateway};
use crate::model::{Initiative, InitiativeFields, InitiativeId, Team};
use crate::remote::{ChangeEvent, ChangeFeed};
use crate::view::{View, ViewFilter};
pub use state::{AppState, Completion};

const COMMAND_QUEUE: usize = 64;
const NOTICE_QUEUE: usize = 64;

// ---------------------------------------------------------------------------
// Notices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// A short user-facing message about a finished operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

type Reply<T> = oneshot::Sender<Result<T, SyncError>>;

enum Command {
    Reload(Reply<LoadSource>),
    Create(InitiativeFields, Reply<Initiative>),
    Update(InitiativeId, InitiativeFields, Reply<Initiative>),
    Reassign {
        id: InitiativeId,
        team: Team,
        start_month: u8,
        reply: Reply<Initiative>,
    },
    Delete(InitiativeId, Reply<()>),
    SetFilter(ViewFilter, oneshot::Sender<View>),
    Records(oneshot::Sender<Vec<Initiative>>),
    Shutdown,
}

enum Outcome {
    Loaded(Result<Loaded, SyncError>, Reply<LoadSource>),
    Created(Result<Initiative, SyncError>, Reply<Initiative>),
    Updated(Result<Initiative, SyncError>, Reply<Initiative>),
    Deleted(InitiativeId, Result<(), SyncError>, Reply<()>),
}

/// Session construction options.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub filter: ViewFilter,
    /// Snapshot written after changes and read when a load cannot reach the
    /// remote.
    pub cache: Option<SnapshotCache>,
    /// Open the remote change feed when the loop starts.
    pub subscribe: bool,
}

impl SessionOptions {
    #[must_use]
    pub const fn new(filter: ViewFilter) -> Self {
        Self {
            filter,
            cache: None,
            subscribe: true,
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: SnapshotCache) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub const fn with_subscribe(mut self, subscribe: bool) -> Self {
        self.subscribe = subscribe;
        self
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The event loop. Drive it with [`Session::run`].
pub struct Session {
    gateway: SyncGateway,
    state: AppState,
    cache: Option<SnapshotCache>,
    subscribe: bool,
    commands: mpsc::Receiver<Command>,
    view_tx: watch::Sender<View>,
    notices: broadcast::Sender<Notice>,
    in_flight: FuturesUnordered<BoxFuture<'static, Outcome>>,
    loads_in_flight: usize,
    deferred: Vec<ChangeEvent>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("records", &self.state.store.len())
            .field("in_flight", &self.in_flight.len())
            .field("deferred", &self.deferred.len())
            .finish_non_exhaustive()
    }
}

async fn next_event(feed: &mut Option<ChangeFeed>) -> Option<ChangeEvent> {
    match feed {
        Some(feed) => feed.recv().await,
        None => std::future::pending().await,
    }
}

impl Session {
    /// Create the loop and a handle to it. Nothing runs until
    /// [`Session::run`] is polled.
    #[must_use]
    pub fn new(gateway: SyncGateway, options: SessionOptions) -> (Self, SessionHandle) {
        let state = AppState::new(options.filter);
        let (command_tx, commands) = mpsc::channel(COMMAND_QUEUE);
        let (view_tx, view_rx) = watch::channel(state.view());
        let (notices, _) = broadcast::channel(NOTICE_QUEUE);

        let handle = SessionHandle {
            commands: command_tx,
            view: view_rx,
            notices: notices.clone(),
        };
        let session = Self {
            gateway,
            state,
            cache: options.cache,
            subscribe: options.subscribe,
            commands,
            view_tx,
            notices,
            in_flight: FuturesUnordered::new(),
            loads_in_flight: 0,
            deferred: Vec::new(),
        };
        (session, handle)
    }

    /// Run until [`SessionHandle::shutdown`] or every handle is dropped.
    /// Operations still in flight at that point are abandoned and their
    /// callers see [`SyncError::SessionClosed`].
    pub async fn run(mut self) {
        let mut feed = if self.subscribe {
            match self.gateway.subscribe().await {
                Ok(feed) => Some(feed),
                Err(err) => {
                    warn!(code = %err.code(), error = %err, "change feed unavailable");
                    None
                }
            }
        } else {
            None
        };

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.dispatch(command),
                },
                Some(outcome) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.complete(outcome);
                }
                event = next_event(&mut feed) => match event {
                    Some(event) => self.on_change(event),
                    None => {
                        warn!("change feed ended");
                        feed = None;
                    }
                },
            }
        }
        debug!(abandoned = self.in_flight.len(), "session stopped");
    }

    fn spawn_phase(&mut self, phase: BoxFuture<'static, Outcome>) {
        self.in_flight.push(phase);
    }

    fn dispatch(&mut self, command: Command) {
        let gateway = self.gateway.clone();
        match command {
            Command::Reload(reply) => {
                self.loads_in_flight += 1;
                self.state.begin_load();
                self.spawn_phase(
                    async move { Outcome::Loaded(gateway.load_all().await, reply) }.boxed(),
                );
            }
            Command::Create(fields, reply) => {
                self.spawn_phase(
                    async move { Outcome::Created(gateway.create(fields).await, reply) }.boxed(),
                );
            }
            Command::Update(id, fields, reply) => {
                self.spawn_phase(
                    async move { Outcome::Updated(gateway.update(&id, fields).await, reply) }
                        .boxed(),
                );
            }
            Command::Reassign {
                id,
                team,
                start_month,
                reply,
            } => {
                let Some(current) = self.state.store.find(&id).cloned() else {
                    let _ = reply.send(Err(SyncError::NotFound(id)));
                    return;
                };
                self.spawn_phase(
                    async move {
                        Outcome::Updated(gateway.reassign(&current, team, start_month).await, reply)
                    }
                    .boxed(),
                );
            }
            Command::Delete(id, reply) => {
                self.spawn_phase(
                    async move {
                        let result = gateway.delete(&id).await;
                        Outcome::Deleted(id, result, reply)
                    }
                    .boxed(),
                );
            }
            Command::SetFilter(filter, reply) => {
                self.state.filter = filter;
                self.publish();
                let _ = reply.send(self.view_tx.borrow().clone());
            }
            Command::Records(reply) => {
                let _ = reply.send(self.state.store.to_vec());
            }
            Command::Shutdown => {}
        }
    }

    fn complete(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Loaded(result, reply) => {
                self.loads_in_flight = self.loads_in_flight.saturating_sub(1);
                let answer = self.finish_load(result);
                if self.loads_in_flight == 0 {
                    self.state.end_load();
                    self.replay_deferred();
                }
                let _ = reply.send(answer);
            }
            Outcome::Created(result, reply) => {
                let answer = result.inspect(|record| {
                    self.commit(Completion::Created(record.clone()));
                });
                self.report(&answer, "Initiative created", "Failed to create initiative");
                let _ = reply.send(answer);
            }
            Outcome::Updated(result, reply) => {
                let answer = result.inspect(|record| {
                    self.commit(Completion::Updated(record.clone()));
                });
                self.report(&answer, "Initiative updated", "Failed to update initiative");
                let _ = reply.send(answer);
            }
            Outcome::Deleted(id, result, reply) => {
                if result.is_ok() {
                    self.commit(Completion::Deleted(id));
                }
                match &result {
                    Ok(()) => self.notify(NoticeLevel::Info, "Initiative deleted"),
                    Err(err) => self.notify_failure(err, "Failed to delete initiative"),
                }
                let _ = reply.send(result);
            }
        }
    }

    fn finish_load(&mut self, result: Result<Loaded, SyncError>) -> Result<LoadSource, SyncError> {
        match result {
            Ok(loaded) => {
                let source = loaded.source;
                self.commit(Completion::Loaded {
                    records: loaded.records,
                    source,
                });
                match source {
                    LoadSource::Seeded => self.notify(NoticeLevel::Info, "Sample data loaded"),
                    _ => self.notify(NoticeLevel::Success, "Data synced from cloud"),
                }
                Ok(source)
            }
            Err(SyncError::RemoteUnavailable(reason)) => {
                self.notify(NoticeLevel::Error, "Failed to load data. Using local cache.");
                let Some(records) = self.read_cache() else {
                    return Err(SyncError::RemoteUnavailable(reason));
                };
                info!(count = records.len(), "using cached snapshot");
                self.state.apply(Completion::Loaded {
                    records,
                    source: LoadSource::Cache,
                });
                self.publish();
                Ok(LoadSource::Cache)
            }
            Err(err) => {
                self.notify_failure(&err, "Failed to seed data");
                Err(err)
            }
        }
    }

    fn replay_deferred(&mut self) {
        if self.deferred.is_empty() {
            return;
        }
        debug!(count = self.deferred.len(), "replaying held change events");
        let mut changed = false;
        for event in std::mem::take(&mut self.deferred) {
            changed |= self.state.apply_change(event).applied();
        }
        if changed {
            self.publish();
            self.write_cache();
        }
    }

    fn on_change(&mut self, event: ChangeEvent) {
        if self.loads_in_flight > 0 {
            self.deferred.push(event);
            return;
        }
        let kind = event.kind();
        let id = event.id().clone();
        if self.state.apply_change(event).applied() {
            debug!(kind, id = %id, "applied change event");
            self.publish();
            self.write_cache();
        }
    }

    /// Apply a completion, then republish and persist if anything changed.
    fn commit(&mut self, completion: Completion) {
        if self.state.apply(completion) {
            self.publish();
            self.write_cache();
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.state.view());
    }

    fn read_cache(&self) -> Option<Vec<Initiative>> {
        let cache = self.cache.as_ref()?;
        match cache.load() {
            Ok(snapshot) => snapshot.map(|s| s.initiatives),
            Err(err) => {
                warn!(code = %err.code(), error = %err, "snapshot unreadable");
                None
            }
        }
    }

    fn write_cache(&self) {
        let Some(cache) = &self.cache else { return };
        if let Err(err) = cache.save(&self.state.store.to_vec()) {
            warn!(code = %err.code(), error = %err, "snapshot not saved");
        }
    }

    fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        let _ = self.notices.send(Notice::new(level, message));
    }

    fn notify_failure(&self, err: &SyncError, fallback: &str) {
        match err {
            SyncError::Invalid(reason) => self.notify(NoticeLevel::Error, reason.to_string()),
            _ => self.notify(NoticeLevel::Error, fallback),
        }
    }

    fn report<T>(&self, result: &Result<T, SyncError>, success: &str, failure: &str) {
        match result {
            Ok(_) => self.notify(NoticeLevel::Success, success),
            Err(err) => self.notify_failure(err, failure),
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable client of a running [`Session`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<View>,
    notices: broadcast::Sender<Notice>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Reload(_) => "Reload",
            Self::Create(..) => "Create",
            Self::Update(..) => "Update",
            Self::Reassign { .. } => "Reassign",
            Self::Delete(..) => "Delete",
            Self::SetFilter(..) => "SetFilter",
            Self::Records(_) => "Records",
            Self::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

impl SessionHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| SyncError::SessionClosed)?;
        rx.await.map_err(|_| SyncError::SessionClosed)?
    }

    async fn query<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| SyncError::SessionClosed)?;
        rx.await.map_err(|_| SyncError::SessionClosed)
    }

    /// Load every record from the remote (seeding an empty table), falling
    /// back to the snapshot cache when the remote is unreachable.
    ///
    /// # Errors
    ///
    /// [`SyncError::RemoteUnavailable`] with no usable snapshot,
    /// [`SyncError::WriteFailed`] when seeding fails.
    pub async fn reload(&self) -> Result<LoadSource, SyncError> {
        self.request(Command::Reload).await
    }

    /// # Errors
    ///
    /// See [`SyncGateway::create`].
    pub async fn create(&self, fields: InitiativeFields) -> Result<Initiative, SyncError> {
        self.request(|reply| Command::Create(fields, reply)).await
    }

    /// # Errors
    ///
    /// See [`SyncGateway::update`].
    pub async fn update(
        &self,
        id: InitiativeId,
        fields: InitiativeFields,
    ) -> Result<Initiative, SyncError> {
        self.request(|reply| Command::Update(id, fields, reply)).await
    }

    /// Move a held record to `team`, starting at `start_month`.
    ///
    /// # Errors
    ///
    /// [`SyncError::NotFound`] when the record is not held locally, else as
    /// [`SyncGateway::update`].
    pub async fn reassign(
        &self,
        id: InitiativeId,
        team: Team,
        start_month: u8,
    ) -> Result<Initiative, SyncError> {
        self.request(|reply| Command::Reassign {
            id,
            team,
            start_month,
            reply,
        })
        .await
    }

    /// # Errors
    ///
    /// See [`SyncGateway::delete`].
    pub async fn delete(&self, id: InitiativeId) -> Result<(), SyncError> {
        self.request(|reply| Command::Delete(id, reply)).await
    }

    /// Replace the active filters and return the recomputed view.
    ///
    /// # Errors
    ///
    /// [`SyncError::SessionClosed`] once the loop has stopped.
    pub async fn set_filter(&self, filter: ViewFilter) -> Result<View, SyncError> {
        self.query(|reply| Command::SetFilter(filter, reply)).await
    }

    /// Every held record in store order.
    ///
    /// # Errors
    ///
    /// [`SyncError::SessionClosed`] once the loop has stopped.
    pub async fn records(&self) -> Result<Vec<Initiative>, SyncError> {
        self.query(Command::Records).await
    }

    /// Stop the loop. Returns immediately if it has already stopped.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    /// The latest published view.
    #[must_use]
    pub fn view(&self) -> View {
        self.view.borrow().clone()
    }

    /// Receiver notified on every republished view.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<View> {
        self.view.clone()
    }

    /// Subscribe to notices emitted from now on.
    #[must_use]
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }
}
