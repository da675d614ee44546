//! Application state owned by the session task.

use crate::feed::{FeedOutcome, apply_change};
use crate::gateway::LoadSource;
use crate::model::{Initiative, InitiativeId};
use crate::remote::ChangeEvent;
use crate::store::LocalStore;
use crate::view::{View, ViewFilter};

/// A finished gateway network phase, ready to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Loaded {
        records: Vec<Initiative>,
        source: LoadSource,
    },
    Created(Initiative),
    Updated(Initiative),
    Deleted(InitiativeId),
}

/// Store, active filters and provenance of the current record set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub store: LocalStore,
    pub filter: ViewFilter,
    /// Where the last load came from; `None` before the first load lands.
    pub source: Option<LoadSource>,
    loading: bool,
    /// Ids created while a load was in flight. That load may have read the
    /// table before the insert committed.
    created_during_load: Vec<InitiativeId>,
}

impl AppState {
    #[must_use]
    pub fn new(filter: ViewFilter) -> Self {
        Self {
            store: LocalStore::new(),
            filter,
            source: None,
            loading: false,
            created_during_load: Vec::new(),
        }
    }

    /// Mark a load as in flight until [`AppState::end_load`].
    pub const fn begin_load(&mut self) {
        self.loading = true;
    }

    /// No load is in flight any more.
    pub fn end_load(&mut self) {
        self.loading = false;
        self.created_during_load.clear();
    }

    #[must_use]
    pub fn view(&self) -> View {
        View::compute(&self.store, &self.filter)
    }

    /// Apply a completion. Returns whether the store changed.
    ///
    /// An update for a record that is no longer held (a delete landed first)
    /// is dropped rather than re-added. A load keeps records created while it
    /// was in flight when its result does not contain them yet.
    pub fn apply(&mut self, completion: Completion) -> bool {
        match completion {
            Completion::Loaded {
                mut records,
                source,
            } => {
                let missing: Vec<Initiative> = self
                    .created_during_load
                    .iter()
                    .filter(|id| !records.iter().any(|r| &r.id == *id))
                    .filter_map(|id| self.store.find(id).cloned())
                    .collect();
                records.extend(missing);
                self.store.replace_all(records);
                self.source = Some(source);
                true
            }
            Completion::Created(record) => {
                if self.loading {
                    self.created_during_load.push(record.id.clone());
                }
                self.store.upsert(record);
                true
            }
            Completion::Updated(record) => {
                if !self.store.contains(&record.id) {
                    return false;
                }
                self.store.upsert(record);
                true
            }
            Completion::Deleted(id) => {
                self.created_during_load.retain(|created| created != &id);
                self.store.remove(&id).is_some()
            }
        }
    }

    /// Apply a pushed change event.
    pub fn apply_change(&mut self, event: ChangeEvent) -> FeedOutcome {
        apply_change(&mut self.store, event)
    }
}
