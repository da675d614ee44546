//! Folding pushed change events into the local collection.
//!
//! Events may echo this client's own writes, arrive for ids that were never
//! loaded, or refer to records already deleted. None of these are errors.

use tracing::trace;

use crate::mapper::from_remote;
use crate::remote::ChangeEvent;
use crate::store::LocalStore;

/// Whether an event changed the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    Applied,
    Ignored,
}

impl FeedOutcome {
    #[must_use]
    pub const fn applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Apply one event.
///
/// - Insert: added unless the id is already present (the echo of a local
///   create has already been appended).
/// - Update: replaces the record, or adds it if unknown.
/// - Delete: removes the record if present.
pub fn apply_change(store: &mut LocalStore, event: ChangeEvent) -> FeedOutcome {
    trace!(kind = event.kind(), id = %event.id(), "applying change");
    match event {
        ChangeEvent::Insert(row) => {
            if store.contains(&row.id) {
                return FeedOutcome::Ignored;
            }
            store.upsert(from_remote(row));
            FeedOutcome::Applied
        }
        ChangeEvent::Update(row) => {
            let incoming = from_remote(row);
            if store.find(&incoming.id) == Some(&incoming) {
                return FeedOutcome::Ignored;
            }
            store.upsert(incoming);
            FeedOutcome::Applied
        }
        ChangeEvent::Delete { id } => {
            if store.remove(&id).is_some() {
                FeedOutcome::Applied
            } else {
                FeedOutcome::Ignored
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FeedOutcome, apply_change};
    use crate::mapper::to_remote;
    use crate::model::{Initiative, InitiativeId, Status, starter_initiatives};
    use crate::remote::ChangeEvent;
    use crate::store::LocalStore;
    use chrono::Utc;

    fn record(id: &str) -> Initiative {
        Initiative::from_fields(InitiativeId::from(id), starter_initiatives().remove(1))
    }

    #[test]
    fn insert_echo_is_not_duplicated() {
        let mut store = LocalStore::from_records([record("a")]);
        let echo = ChangeEvent::Insert(to_remote(&record("a"), Utc::now()));
        assert_eq!(apply_change(&mut store, echo), FeedOutcome::Ignored);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn insert_from_another_client_is_appended() {
        let mut store = LocalStore::from_records([record("a")]);
        let event = ChangeEvent::Insert(to_remote(&record("b"), Utc::now()));
        assert!(apply_change(&mut store, event).applied());
        assert_eq!(store.to_vec()[1].id.as_str(), "b");
    }

    #[test]
    fn update_replaces_or_adds() {
        let mut store = LocalStore::from_records([record("a")]);
        let mut changed = record("a");
        changed.fields.status = Status::Completed;
        changed.fields.progress = 100;

        let event = ChangeEvent::Update(to_remote(&changed, Utc::now()));
        assert!(apply_change(&mut store, event).applied());
        assert_eq!(store.find(&changed.id), Some(&changed));

        let unseen = ChangeEvent::Update(to_remote(&record("q"), Utc::now()));
        assert!(apply_change(&mut store, unseen).applied());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn identical_update_is_ignored() {
        let mut store = LocalStore::from_records([record("a")]);
        let event = ChangeEvent::Update(to_remote(&record("a"), Utc::now()));
        assert_eq!(apply_change(&mut store, event), FeedOutcome::Ignored);
    }

    #[test]
    fn delete_of_unknown_id_is_a_no_op() {
        let mut store = LocalStore::from_records([record("a")]);
        let event = ChangeEvent::Delete {
            id: InitiativeId::from("missing"),
        };
        assert_eq!(apply_change(&mut store, event), FeedOutcome::Ignored);
        assert_eq!(store.len(), 1);

        let event = ChangeEvent::Delete {
            id: InitiativeId::from("a"),
        };
        assert!(apply_change(&mut store, event).applied());
        assert!(store.is_empty());
    }
}
