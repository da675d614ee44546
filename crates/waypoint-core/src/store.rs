//! Ordered in-memory collection of initiatives.
//!
//! Order is the order records were first seen: the load order from the
//! remote (creation time ascending), then insertion order for anything added
//! afterwards. Replacing a record keeps its position.

use indexmap::IndexMap;

use crate::model::{Initiative, InitiativeId};

/// Result of [`LocalStore::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
}

/// The local record set, at most one record per id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalStore {
    records: IndexMap<InitiativeId, Initiative>,
}

impl LocalStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from records in order. A later duplicate id replaces the
    /// earlier record in place.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = Initiative>) -> Self {
        let mut store = Self::new();
        store.replace_all(records);
        store
    }

    /// Swap the whole collection for `records`.
    pub fn replace_all(&mut self, records: impl IntoIterator<Item = Initiative>) {
        self.records.clear();
        for record in records {
            self.upsert(record);
        }
    }

    /// Insert a new record at the end, or replace the record with the same id
    /// without moving it.
    pub fn upsert(&mut self, record: Initiative) -> Upsert {
        match self.records.insert(record.id.clone(), record) {
            Some(_) => Upsert::Replaced,
            None => Upsert::Inserted,
        }
    }

    /// Remove by id. Absent ids are not an error.
    pub fn remove(&mut self, id: &InitiativeId) -> Option<Initiative> {
        self.records.shift_remove(id)
    }

    #[must_use]
    pub fn find(&self, id: &InitiativeId) -> Option<&Initiative> {
        self.records.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &InitiativeId) -> bool {
        self.records.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Initiative> {
        self.records.values()
    }

    /// Owned copy of every record in order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Initiative> {
        self.records.values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
