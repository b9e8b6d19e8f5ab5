//! In-memory source store: one table of source rows per resource kind
//!
//! Allocates integer IDs, resolves parent lcuuids to IDs, and applies the
//! per-kind deletion policy (soft delete keeps the row with `deleted_at`).

use chrono::{DateTime, Utc};
use ressync_common::{ResourceKind, SourceRow};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SourceTable<S: SourceRow> {
    rows: BTreeMap<i32, S>,
    by_lcuuid: HashMap<String, i32>,
    next_id: i32,
}

impl<S: SourceRow> SourceTable<S> {
    pub fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            by_lcuuid: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert a new row, allocating its ID.
    ///
    /// A soft-deleted row with the same lcuuid is restored in place and keeps
    /// its ID.
    pub fn insert(&mut self, mut row: S) -> S {
        let id = match self.by_lcuuid.get(row.lcuuid()) {
            Some(id) => {
                debug!("Restoring {} {} (id {})", S::KIND, row.lcuuid(), id);
                *id
            }
            None => {
                let id = self.next_id;
                self.next_id += 1;
                self.by_lcuuid.insert(row.lcuuid().to_string(), id);
                id
            }
        };

        row.set_id(id);
        row.set_deleted_at(None);
        self.rows.insert(id, row.clone());
        row
    }

    /// Replace the row with the same ID, returning the previous one
    pub fn update(&mut self, row: S) -> Option<S> {
        if !self.rows.contains_key(&row.id()) {
            return None;
        }
        self.rows.insert(row.id(), row)
    }

    /// Delete by lcuuid following the kind's deletion policy.
    ///
    /// Returns the row as subscribers should see it: with `deleted_at` set.
    pub fn delete(&mut self, lcuuid: &str, now: DateTime<Utc>) -> Option<S> {
        let id = *self.by_lcuuid.get(lcuuid)?;

        if S::SOFT_DELETE {
            let row = self.rows.get_mut(&id)?;
            row.set_deleted_at(Some(now));
            Some(row.clone())
        } else {
            self.by_lcuuid.remove(lcuuid);
            let mut row = self.rows.remove(&id)?;
            row.set_deleted_at(Some(now));
            Some(row)
        }
    }

    pub fn get(&self, id: i32) -> Option<&S> {
        self.rows.get(&id)
    }

    pub fn get_by_lcuuid(&self, lcuuid: &str) -> Option<&S> {
        self.by_lcuuid.get(lcuuid).and_then(|id| self.rows.get(id))
    }

    /// ID of the live (not soft-deleted) row with this lcuuid
    pub fn live_id(&self, lcuuid: &str) -> Option<i32> {
        self.get_by_lcuuid(lcuuid)
            .filter(|row| !row.is_soft_deleted())
            .map(|row| row.id())
    }

    pub fn rows(&self) -> impl Iterator<Item = &S> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<S: SourceRow> Default for SourceTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Source tables of every resource kind
#[derive(Default)]
pub struct MetaDb {
    tables: HashMap<ResourceKind, Box<dyn Any + Send + Sync>>,
}

impl MetaDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table<S: SourceRow>(&self) -> Option<&SourceTable<S>> {
        self.tables
            .get(&S::KIND)
            .and_then(|t| t.downcast_ref::<SourceTable<S>>())
    }

    pub fn table_mut<S: SourceRow>(&mut self) -> &mut SourceTable<S> {
        let table = self
            .tables
            .entry(S::KIND)
            .or_insert_with(|| Box::new(SourceTable::<S>::new()));

        if !table.is::<SourceTable<S>>() {
            *table = Box::new(SourceTable::<S>::new());
        }

        match table.downcast_mut::<SourceTable<S>>() {
            Some(t) => t,
            None => unreachable!("table for {} was just replaced", S::KIND),
        }
    }

    /// Resolve a parent reference; soft-deleted parents do not resolve
    pub fn live_id<S: SourceRow>(&self, lcuuid: &str) -> Option<i32> {
        self.table::<S>().and_then(|t| t.live_id(lcuuid))
    }

    pub fn get_by_lcuuid<S: SourceRow>(&self, lcuuid: &str) -> Option<&S> {
        self.table::<S>().and_then(|t| t.get_by_lcuuid(lcuuid))
    }

    /// Every row of the kind, live and soft-deleted, ordered by ID
    pub fn rows<S: SourceRow>(&self) -> Vec<S> {
        self.table::<S>()
            .map(|t| t.rows().cloned().collect())
            .unwrap_or_default()
    }
}
