//! Store handle for CH tables
//!
//! `ChStore` is object safe and works on JSON rows addressed by an encoded
//! key; `ChTable` is the typed view subscribers use.

pub mod memory;

pub use memory::MemoryChDb;

use crate::Result;
use ressync_common::ChRow;
use serde_json::Value;
use std::collections::BTreeMap;
use std::marker::PhantomData;

/// Column name to new value, for targeted updates
pub type UpdateInfo = BTreeMap<&'static str, Value>;

/// What an upsert does when a row with the same key already exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictAction {
    UpdateAll,
    UpdateColumns(Vec<&'static str>),
    Nothing,
}

/// Conflict clause of an upsert: the key columns and the action on collision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnConflict {
    pub columns: Vec<&'static str>,
    pub action: ConflictAction,
}

impl OnConflict {
    pub fn update_all(key_columns: &[&'static str]) -> Self {
        Self {
            columns: key_columns.to_vec(),
            action: ConflictAction::UpdateAll,
        }
    }

    pub fn update_columns(key_columns: &[&'static str], columns: &[&'static str]) -> Self {
        Self {
            columns: key_columns.to_vec(),
            action: ConflictAction::UpdateColumns(columns.to_vec()),
        }
    }

    pub fn do_nothing(key_columns: &[&'static str]) -> Self {
        Self {
            columns: key_columns.to_vec(),
            action: ConflictAction::Nothing,
        }
    }
}

/// Handle to the denormalized store.
///
/// Each single-row write must be atomic; batches need not be.
pub trait ChStore: Send + Sync {
    /// Overwrite `info` columns of the row at `key`.
    /// Returns `false` when no such row exists.
    fn update(&self, table: &str, key: &str, info: &UpdateInfo) -> Result<bool>;

    /// Insert rows, resolving key collisions with `on_conflict`.
    /// Returns the number of rows inserted or modified.
    fn upsert(
        &self,
        table: &str,
        rows: Vec<(String, Value)>,
        on_conflict: &OnConflict,
    ) -> Result<usize>;

    fn delete(&self, table: &str, keys: &[String]) -> Result<usize>;

    fn find(&self, table: &str, key: &str) -> Result<Option<Value>>;

    /// Every row of `table`, in no particular order
    fn scan(&self, table: &str) -> Result<Vec<Value>>;
}

/// Typed view of one CH table
pub struct ChTable<'a, R: ChRow> {
    store: &'a dyn ChStore,
    _row: PhantomData<fn() -> R>,
}

impl<'a, R: ChRow> ChTable<'a, R> {
    pub fn new(store: &'a dyn ChStore) -> Self {
        Self {
            store,
            _row: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        R::TABLE
    }

    pub fn update(&self, key: &R::Key, info: &UpdateInfo) -> Result<bool> {
        self.store.update(R::TABLE, &encode_key(key)?, info)
    }

    pub fn upsert(&self, rows: &[R], on_conflict: &OnConflict) -> Result<usize> {
        let encoded = rows
            .iter()
            .map(|row| -> Result<(String, Value)> {
                Ok((encode_key(&row.key())?, serde_json::to_value(row)?))
            })
            .collect::<Result<Vec<_>>>()?;
        self.store.upsert(R::TABLE, encoded, on_conflict)
    }

    pub fn delete(&self, keys: &[R::Key]) -> Result<usize> {
        let encoded = keys.iter().map(encode_key).collect::<Result<Vec<_>>>()?;
        self.store.delete(R::TABLE, &encoded)
    }

    pub fn find(&self, key: &R::Key) -> Result<Option<R>> {
        match self.store.find(R::TABLE, &encode_key(key)?)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Every row, ordered by key
    pub fn rows(&self) -> Result<Vec<R>> {
        let mut rows = self
            .store
            .scan(R::TABLE)?
            .into_iter()
            .map(|value| -> Result<R> { Ok(serde_json::from_value(value)?) })
            .collect::<Result<Vec<R>>>()?;
        rows.sort_by_key(|row| row.key());
        Ok(rows)
    }
}

fn encode_key<K: serde::Serialize>(key: &K) -> Result<String> {
    Ok(serde_json::to_string(key)?)
}
