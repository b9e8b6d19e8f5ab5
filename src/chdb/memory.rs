//! In-memory CH store backed by concurrent maps
//!
//! Per-key writes go through DashMap entries, so concurrent upserts of the
//! same key serialize and the last writer wins on conflicting columns.

use crate::chdb::{ChStore, ConflictAction, OnConflict, UpdateInfo};
use crate::{RessyncError, Result};
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::Ref;
use dashmap::DashMap;
use serde_json::{Map, Value};

#[derive(Default)]
pub struct MemoryChDb {
    tables: DashMap<String, DashMap<String, Value>>,
}

impl MemoryChDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_len(&self, table: &str) -> usize {
        self.tables.get(table).map(|t| t.len()).unwrap_or(0)
    }

    fn table(&self, name: &str) -> Ref<'_, String, DashMap<String, Value>> {
        if let Some(t) = self.tables.get(name) {
            return t;
        }
        self.tables.entry(name.to_string()).or_default().downgrade()
    }
}

fn as_object_mut<'v>(table: &str, value: &'v mut Value) -> Result<&'v mut Map<String, Value>> {
    value
        .as_object_mut()
        .ok_or_else(|| RessyncError::StoreError(format!("row in {} is not an object", table)))
}

fn unknown_column(table: &str, column: &str) -> RessyncError {
    RessyncError::UnknownColumn {
        table: table.to_string(),
        column: column.to_string(),
    }
}

impl ChStore for MemoryChDb {
    fn update(&self, table: &str, key: &str, info: &UpdateInfo) -> Result<bool> {
        let rows = self.table(table);
        let Some(mut row) = rows.get_mut(key) else {
            return Ok(false);
        };

        let obj = as_object_mut(table, row.value_mut())?;
        if let Some(column) = info.keys().find(|c| !obj.contains_key(**c)) {
            return Err(unknown_column(table, column));
        }
        for (column, value) in info {
            obj.insert((*column).to_string(), value.clone());
        }
        Ok(true)
    }

    fn upsert(
        &self,
        table: &str,
        rows: Vec<(String, Value)>,
        on_conflict: &OnConflict,
    ) -> Result<usize> {
        let existing = self.table(table);
        let mut written = 0;

        for (key, row) in rows {
            match existing.entry(key) {
                Entry::Vacant(e) => {
                    e.insert(row);
                    written += 1;
                }
                Entry::Occupied(mut e) => match &on_conflict.action {
                    ConflictAction::UpdateAll => {
                        e.insert(row);
                        written += 1;
                    }
                    ConflictAction::UpdateColumns(columns) => {
                        let current = as_object_mut(table, e.get_mut())?;
                        for column in columns {
                            let value = row
                                .get(*column)
                                .ok_or_else(|| unknown_column(table, column))?;
                            current.insert((*column).to_string(), value.clone());
                        }
                        written += 1;
                    }
                    ConflictAction::Nothing => {}
                },
            }
        }

        Ok(written)
    }

    fn delete(&self, table: &str, keys: &[String]) -> Result<usize> {
        let rows = self.table(table);
        Ok(keys.iter().filter(|k| rows.remove(*k).is_some()).count())
    }

    fn find(&self, table: &str, key: &str) -> Result<Option<Value>> {
        Ok(self
            .tables
            .get(table)
            .and_then(|rows| rows.get(key).map(|r| r.value().clone())))
    }

    fn scan(&self, table: &str) -> Result<Vec<Value>> {
        let Some(rows) = self.tables.get(table) else {
            return Ok(Vec::new());
        };

        Ok(rows.iter().map(|r| r.value().clone()).collect())
    }
}
