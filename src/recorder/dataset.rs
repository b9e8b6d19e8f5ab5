//! Reconciliation cache: last-known snapshot of every resource kind in one
//! scope, keyed by lcuuid.
//!
//! `DataSet` is a registry from `ResourceKind` to a typed `EntityStore`.
//! There is no insert/remove API on the cache itself; the diff algorithm
//! mutates the exposed stores directly.

use crate::recorder::diffbase::{self, DiffBaseEntity};
use ressync_common::{Metadata, ResourceKind};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Result of applying an entity to its store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Inserted,
    Replaced,
    /// Incoming sequence older than the stored one; store untouched
    Stale,
}

/// Last-known entities of one resource kind, keyed by lcuuid
#[derive(Debug, Clone)]
pub struct EntityStore<T: DiffBaseEntity> {
    items: HashMap<String, T>,
}

impl<T: DiffBaseEntity> EntityStore<T> {
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
        }
    }

    /// Insert keyed by the entity's lcuuid, returning the previous value
    pub fn insert(&mut self, entity: T) -> Option<T> {
        self.items.insert(entity.lcuuid().to_string(), entity)
    }

    /// Insert unless the stored entity carries a newer sequence.
    /// Equal sequences replace.
    pub fn apply(&mut self, entity: T) -> ApplyOutcome {
        match self.items.get(entity.lcuuid()) {
            Some(existing) if existing.sequence() > entity.sequence() => ApplyOutcome::Stale,
            Some(_) => {
                self.insert(entity);
                ApplyOutcome::Replaced
            }
            None => {
                self.insert(entity);
                ApplyOutcome::Inserted
            }
        }
    }

    pub fn get(&self, lcuuid: &str) -> Option<&T> {
        self.items.get(lcuuid)
    }

    pub fn get_mut(&mut self, lcuuid: &str) -> Option<&mut T> {
        self.items.get_mut(lcuuid)
    }

    pub fn remove(&mut self, lcuuid: &str) -> Option<T> {
        self.items.remove(lcuuid)
    }

    pub fn contains(&self, lcuuid: &str) -> bool {
        self.items.contains_key(lcuuid)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Lcuuids of entities last observed before `sequence`
    pub fn lcuuids_older_than(&self, sequence: u64) -> Vec<String> {
        let mut stale: Vec<String> = self
            .items
            .values()
            .filter(|e| e.sequence() < sequence)
            .map(|e| e.lcuuid().to_string())
            .collect();
        stale.sort();
        stale
    }
}

impl<T: DiffBaseEntity> Default for EntityStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

trait ErasedStore: Send + Sync {
    fn len(&self) -> usize;

    fn clone_box(&self) -> Box<dyn ErasedStore>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: DiffBaseEntity> ErasedStore for EntityStore<T> {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn clone_box(&self) -> Box<dyn ErasedStore> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// All entity stores for one metadata scope
pub struct DataSet {
    metadata: Arc<Metadata>,
    stores: BTreeMap<ResourceKind, Box<dyn ErasedStore>>,
}

impl DataSet {
    /// Create a cache with an empty store for every built-in kind
    pub fn new(metadata: Arc<Metadata>) -> Self {
        let mut ds = Self {
            metadata,
            stores: BTreeMap::new(),
        };
        ds.register::<diffbase::Region>();
        ds.register::<diffbase::Vpc>();
        ds.register::<diffbase::Network>();
        ds.register::<diffbase::Vm>();
        ds.register::<diffbase::PodCluster>();
        ds.register::<diffbase::PodNamespace>();
        ds.register::<diffbase::Pod>();
        ds.register::<diffbase::PodIngress>();
        ds.register::<diffbase::PodService>();
        ds
    }

    /// Add an empty store for `T` unless its kind is already registered
    pub fn register<T: DiffBaseEntity>(&mut self) {
        self.stores
            .entry(T::KIND)
            .or_insert_with(|| Box::new(EntityStore::<T>::new()));
    }

    pub fn metadata(&self) -> &Arc<Metadata> {
        &self.metadata
    }

    pub fn store<T: DiffBaseEntity>(&self) -> Option<&EntityStore<T>> {
        self.stores
            .get(&T::KIND)
            .and_then(|s| s.as_any().downcast_ref::<EntityStore<T>>())
    }

    /// Mutable store for `T`, registering it on first use
    pub fn store_mut<T: DiffBaseEntity>(&mut self) -> &mut EntityStore<T> {
        let store = self
            .stores
            .entry(T::KIND)
            .or_insert_with(|| Box::new(EntityStore::<T>::new()));

        if !store.as_any().is::<EntityStore<T>>() {
            // A different type claimed this kind; the last registration wins
            *store = Box::new(EntityStore::<T>::new());
        }

        match store.as_any_mut().downcast_mut::<EntityStore<T>>() {
            Some(s) => s,
            None => unreachable!("store for {} was just replaced", T::KIND),
        }
    }

    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.stores.keys().copied()
    }

    pub fn len_of(&self, kind: ResourceKind) -> usize {
        self.stores.get(&kind).map(|s| s.len()).unwrap_or(0)
    }

    pub fn total_len(&self) -> usize {
        self.stores.values().map(|s| s.len()).sum()
    }
}

impl Clone for DataSet {
    fn clone(&self) -> Self {
        Self {
            metadata: Arc::clone(&self.metadata),
            stores: self
                .stores
                .iter()
                .map(|(k, s)| (*k, s.clone_box()))
                .collect(),
        }
    }
}

impl std::fmt::Debug for DataSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (kind, store) in &self.stores {
            map.entry(&kind.as_str(), &store.len());
        }
        map.finish()
    }
}
