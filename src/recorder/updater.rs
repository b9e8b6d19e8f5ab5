//! One reconciliation cycle over a working copy of the cache
//!
//! Live items are applied kind by kind, parents first, so children can
//! resolve parent IDs added in the same cycle. Entities the cycle did not
//! observe are then removed children first.
//!
//! The recorder only starts a cycle whose sequence is newer than every
//! cached entry, so each live item carrying over from the cache wins its
//! sequence comparison.

use crate::metrics::{Metrics, RecorderEvent};
use crate::pubsub::message::{Added, ChangedFields, Deleted, Updated};
use crate::pubsub::PubSubHub;
use crate::recorder::dataset::DataSet;
use crate::recorder::diffbase::DiffBaseEntity;
use crate::recorder::metadb::MetaDb;
use crate::recorder::resource::Resource;
use crate::{RessyncError, Result};
use chrono::{DateTime, Utc};
use ressync_common::{Metadata, ResourceKind, SourceRow};
use serde::Serialize;
use tracing::{debug, warn};

/// Counts of what one cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub sequence: u64,
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    /// The whole snapshot was older than the cache and ignored
    pub stale: bool,
}

impl CycleSummary {
    pub fn changes(&self) -> usize {
        self.added + self.updated + self.deleted
    }
}

enum UpdateOutcome {
    Published,
    Unchanged,
    Skipped,
}

pub(crate) struct Cycle<'a> {
    md: &'a Metadata,
    cache: &'a mut DataSet,
    db: &'a mut MetaDb,
    hub: &'a PubSubHub,
    metrics: &'a Metrics,
    sequence: u64,
    now: DateTime<Utc>,
    summary: CycleSummary,
    first_err: Option<RessyncError>,
}

impl<'a> Cycle<'a> {
    pub(crate) fn new(
        md: &'a Metadata,
        cache: &'a mut DataSet,
        db: &'a mut MetaDb,
        hub: &'a PubSubHub,
        metrics: &'a Metrics,
        sequence: u64,
    ) -> Self {
        Self {
            md,
            cache,
            db,
            hub,
            metrics,
            sequence,
            now: Utc::now(),
            summary: CycleSummary {
                sequence,
                ..Default::default()
            },
            first_err: None,
        }
    }

    /// Summary of the cycle and the first subscriber failure, if any
    pub(crate) fn finish(self) -> (CycleSummary, Option<RessyncError>) {
        (self.summary, self.first_err)
    }

    fn track(&mut self, result: Result<()>) {
        if let Err(e) = result {
            self.first_err.get_or_insert(e);
        }
    }

    fn count(&mut self, kind: ResourceKind, event: RecorderEvent, n: usize) {
        if n == 0 {
            return;
        }
        self.metrics.record_event(kind, event, n);
        match event {
            RecorderEvent::Added => self.summary.added += n,
            RecorderEvent::Updated => self.summary.updated += n,
            RecorderEvent::Deleted => self.summary.deleted += n,
            RecorderEvent::Skipped => self.summary.skipped += n,
        }
    }

    /// Diff the live items of one kind against the cache
    pub(crate) fn apply_live<R: Resource>(&mut self, live: &[R::DiffBase]) {
        let mut added = Vec::new();
        let mut updated = 0;
        let mut skipped = 0;

        for item in live {
            let mut item = item.clone();
            item.set_sequence(self.sequence);

            // a cached entry without a live source row is treated as new
            let cached = match self.db.live_id::<R::Source>(item.lcuuid()) {
                Some(_) => self
                    .cache
                    .store_mut::<R::DiffBase>()
                    .get(item.lcuuid())
                    .cloned(),
                None => None,
            };

            match cached {
                None => match self.add::<R>(&item) {
                    Some(source) => {
                        self.cache.store_mut::<R::DiffBase>().insert(item);
                        added.push(source);
                    }
                    None => skipped += 1,
                },
                Some(old) if old.same_content(&item) => {
                    self.cache.store_mut::<R::DiffBase>().apply(item);
                }
                Some(_) => match self.update::<R>(&item) {
                    UpdateOutcome::Skipped => {
                        // keep the old content so the next cycle retries the diff
                        if let Some(entry) =
                            self.cache.store_mut::<R::DiffBase>().get_mut(item.lcuuid())
                        {
                            entry.set_sequence(self.sequence);
                        }
                        skipped += 1;
                    }
                    outcome => {
                        self.cache.store_mut::<R::DiffBase>().apply(item);
                        if matches!(outcome, UpdateOutcome::Published) {
                            updated += 1;
                        }
                    }
                },
            }
        }

        self.count(R::KIND, RecorderEvent::Added, added.len());
        self.count(R::KIND, RecorderEvent::Updated, updated);
        self.count(R::KIND, RecorderEvent::Skipped, skipped);

        if !added.is_empty() {
            debug!("{} {} added", added.len(), R::KIND);
            let result = self
                .hub
                .publish_added::<R>(self.md, &Added { items: added });
            self.track(result);
        }
    }

    /// Remove entities of one kind the cycle did not observe
    pub(crate) fn remove_unseen<R: Resource>(&mut self) {
        let lcuuids = self
            .cache
            .store_mut::<R::DiffBase>()
            .lcuuids_older_than(self.sequence);
        if lcuuids.is_empty() {
            return;
        }

        let mut items = Vec::with_capacity(lcuuids.len());
        for lcuuid in &lcuuids {
            self.cache.store_mut::<R::DiffBase>().remove(lcuuid);
            match self.db.table_mut::<R::Source>().delete(lcuuid, self.now) {
                Some(row) => items.push(row),
                None => warn!("{} {} cached without a source row", R::KIND, lcuuid),
            }
        }

        self.count(R::KIND, RecorderEvent::Deleted, items.len());
        debug!("{} {} deleted", items.len(), R::KIND);
        let msg = Deleted {
            items,
            soft_delete: <R::Source as SourceRow>::SOFT_DELETE,
        };
        let result = self.hub.publish_deleted::<R>(self.md, &msg);
        self.track(result);
    }

    fn add<R: Resource>(&mut self, item: &R::DiffBase) -> Option<R::Source> {
        match R::to_source(item, self.db) {
            Ok(source) => Some(self.db.table_mut::<R::Source>().insert(source)),
            Err(missing) => {
                warn!("Skipping {} {}: {}", R::KIND, item.lcuuid(), missing);
                None
            }
        }
    }

    fn update<R: Resource>(&mut self, item: &R::DiffBase) -> UpdateOutcome {
        let Some(old) = self.db.get_by_lcuuid::<R::Source>(item.lcuuid()).cloned() else {
            return UpdateOutcome::Skipped;
        };

        let mut new = match R::to_source(item, self.db) {
            Ok(source) => source,
            Err(missing) => {
                warn!("Skipping update of {} {}: {}", R::KIND, item.lcuuid(), missing);
                return UpdateOutcome::Skipped;
            }
        };
        new.set_id(old.id());

        let fields = R::fields_update(&old, &new);
        self.db.table_mut::<R::Source>().update(new.clone());
        if !fields.has_changes() {
            return UpdateOutcome::Unchanged;
        }

        debug!("{} {} updated", R::KIND, item.lcuuid());
        let result = self
            .hub
            .publish_updated::<R>(self.md, &Updated { fields, new });
        self.track(result);
        UpdateOutcome::Published
    }
}
