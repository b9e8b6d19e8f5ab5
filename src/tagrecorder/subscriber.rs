//! Generic change subscriber
//!
//! `SubscriberComponent` turns one resource kind's add/update/delete
//! messages into writes against a CH table. The kind-specific part is a
//! `ChProjector`, which only supplies the projection and the column-level
//! update logic.

use crate::chdb::{ChStore, ChTable, OnConflict, UpdateInfo};
use crate::config::TagRecorderConfig;
use crate::metrics::{ChOp, Metrics};
use crate::pubsub::message::{Added, ChangedFields, Deleted, Updated};
use crate::pubsub::ResourceSubscriber;
use crate::recorder::metadb::MetaDb;
use crate::recorder::resource::Resource;
use crate::Result;
use ressync_common::{ChKey, ChRow, Metadata, SourceRow};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub type SourceOf<P> = <<P as ChProjector>::Resource as Resource>::Source;
pub type FieldsOf<P> = <<P as ChProjector>::Resource as Resource>::FieldsUpdate;
pub type KeyOf<P> = <<P as ChProjector>::Target as ChRow>::Key;

/// Kind-specific half of a change subscriber
pub trait ChProjector: Sized + Send + Sync + 'static {
    type Resource: Resource;
    type Target: ChRow;

    /// Keep rows of soft-deleted sources, rewriting their display columns
    const SOFT_DELETE: bool = true;

    /// Project one source row into zero or more CH rows, with parallel keys.
    /// Must not depend on anything but its arguments.
    fn source_to_target(
        &self,
        md: &Metadata,
        source: &SourceOf<Self>,
    ) -> (Vec<KeyOf<Self>>, Vec<Self::Target>);

    /// Apply the changed fields of `source_id` as targeted column updates
    fn on_resource_updated(
        &self,
        source_id: i32,
        fields: &FieldsOf<Self>,
        tx: &ChTx<'_, Self::Target>,
    ) -> Result<()>;

    /// Re-upsert rows whose source is soft-deleted, overwriting only the
    /// columns that reflect the deletion
    fn soft_deleted_targets_updated(
        &self,
        targets: &[Self::Target],
        tx: &ChTx<'_, Self::Target>,
    ) -> Result<()>;
}

/// Write handle given to projectors for one CH table
pub struct ChTx<'a, R: ChRow> {
    table: ChTable<'a, R>,
    op: ChOp,
    batch_size: usize,
    sync_on_missing: bool,
    needs_sync: &'a AtomicBool,
    metrics: &'a Metrics,
}

impl<'a, R: ChRow> ChTx<'a, R> {
    pub fn table(&self) -> &ChTable<'a, R> {
        &self.table
    }

    /// Targeted update of `info` columns at `key`.
    ///
    /// An empty map is a no-op. A missing row flags the table for a full
    /// re-sync instead of inserting a partial row.
    pub fn update_or_sync(&self, key: &R::Key, info: UpdateInfo) -> Result<()> {
        if info.is_empty() {
            return Ok(());
        }

        if self.table.update(key, &info)? {
            self.metrics.record_rows(R::TABLE, ChOp::Update, 1);
            debug!("Updated {} {:?}: {:?}", R::TABLE, key, info.keys());
        } else {
            warn!("Update of {} {:?} found no row", R::TABLE, key);
            if self.sync_on_missing {
                self.needs_sync.store(true, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    /// Upsert in pages of at most `batch_size` rows, one store call per page
    pub fn upsert(&self, rows: &[R], on_conflict: &OnConflict) -> Result<usize> {
        let mut written = 0;
        for page in rows.chunks(self.batch_size) {
            written += self.table.upsert(page, on_conflict)?;
        }
        self.metrics.record_rows(R::TABLE, self.op, written);
        Ok(written)
    }

    pub fn delete(&self, keys: &[R::Key]) -> Result<usize> {
        let mut removed = 0;
        for page in keys.chunks(self.batch_size) {
            removed += self.table.delete(page)?;
        }
        self.metrics.record_rows(R::TABLE, ChOp::Delete, removed);
        Ok(removed)
    }
}

/// Re-projects a whole CH table from the source store on demand
pub trait TableSync: Send + Sync {
    fn table(&self) -> &'static str;

    fn needs_sync(&self) -> bool;

    /// Re-project every source row if a previous update found a row missing.
    /// Returns whether a sync ran.
    fn sync_if_needed(&self, md: &Metadata, db: &MetaDb) -> Result<bool>;
}

pub struct SubscriberComponent<P: ChProjector> {
    projector: P,
    store: Arc<dyn ChStore>,
    metrics: Arc<Metrics>,
    config: TagRecorderConfig,
    needs_sync: AtomicBool,
}

impl<P: ChProjector> SubscriberComponent<P> {
    pub fn new(
        projector: P,
        store: Arc<dyn ChStore>,
        metrics: Arc<Metrics>,
        config: TagRecorderConfig,
    ) -> Self {
        Self {
            projector,
            store,
            metrics,
            config,
            needs_sync: AtomicBool::new(false),
        }
    }

    pub fn projector(&self) -> &P {
        &self.projector
    }

    pub fn tx(&self, op: ChOp) -> ChTx<'_, P::Target> {
        ChTx {
            table: ChTable::new(self.store.as_ref()),
            op,
            batch_size: self.config.batch_size.max(1),
            sync_on_missing: self.config.sync_on_missing,
            needs_sync: &self.needs_sync,
            metrics: &self.metrics,
        }
    }

    fn project_all(
        &self,
        md: &Metadata,
        sources: &[SourceOf<P>],
    ) -> (Vec<KeyOf<P>>, Vec<P::Target>) {
        let mut keys = Vec::with_capacity(sources.len());
        let mut targets = Vec::with_capacity(sources.len());
        for source in sources {
            let (k, t) = self.projector.source_to_target(md, source);
            keys.extend(k);
            targets.extend(t);
        }
        (keys, targets)
    }

    /// Upsert the projection of every given source row
    pub fn sync(&self, md: &Metadata, sources: &[SourceOf<P>]) -> Result<usize> {
        let (_, targets) = self.project_all(md, sources);
        let tx = self.tx(ChOp::Sync);
        tx.upsert(&targets, &OnConflict::update_all(<KeyOf<P> as ChKey>::COLUMNS))
    }
}

impl<P: ChProjector> ResourceSubscriber<P::Resource> for SubscriberComponent<P> {
    fn on_batch_added(&self, md: &Metadata, msg: &Added<SourceOf<P>>) -> Result<()> {
        let (_, targets) = self.project_all(md, &msg.items);
        let written = self
            .tx(ChOp::Upsert)
            .upsert(&targets, &OnConflict::update_all(<KeyOf<P> as ChKey>::COLUMNS))?;
        debug!(
            "{} rows written to {} for {} added",
            written,
            P::Target::TABLE,
            msg.items.len()
        );
        Ok(())
    }

    fn on_updated(&self, md: &Metadata, msg: &Updated<SourceOf<P>, FieldsOf<P>>) -> Result<()> {
        if P::SOFT_DELETE && msg.new.is_soft_deleted() {
            let (_, targets) = self.projector.source_to_target(md, &msg.new);
            return self
                .projector
                .soft_deleted_targets_updated(&targets, &self.tx(ChOp::SoftDelete));
        }

        self.projector
            .on_resource_updated(msg.fields.key().id, &msg.fields, &self.tx(ChOp::Update))
    }

    fn on_batch_deleted(&self, md: &Metadata, msg: &Deleted<SourceOf<P>>) -> Result<()> {
        let (keys, targets) = self.project_all(md, &msg.items);

        if msg.soft_delete && P::SOFT_DELETE {
            self.projector
                .soft_deleted_targets_updated(&targets, &self.tx(ChOp::SoftDelete))
        } else {
            let removed = self.tx(ChOp::Delete).delete(&keys)?;
            debug!("{} rows removed from {}", removed, P::Target::TABLE);
            Ok(())
        }
    }
}

impl<P: ChProjector> TableSync for SubscriberComponent<P> {
    fn table(&self) -> &'static str {
        P::Target::TABLE
    }

    fn needs_sync(&self) -> bool {
        self.needs_sync.load(Ordering::SeqCst)
    }

    fn sync_if_needed(&self, md: &Metadata, db: &MetaDb) -> Result<bool> {
        if !self.needs_sync.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }

        let sources = db.rows::<SourceOf<P>>();
        match self.sync(md, &sources) {
            Ok(written) => {
                info!(
                    "Synced {}: {} rows from {} sources",
                    P::Target::TABLE,
                    written,
                    sources.len()
                );
                Ok(true)
            }
            Err(e) => {
                self.needs_sync.store(true, Ordering::SeqCst);
                Err(e)
            }
        }
    }
}
