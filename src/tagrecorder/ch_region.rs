use crate::chdb::{OnConflict, UpdateInfo};
use crate::pubsub::message::RegionFieldsUpdate;
use crate::recorder::resource::Regions;
use crate::tagrecorder::subscriber::{ChProjector, ChTx};
use crate::Result;
use ressync_common::ch::ChRegion;
use ressync_common::model::Region;
use ressync_common::{ChKey, IdKey, Metadata, SourceRow};
use serde_json::json;

/// Projects regions into `ch_region`. Regions are removed outright on delete.
#[derive(Debug, Default)]
pub struct RegionProjector;

impl ChProjector for RegionProjector {
    type Resource = Regions;
    type Target = ChRegion;

    const SOFT_DELETE: bool = false;

    fn source_to_target(&self, _md: &Metadata, source: &Region) -> (Vec<IdKey>, Vec<ChRegion>) {
        let row = ChRegion {
            id: source.id,
            name: source.display_name(),
        };
        (vec![IdKey::new(source.id)], vec![row])
    }

    fn on_resource_updated(
        &self,
        source_id: i32,
        fields: &RegionFieldsUpdate,
        tx: &ChTx<'_, ChRegion>,
    ) -> Result<()> {
        let mut info = UpdateInfo::new();
        if fields.name.is_different() {
            info.insert("name", json!(fields.name.new_value()));
        }
        tx.update_or_sync(&IdKey::new(source_id), info)
    }

    fn soft_deleted_targets_updated(
        &self,
        targets: &[ChRegion],
        tx: &ChTx<'_, ChRegion>,
    ) -> Result<()> {
        tx.upsert(targets, &OnConflict::update_columns(IdKey::COLUMNS, &["name"]))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chdb::{ChStore, ChTable, MemoryChDb};
    use crate::config::TagRecorderConfig;
    use crate::metrics::Metrics;
    use crate::pubsub::message::{Added, Deleted};
    use crate::pubsub::ResourceSubscriber;
    use crate::tagrecorder::subscriber::SubscriberComponent;
    use std::sync::Arc;

    #[test]
    fn test_region_delete_removes_row() {
        let store = Arc::new(MemoryChDb::new());
        let sub = SubscriberComponent::new(
            RegionProjector,
            store.clone() as Arc<dyn ChStore>,
            Arc::new(Metrics::new().unwrap()),
            TagRecorderConfig::default(),
        );
        let md = Metadata::default();
        let region = Region {
            id: 1,
            lcuuid: "r1".to_string(),
            name: "east".to_string(),
            ..Default::default()
        };

        sub.on_batch_added(&md, &Added { items: vec![region.clone()] })
            .unwrap();
        assert_eq!(store.table_len("ch_region"), 1);

        // a soft-delete message still removes rows for a hard-deleting projector
        sub.on_batch_deleted(
            &md,
            &Deleted {
                items: vec![region],
                soft_delete: true,
            },
        )
        .unwrap();
        assert!(ChTable::<ChRegion>::new(store.as_ref())
            .rows()
            .unwrap()
            .is_empty());
    }
}
