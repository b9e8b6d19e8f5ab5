use crate::chdb::{OnConflict, UpdateInfo};
use crate::pubsub::message::PodClusterFieldsUpdate;
use crate::recorder::resource::PodClusters;
use crate::tagrecorder::subscriber::{ChProjector, ChTx};
use crate::Result;
use ressync_common::ch::ChPodCluster;
use ressync_common::model::PodCluster;
use ressync_common::{ChKey, IdKey, Metadata, SourceRow};
use serde_json::json;

#[derive(Debug, Default)]
pub struct PodClusterProjector;

impl ChProjector for PodClusterProjector {
    type Resource = PodClusters;
    type Target = ChPodCluster;

    fn source_to_target(
        &self,
        md: &Metadata,
        source: &PodCluster,
    ) -> (Vec<IdKey>, Vec<ChPodCluster>) {
        let row = ChPodCluster {
            id: source.id,
            name: source.display_name(),
            team_id: md.team_id.clone(),
            domain_id: md.domain_id.clone(),
            sub_domain_id: md.sub_domain_id.clone(),
        };
        (vec![IdKey::new(source.id)], vec![row])
    }

    fn on_resource_updated(
        &self,
        source_id: i32,
        fields: &PodClusterFieldsUpdate,
        tx: &ChTx<'_, ChPodCluster>,
    ) -> Result<()> {
        let mut info = UpdateInfo::new();
        if fields.name.is_different() {
            info.insert("name", json!(fields.name.new_value()));
        }
        tx.update_or_sync(&IdKey::new(source_id), info)
    }

    fn soft_deleted_targets_updated(
        &self,
        targets: &[ChPodCluster],
        tx: &ChTx<'_, ChPodCluster>,
    ) -> Result<()> {
        tx.upsert(targets, &OnConflict::update_columns(IdKey::COLUMNS, &["name"]))?;
        Ok(())
    }
}
