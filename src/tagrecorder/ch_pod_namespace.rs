use crate::chdb::{OnConflict, UpdateInfo};
use crate::pubsub::message::PodNamespaceFieldsUpdate;
use crate::recorder::resource::PodNamespaces;
use crate::tagrecorder::subscriber::{ChProjector, ChTx};
use crate::Result;
use ressync_common::ch::ChPodNs;
use ressync_common::model::PodNamespace;
use ressync_common::{ChKey, IdKey, Metadata, SourceRow};
use serde_json::json;

/// Projects pod namespaces into `ch_pod_ns`
#[derive(Debug, Default)]
pub struct PodNamespaceProjector;

impl ChProjector for PodNamespaceProjector {
    type Resource = PodNamespaces;
    type Target = ChPodNs;

    fn source_to_target(&self, md: &Metadata, source: &PodNamespace) -> (Vec<IdKey>, Vec<ChPodNs>) {
        let row = ChPodNs {
            id: source.id,
            name: source.display_name(),
            pod_cluster_id: source.pod_cluster_id,
            team_id: md.team_id.clone(),
            domain_id: md.domain_id.clone(),
            sub_domain_id: md.sub_domain_id.clone(),
        };
        (vec![IdKey::new(source.id)], vec![row])
    }

    fn on_resource_updated(
        &self,
        source_id: i32,
        fields: &PodNamespaceFieldsUpdate,
        tx: &ChTx<'_, ChPodNs>,
    ) -> Result<()> {
        let mut info = UpdateInfo::new();
        if fields.name.is_different() {
            info.insert("name", json!(fields.name.new_value()));
        }
        if fields.pod_cluster_id.is_different() {
            info.insert("pod_cluster_id", json!(fields.pod_cluster_id.new_value()));
        }
        tx.update_or_sync(&IdKey::new(source_id), info)
    }

    fn soft_deleted_targets_updated(
        &self,
        targets: &[ChPodNs],
        tx: &ChTx<'_, ChPodNs>,
    ) -> Result<()> {
        tx.upsert(targets, &OnConflict::update_columns(IdKey::COLUMNS, &["name"]))?;
        Ok(())
    }
}
