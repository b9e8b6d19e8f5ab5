use crate::chdb::{OnConflict, UpdateInfo};
use crate::pubsub::message::PodFieldsUpdate;
use crate::recorder::resource::Pods;
use crate::tagrecorder::subscriber::{ChProjector, ChTx};
use crate::Result;
use ressync_common::ch::ChPod;
use ressync_common::model::Pod;
use ressync_common::{ChKey, IdKey, Metadata, SourceRow};
use serde_json::json;

/// Projects pods into `ch_pod`
#[derive(Debug, Default)]
pub struct PodProjector;

impl ChProjector for PodProjector {
    type Resource = Pods;
    type Target = ChPod;

    fn source_to_target(&self, md: &Metadata, source: &Pod) -> (Vec<IdKey>, Vec<ChPod>) {
        let row = ChPod {
            id: source.id,
            name: source.display_name(),
            pod_cluster_id: source.pod_cluster_id,
            pod_ns_id: source.pod_namespace_id,
            team_id: md.team_id.clone(),
            domain_id: md.domain_id.clone(),
            sub_domain_id: md.sub_domain_id.clone(),
        };
        (vec![IdKey::new(source.id)], vec![row])
    }

    fn on_resource_updated(
        &self,
        source_id: i32,
        fields: &PodFieldsUpdate,
        tx: &ChTx<'_, ChPod>,
    ) -> Result<()> {
        let mut info = UpdateInfo::new();
        if fields.name.is_different() {
            info.insert("name", json!(fields.name.new_value()));
        }
        if fields.pod_cluster_id.is_different() {
            info.insert("pod_cluster_id", json!(fields.pod_cluster_id.new_value()));
        }
        if fields.pod_namespace_id.is_different() {
            info.insert("pod_ns_id", json!(fields.pod_namespace_id.new_value()));
        }
        tx.update_or_sync(&IdKey::new(source_id), info)
    }

    fn soft_deleted_targets_updated(&self, targets: &[ChPod], tx: &ChTx<'_, ChPod>) -> Result<()> {
        tx.upsert(targets, &OnConflict::update_columns(IdKey::COLUMNS, &["name"]))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_pod_row_carries_cluster_and_namespace() {
        let pod = Pod {
            id: 21,
            lcuuid: "pod-21".to_string(),
            name: "web-0".to_string(),
            pod_cluster_id: 7,
            pod_namespace_id: 3,
            deleted_at: Some(Utc::now()),
            ..Default::default()
        };
        let (keys, rows) = PodProjector.source_to_target(&Metadata::new("t1", "d1"), &pod);

        assert_eq!(keys, vec![IdKey::new(21)]);
        assert_eq!(rows[0].pod_cluster_id, 7);
        assert_eq!(rows[0].pod_ns_id, 3);
        assert_eq!(rows[0].name, "web-0 (deleted)");
    }
}
