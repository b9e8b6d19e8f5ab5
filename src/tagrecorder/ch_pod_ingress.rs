use crate::chdb::{OnConflict, UpdateInfo};
use crate::pubsub::message::PodIngressFieldsUpdate;
use crate::recorder::resource::PodIngresses;
use crate::tagrecorder::subscriber::{ChProjector, ChTx};
use crate::Result;
use ressync_common::ch::ChPodIngress;
use ressync_common::model::PodIngress;
use ressync_common::{ChKey, IdKey, Metadata, SourceRow};
use serde_json::json;

/// Projects pod ingresses into `ch_pod_ingress`
#[derive(Debug, Default)]
pub struct PodIngressProjector;

impl ChProjector for PodIngressProjector {
    type Resource = PodIngresses;
    type Target = ChPodIngress;

    fn source_to_target(
        &self,
        md: &Metadata,
        source: &PodIngress,
    ) -> (Vec<IdKey>, Vec<ChPodIngress>) {
        let row = ChPodIngress {
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
        fields: &PodIngressFieldsUpdate,
        tx: &ChTx<'_, ChPodIngress>,
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

    fn soft_deleted_targets_updated(
        &self,
        targets: &[ChPodIngress],
        tx: &ChTx<'_, ChPodIngress>,
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
    use crate::pubsub::message::{Added, Deleted, Updated};
    use crate::pubsub::ResourceSubscriber;
    use crate::tagrecorder::subscriber::SubscriberComponent;
    use chrono::Utc;
    use std::sync::Arc;

    fn metadata() -> Metadata {
        Metadata::new("t1", "d1")
    }

    fn ingress() -> PodIngress {
        PodIngress {
            id: 42,
            lcuuid: "ing-42".to_string(),
            name: "svc-ingress".to_string(),
            pod_cluster_id: 7,
            pod_namespace_id: 3,
            region_id: 1,
            deleted_at: None,
        }
    }

    fn component(store: Arc<MemoryChDb>) -> SubscriberComponent<PodIngressProjector> {
        SubscriberComponent::new(
            PodIngressProjector,
            store as Arc<dyn ChStore>,
            Arc::new(Metrics::new().unwrap()),
            TagRecorderConfig::default(),
        )
    }

    #[test]
    fn test_projection_of_active_ingress() {
        let (keys, rows) = PodIngressProjector.source_to_target(&metadata(), &ingress());

        assert_eq!(keys, vec![IdKey::new(42)]);
        assert_eq!(
            rows,
            vec![ChPodIngress {
                id: 42,
                name: "svc-ingress".to_string(),
                pod_cluster_id: 7,
                pod_ns_id: 3,
                team_id: "t1".to_string(),
                domain_id: "d1".to_string(),
                sub_domain_id: String::new(),
            }]
        );
    }

    #[test]
    fn test_projection_is_deterministic() {
        let md = metadata();
        let first = PodIngressProjector.source_to_target(&md, &ingress());
        let second = PodIngressProjector.source_to_target(&md, &ingress());
        assert_eq!(first, second);
    }

    #[test]
    fn test_rename_after_soft_delete_keeps_suffix() {
        let store = Arc::new(MemoryChDb::new());
        let sub = component(store.clone());
        let md = metadata();
        let table = ChTable::<ChPodIngress>::new(store.as_ref());

        sub.on_batch_added(&md, &Added { items: vec![ingress()] })
            .unwrap();

        let mut deleted = ingress();
        deleted.deleted_at = Some(Utc::now());
        sub.on_batch_deleted(
            &md,
            &Deleted {
                items: vec![deleted.clone()],
                soft_delete: true,
            },
        )
        .unwrap();
        let row = table.find(&IdKey::new(42)).unwrap().unwrap();
        assert_eq!(row.name, "svc-ingress (deleted)");

        let mut renamed = deleted.clone();
        renamed.name = "svc-ingress-v2".to_string();
        sub.on_updated(
            &md,
            &Updated {
                fields: PodIngressFieldsUpdate::diff(&deleted, &renamed),
                new: renamed,
            },
        )
        .unwrap();

        let rows = table.rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "svc-ingress-v2 (deleted)");
        assert_eq!(rows[0].pod_cluster_id, 7);
        assert_eq!(rows[0].team_id, "t1");
    }

    #[test]
    fn test_update_moves_namespace() {
        let store = Arc::new(MemoryChDb::new());
        let sub = component(store.clone());
        let md = metadata();

        sub.on_batch_added(&md, &Added { items: vec![ingress()] })
            .unwrap();

        let mut moved = ingress();
        moved.pod_namespace_id = 9;
        sub.on_updated(
            &md,
            &Updated {
                fields: PodIngressFieldsUpdate::diff(&ingress(), &moved),
                new: moved,
            },
        )
        .unwrap();

        let row = ChTable::<ChPodIngress>::new(store.as_ref())
            .find(&IdKey::new(42))
            .unwrap()
            .unwrap();
        assert_eq!(row.pod_ns_id, 9);
        assert_eq!(row.name, "svc-ingress");
    }
}
