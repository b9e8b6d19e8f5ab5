//! Projections into `ch_device`
//!
//! VMs, pods and pod services share the device table under distinct device
//! types. A pod service appears twice: once as itself and once in its
//! service view.

use crate::chdb::{OnConflict, UpdateInfo};
use crate::pubsub::message::{PodFieldsUpdate, PodServiceFieldsUpdate, VmFieldsUpdate};
use crate::recorder::resource::{PodServices, Pods, Vms};
use crate::tagrecorder::subscriber::{ChProjector, ChTx};
use crate::Result;
use ressync_common::ch::{device_type, ChDevice};
use ressync_common::model::{Pod, PodService, Vm};
use ressync_common::{ChKey, ChRow, DeviceKey, Metadata, SourceRow};
use serde_json::json;

const POD_SERVICE_DEVICE_TYPES: [i32; 2] = [device_type::POD_SERVICE, device_type::SERVICE];

fn device(
    md: &Metadata,
    devicetype: i32,
    id: i32,
    name: String,
    uid: &str,
    ip: &str,
) -> ChDevice {
    ChDevice {
        devicetype,
        deviceid: id,
        name,
        uid: uid.to_string(),
        ip: ip.to_string(),
        team_id: md.team_id.clone(),
        domain_id: md.domain_id.clone(),
        sub_domain_id: md.sub_domain_id.clone(),
    }
}

fn upsert_names(targets: &[ChDevice], tx: &ChTx<'_, ChDevice>) -> Result<()> {
    tx.upsert(targets, &OnConflict::update_columns(DeviceKey::COLUMNS, &["name"]))?;
    Ok(())
}

#[derive(Debug, Default)]
pub struct VmDeviceProjector;

impl ChProjector for VmDeviceProjector {
    type Resource = Vms;
    type Target = ChDevice;

    fn source_to_target(&self, md: &Metadata, source: &Vm) -> (Vec<DeviceKey>, Vec<ChDevice>) {
        let row = device(
            md,
            device_type::VM,
            source.id,
            source.display_name(),
            &source.lcuuid,
            &source.ip,
        );
        (vec![row.key()], vec![row])
    }

    fn on_resource_updated(
        &self,
        source_id: i32,
        fields: &VmFieldsUpdate,
        tx: &ChTx<'_, ChDevice>,
    ) -> Result<()> {
        let mut info = UpdateInfo::new();
        if fields.name.is_different() {
            info.insert("name", json!(fields.name.new_value()));
        }
        if fields.ip.is_different() {
            info.insert("ip", json!(fields.ip.new_value()));
        }
        tx.update_or_sync(&DeviceKey::new(device_type::VM, source_id), info)
    }

    fn soft_deleted_targets_updated(
        &self,
        targets: &[ChDevice],
        tx: &ChTx<'_, ChDevice>,
    ) -> Result<()> {
        upsert_names(targets, tx)
    }
}

#[derive(Debug, Default)]
pub struct PodDeviceProjector;

impl ChProjector for PodDeviceProjector {
    type Resource = Pods;
    type Target = ChDevice;

    fn source_to_target(&self, md: &Metadata, source: &Pod) -> (Vec<DeviceKey>, Vec<ChDevice>) {
        let row = device(
            md,
            device_type::POD,
            source.id,
            source.display_name(),
            &source.lcuuid,
            "",
        );
        (vec![row.key()], vec![row])
    }

    fn on_resource_updated(
        &self,
        source_id: i32,
        fields: &PodFieldsUpdate,
        tx: &ChTx<'_, ChDevice>,
    ) -> Result<()> {
        let mut info = UpdateInfo::new();
        if fields.name.is_different() {
            info.insert("name", json!(fields.name.new_value()));
        }
        tx.update_or_sync(&DeviceKey::new(device_type::POD, source_id), info)
    }

    fn soft_deleted_targets_updated(
        &self,
        targets: &[ChDevice],
        tx: &ChTx<'_, ChDevice>,
    ) -> Result<()> {
        upsert_names(targets, tx)
    }
}

#[derive(Debug, Default)]
pub struct PodServiceDeviceProjector;

impl ChProjector for PodServiceDeviceProjector {
    type Resource = PodServices;
    type Target = ChDevice;

    fn source_to_target(
        &self,
        md: &Metadata,
        source: &PodService,
    ) -> (Vec<DeviceKey>, Vec<ChDevice>) {
        let name = source.display_name();
        let rows: Vec<ChDevice> = POD_SERVICE_DEVICE_TYPES
            .iter()
            .map(|&devicetype| {
                device(
                    md,
                    devicetype,
                    source.id,
                    name.clone(),
                    &source.lcuuid,
                    &source.service_cluster_ip,
                )
            })
            .collect();
        (rows.iter().map(|r| r.key()).collect(), rows)
    }

    fn on_resource_updated(
        &self,
        source_id: i32,
        fields: &PodServiceFieldsUpdate,
        tx: &ChTx<'_, ChDevice>,
    ) -> Result<()> {
        let mut info = UpdateInfo::new();
        if fields.name.is_different() {
            info.insert("name", json!(fields.name.new_value()));
        }
        if fields.service_cluster_ip.is_different() {
            info.insert("ip", json!(fields.service_cluster_ip.new_value()));
        }
        for devicetype in POD_SERVICE_DEVICE_TYPES {
            tx.update_or_sync(&DeviceKey::new(devicetype, source_id), info.clone())?;
        }
        Ok(())
    }

    fn soft_deleted_targets_updated(
        &self,
        targets: &[ChDevice],
        tx: &ChTx<'_, ChDevice>,
    ) -> Result<()> {
        upsert_names(targets, tx)
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

    fn service() -> PodService {
        PodService {
            id: 5,
            lcuuid: "svc-5".to_string(),
            name: "frontend".to_string(),
            service_cluster_ip: "10.96.0.10".to_string(),
            pod_cluster_id: 1,
            pod_namespace_id: 2,
            vpc_id: 3,
            deleted_at: None,
        }
    }

    fn component(store: Arc<MemoryChDb>) -> SubscriberComponent<PodServiceDeviceProjector> {
        SubscriberComponent::new(
            PodServiceDeviceProjector,
            store as Arc<dyn ChStore>,
            Arc::new(Metrics::new().unwrap()),
            TagRecorderConfig::default(),
        )
    }

    #[test]
    fn test_pod_service_fans_out_to_two_devices() {
        let (keys, rows) =
            PodServiceDeviceProjector.source_to_target(&Metadata::default(), &service());

        assert_eq!(keys, vec![DeviceKey::new(11, 5), DeviceKey::new(102, 5)]);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.ip == "10.96.0.10" && r.uid == "svc-5"));
    }

    #[test]
    fn test_vm_projection_uses_vm_device_type() {
        let vm = Vm {
            id: 8,
            lcuuid: "vm-8".to_string(),
            name: "web-1".to_string(),
            ip: "192.168.0.8".to_string(),
            deleted_at: Some(Utc::now()),
            ..Default::default()
        };
        let (keys, rows) = VmDeviceProjector.source_to_target(&Metadata::default(), &vm);

        assert_eq!(keys, vec![DeviceKey::new(device_type::VM, 8)]);
        assert_eq!(rows[0].name, "web-1 (deleted)");
    }

    #[test]
    fn test_pod_state_change_makes_no_device_update() {
        let store = Arc::new(MemoryChDb::new());
        let sub = SubscriberComponent::new(
            PodDeviceProjector,
            store.clone() as Arc<dyn ChStore>,
            Arc::new(Metrics::new().unwrap()),
            TagRecorderConfig::default(),
        );
        let md = Metadata::default();
        let pod = Pod {
            id: 4,
            lcuuid: "pod-4".to_string(),
            name: "web-0".to_string(),
            ..Default::default()
        };
        sub.on_batch_added(&md, &Added { items: vec![pod.clone()] })
            .unwrap();

        let mut restarted = pod.clone();
        restarted.state = 3;
        sub.on_updated(
            &md,
            &Updated {
                fields: PodFieldsUpdate::diff(&pod, &restarted),
                new: restarted,
            },
        )
        .unwrap();

        let rows = ChTable::<ChDevice>::new(store.as_ref()).rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key(), DeviceKey::new(device_type::POD, 4));
        assert_eq!(rows[0].name, "web-0");
        assert_eq!(sub.projector().source_to_target(&md, &pod).1, rows);
    }

    #[test]
    fn test_pod_service_update_touches_both_rows() {
        let store = Arc::new(MemoryChDb::new());
        let sub = component(store.clone());
        let md = Metadata::new("t1", "d1");

        sub.on_batch_added(&md, &Added { items: vec![service()] })
            .unwrap();

        let mut renamed = service();
        renamed.name = "frontend-v2".to_string();
        sub.on_updated(
            &md,
            &Updated {
                fields: PodServiceFieldsUpdate::diff(&service(), &renamed),
                new: renamed,
            },
        )
        .unwrap();

        let rows = ChTable::<ChDevice>::new(store.as_ref()).rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.name == "frontend-v2"));
    }

    #[test]
    fn test_pod_service_soft_delete_renames_both_rows() {
        let store = Arc::new(MemoryChDb::new());
        let sub = component(store.clone());
        let md = Metadata::default();

        sub.on_batch_added(&md, &Added { items: vec![service()] })
            .unwrap();
        let mut deleted = service();
        deleted.deleted_at = Some(Utc::now());
        sub.on_batch_deleted(
            &md,
            &Deleted {
                items: vec![deleted],
                soft_delete: true,
            },
        )
        .unwrap();

        let rows = ChTable::<ChDevice>::new(store.as_ref()).rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.name == "frontend (deleted)"));
    }
}
