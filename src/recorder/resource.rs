//! Per-kind glue between diff-base records, source rows and update messages

use crate::pubsub::message::{
    ChangedFields, NetworkFieldsUpdate, PodClusterFieldsUpdate, PodFieldsUpdate,
    PodIngressFieldsUpdate, PodNamespaceFieldsUpdate, PodServiceFieldsUpdate, RegionFieldsUpdate,
    VmFieldsUpdate, VpcFieldsUpdate,
};
use crate::recorder::diffbase::{self, DiffBaseEntity};
use crate::recorder::metadb::MetaDb;
use ressync_common::model;
use ressync_common::{ResourceKind, SourceRow};

/// A parent reference that does not resolve to a live source row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingParent {
    pub kind: ResourceKind,
    pub lcuuid: String,
}

impl std::fmt::Display for MissingParent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} not found", self.kind, self.lcuuid)
    }
}

/// Ties together the types the recorder handles for one resource kind
pub trait Resource: Send + Sync + 'static {
    const KIND: ResourceKind;

    type DiffBase: DiffBaseEntity;
    type Source: SourceRow;
    type FieldsUpdate: ChangedFields;

    /// Build the source row for a live item, resolving parent lcuuids.
    /// The returned row has no ID yet.
    fn to_source(live: &Self::DiffBase, db: &MetaDb) -> Result<Self::Source, MissingParent>;

    fn fields_update(old: &Self::Source, new: &Self::Source) -> Self::FieldsUpdate;
}

/// Resolve a parent lcuuid to its ID. An empty reference means no parent
/// and resolves to 0.
fn parent<S: SourceRow>(db: &MetaDb, lcuuid: &str) -> Result<i32, MissingParent> {
    if lcuuid.is_empty() {
        return Ok(0);
    }
    db.live_id::<S>(lcuuid).ok_or_else(|| MissingParent {
        kind: S::KIND,
        lcuuid: lcuuid.to_string(),
    })
}

pub struct Regions;
pub struct Vpcs;
pub struct Networks;
pub struct Vms;
pub struct PodClusters;
pub struct PodNamespaces;
pub struct Pods;
pub struct PodIngresses;
pub struct PodServices;

impl Resource for Regions {
    const KIND: ResourceKind = ResourceKind::Region;
    type DiffBase = diffbase::Region;
    type Source = model::Region;
    type FieldsUpdate = RegionFieldsUpdate;

    fn to_source(live: &diffbase::Region, _db: &MetaDb) -> Result<model::Region, MissingParent> {
        Ok(model::Region {
            id: 0,
            lcuuid: live.base.lcuuid.clone(),
            name: live.name.clone(),
            label: live.label.clone(),
            deleted_at: None,
        })
    }

    fn fields_update(old: &model::Region, new: &model::Region) -> RegionFieldsUpdate {
        RegionFieldsUpdate::diff(old, new)
    }
}

impl Resource for Vpcs {
    const KIND: ResourceKind = ResourceKind::Vpc;
    type DiffBase = diffbase::Vpc;
    type Source = model::Vpc;
    type FieldsUpdate = VpcFieldsUpdate;

    fn to_source(live: &diffbase::Vpc, db: &MetaDb) -> Result<model::Vpc, MissingParent> {
        Ok(model::Vpc {
            id: 0,
            lcuuid: live.base.lcuuid.clone(),
            name: live.name.clone(),
            label: live.label.clone(),
            cidr: live.cidr.clone(),
            region_id: parent::<model::Region>(db, &live.region_lcuuid)?,
            deleted_at: None,
        })
    }

    fn fields_update(old: &model::Vpc, new: &model::Vpc) -> VpcFieldsUpdate {
        VpcFieldsUpdate::diff(old, new)
    }
}

impl Resource for Networks {
    const KIND: ResourceKind = ResourceKind::Network;
    type DiffBase = diffbase::Network;
    type Source = model::Network;
    type FieldsUpdate = NetworkFieldsUpdate;

    fn to_source(live: &diffbase::Network, db: &MetaDb) -> Result<model::Network, MissingParent> {
        Ok(model::Network {
            id: 0,
            lcuuid: live.base.lcuuid.clone(),
            name: live.name.clone(),
            label: live.label.clone(),
            segmentation_id: live.segmentation_id,
            vpc_id: parent::<model::Vpc>(db, &live.vpc_lcuuid)?,
            region_id: parent::<model::Region>(db, &live.region_lcuuid)?,
            deleted_at: None,
        })
    }

    fn fields_update(old: &model::Network, new: &model::Network) -> NetworkFieldsUpdate {
        NetworkFieldsUpdate::diff(old, new)
    }
}

impl Resource for Vms {
    const KIND: ResourceKind = ResourceKind::Vm;
    type DiffBase = diffbase::Vm;
    type Source = model::Vm;
    type FieldsUpdate = VmFieldsUpdate;

    fn to_source(live: &diffbase::Vm, db: &MetaDb) -> Result<model::Vm, MissingParent> {
        Ok(model::Vm {
            id: 0,
            lcuuid: live.base.lcuuid.clone(),
            name: live.name.clone(),
            label: live.label.clone(),
            ip: live.ip.clone(),
            state: live.state,
            vpc_id: parent::<model::Vpc>(db, &live.vpc_lcuuid)?,
            region_id: parent::<model::Region>(db, &live.region_lcuuid)?,
            deleted_at: None,
        })
    }

    fn fields_update(old: &model::Vm, new: &model::Vm) -> VmFieldsUpdate {
        VmFieldsUpdate::diff(old, new)
    }
}

impl Resource for PodClusters {
    const KIND: ResourceKind = ResourceKind::PodCluster;
    type DiffBase = diffbase::PodCluster;
    type Source = model::PodCluster;
    type FieldsUpdate = PodClusterFieldsUpdate;

    fn to_source(
        live: &diffbase::PodCluster,
        db: &MetaDb,
    ) -> Result<model::PodCluster, MissingParent> {
        Ok(model::PodCluster {
            id: 0,
            lcuuid: live.base.lcuuid.clone(),
            name: live.name.clone(),
            cluster_name: live.cluster_name.clone(),
            version: live.version.clone(),
            vpc_id: parent::<model::Vpc>(db, &live.vpc_lcuuid)?,
            region_id: parent::<model::Region>(db, &live.region_lcuuid)?,
            deleted_at: None,
        })
    }

    fn fields_update(old: &model::PodCluster, new: &model::PodCluster) -> PodClusterFieldsUpdate {
        PodClusterFieldsUpdate::diff(old, new)
    }
}

impl Resource for PodNamespaces {
    const KIND: ResourceKind = ResourceKind::PodNamespace;
    type DiffBase = diffbase::PodNamespace;
    type Source = model::PodNamespace;
    type FieldsUpdate = PodNamespaceFieldsUpdate;

    fn to_source(
        live: &diffbase::PodNamespace,
        db: &MetaDb,
    ) -> Result<model::PodNamespace, MissingParent> {
        Ok(model::PodNamespace {
            id: 0,
            lcuuid: live.base.lcuuid.clone(),
            name: live.name.clone(),
            pod_cluster_id: parent::<model::PodCluster>(db, &live.pod_cluster_lcuuid)?,
            region_id: parent::<model::Region>(db, &live.region_lcuuid)?,
            deleted_at: None,
        })
    }

    fn fields_update(
        old: &model::PodNamespace,
        new: &model::PodNamespace,
    ) -> PodNamespaceFieldsUpdate {
        PodNamespaceFieldsUpdate::diff(old, new)
    }
}

impl Resource for Pods {
    const KIND: ResourceKind = ResourceKind::Pod;
    type DiffBase = diffbase::Pod;
    type Source = model::Pod;
    type FieldsUpdate = PodFieldsUpdate;

    fn to_source(live: &diffbase::Pod, db: &MetaDb) -> Result<model::Pod, MissingParent> {
        Ok(model::Pod {
            id: 0,
            lcuuid: live.base.lcuuid.clone(),
            name: live.name.clone(),
            label: live.label.clone(),
            state: live.state,
            pod_cluster_id: parent::<model::PodCluster>(db, &live.pod_cluster_lcuuid)?,
            pod_namespace_id: parent::<model::PodNamespace>(db, &live.pod_namespace_lcuuid)?,
            vpc_id: parent::<model::Vpc>(db, &live.vpc_lcuuid)?,
            deleted_at: None,
        })
    }

    fn fields_update(old: &model::Pod, new: &model::Pod) -> PodFieldsUpdate {
        PodFieldsUpdate::diff(old, new)
    }
}

impl Resource for PodIngresses {
    const KIND: ResourceKind = ResourceKind::PodIngress;
    type DiffBase = diffbase::PodIngress;
    type Source = model::PodIngress;
    type FieldsUpdate = PodIngressFieldsUpdate;

    fn to_source(
        live: &diffbase::PodIngress,
        db: &MetaDb,
    ) -> Result<model::PodIngress, MissingParent> {
        Ok(model::PodIngress {
            id: 0,
            lcuuid: live.base.lcuuid.clone(),
            name: live.name.clone(),
            pod_cluster_id: parent::<model::PodCluster>(db, &live.pod_cluster_lcuuid)?,
            pod_namespace_id: parent::<model::PodNamespace>(db, &live.pod_namespace_lcuuid)?,
            region_id: parent::<model::Region>(db, &live.region_lcuuid)?,
            deleted_at: None,
        })
    }

    fn fields_update(old: &model::PodIngress, new: &model::PodIngress) -> PodIngressFieldsUpdate {
        PodIngressFieldsUpdate::diff(old, new)
    }
}

impl Resource for PodServices {
    const KIND: ResourceKind = ResourceKind::PodService;
    type DiffBase = diffbase::PodService;
    type Source = model::PodService;
    type FieldsUpdate = PodServiceFieldsUpdate;

    fn to_source(
        live: &diffbase::PodService,
        db: &MetaDb,
    ) -> Result<model::PodService, MissingParent> {
        Ok(model::PodService {
            id: 0,
            lcuuid: live.base.lcuuid.clone(),
            name: live.name.clone(),
            service_cluster_ip: live.service_cluster_ip.clone(),
            pod_cluster_id: parent::<model::PodCluster>(db, &live.pod_cluster_lcuuid)?,
            pod_namespace_id: parent::<model::PodNamespace>(db, &live.pod_namespace_lcuuid)?,
            vpc_id: parent::<model::Vpc>(db, &live.vpc_lcuuid)?,
            deleted_at: None,
        })
    }

    fn fields_update(old: &model::PodService, new: &model::PodService) -> PodServiceFieldsUpdate {
        PodServiceFieldsUpdate::diff(old, new)
    }
}
