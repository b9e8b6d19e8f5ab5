//! Diff-base records: the last-known shape of each resource as reported by
//! the cloud, compared against every new snapshot.
//!
//! The same types double as live snapshot items; parent references are kept
//! as lcuuids here and resolved to IDs only when building source rows.

use ressync_common::ResourceKind;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Identity and ordering envelope embedded in every diff-base record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffBase {
    /// Cycle that last observed the resource
    #[serde(default)]
    pub sequence: u64,
    pub lcuuid: String,
}

impl DiffBase {
    pub fn new(lcuuid: impl Into<String>) -> Self {
        Self {
            sequence: 0,
            lcuuid: lcuuid.into(),
        }
    }
}

/// Capability the diff algorithm needs from every cached resource
pub trait DiffBaseEntity: Clone + Debug + Send + Sync + 'static {
    const KIND: ResourceKind;

    fn diff_base(&self) -> &DiffBase;

    fn diff_base_mut(&mut self) -> &mut DiffBase;

    /// Field equality ignoring the sequence
    fn same_content(&self, other: &Self) -> bool;

    fn sequence(&self) -> u64 {
        self.diff_base().sequence
    }

    fn set_sequence(&mut self, sequence: u64) {
        self.diff_base_mut().sequence = sequence;
    }

    fn lcuuid(&self) -> &str {
        &self.diff_base().lcuuid
    }
}

macro_rules! diff_base_entity {
    ($ty:ident, $kind:expr, $($field:ident),+) => {
        impl DiffBaseEntity for $ty {
            const KIND: ResourceKind = $kind;

            fn diff_base(&self) -> &DiffBase {
                &self.base
            }

            fn diff_base_mut(&mut self) -> &mut DiffBase {
                &mut self.base
            }

            fn same_content(&self, other: &Self) -> bool {
                self.base.lcuuid == other.base.lcuuid $(&& self.$field == other.$field)+
            }
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Region {
    #[serde(flatten)]
    pub base: DiffBase,
    pub name: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vpc {
    #[serde(flatten)]
    pub base: DiffBase,
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub cidr: String,
    #[serde(default)]
    pub region_lcuuid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    #[serde(flatten)]
    pub base: DiffBase,
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub segmentation_id: i32,
    #[serde(default)]
    pub vpc_lcuuid: String,
    #[serde(default)]
    pub region_lcuuid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vm {
    #[serde(flatten)]
    pub base: DiffBase,
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub state: i32,
    #[serde(default)]
    pub vpc_lcuuid: String,
    #[serde(default)]
    pub region_lcuuid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodCluster {
    #[serde(flatten)]
    pub base: DiffBase,
    pub name: String,
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub vpc_lcuuid: String,
    #[serde(default)]
    pub region_lcuuid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodNamespace {
    #[serde(flatten)]
    pub base: DiffBase,
    pub name: String,
    #[serde(default)]
    pub pod_cluster_lcuuid: String,
    #[serde(default)]
    pub region_lcuuid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pod {
    #[serde(flatten)]
    pub base: DiffBase,
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub state: i32,
    #[serde(default)]
    pub pod_cluster_lcuuid: String,
    #[serde(default)]
    pub pod_namespace_lcuuid: String,
    #[serde(default)]
    pub vpc_lcuuid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodIngress {
    #[serde(flatten)]
    pub base: DiffBase,
    pub name: String,
    #[serde(default)]
    pub pod_cluster_lcuuid: String,
    #[serde(default)]
    pub pod_namespace_lcuuid: String,
    #[serde(default)]
    pub region_lcuuid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodService {
    #[serde(flatten)]
    pub base: DiffBase,
    pub name: String,
    #[serde(default)]
    pub service_cluster_ip: String,
    #[serde(default)]
    pub pod_cluster_lcuuid: String,
    #[serde(default)]
    pub pod_namespace_lcuuid: String,
    #[serde(default)]
    pub vpc_lcuuid: String,
}

diff_base_entity!(Region, ResourceKind::Region, name, label);
diff_base_entity!(Vpc, ResourceKind::Vpc, name, label, cidr, region_lcuuid);
diff_base_entity!(
    Network,
    ResourceKind::Network,
    name,
    label,
    segmentation_id,
    vpc_lcuuid,
    region_lcuuid
);
diff_base_entity!(
    Vm,
    ResourceKind::Vm,
    name,
    label,
    ip,
    state,
    vpc_lcuuid,
    region_lcuuid
);
diff_base_entity!(
    PodCluster,
    ResourceKind::PodCluster,
    name,
    cluster_name,
    version,
    vpc_lcuuid,
    region_lcuuid
);
diff_base_entity!(
    PodNamespace,
    ResourceKind::PodNamespace,
    name,
    pod_cluster_lcuuid,
    region_lcuuid
);
diff_base_entity!(
    Pod,
    ResourceKind::Pod,
    name,
    label,
    state,
    pod_cluster_lcuuid,
    pod_namespace_lcuuid,
    vpc_lcuuid
);
diff_base_entity!(
    PodIngress,
    ResourceKind::PodIngress,
    name,
    pod_cluster_lcuuid,
    pod_namespace_lcuuid,
    region_lcuuid
);
diff_base_entity!(
    PodService,
    ResourceKind::PodService,
    name,
    service_cluster_ip,
    pod_cluster_lcuuid,
    pod_namespace_lcuuid,
    vpc_lcuuid
);
