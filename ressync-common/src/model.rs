//! Source rows: the relational snapshot of every tracked resource
//!
//! Parent references are resolved to integer IDs. Soft-deleting kinds keep
//! their rows after deletion and record the time in `deleted_at`.

use crate::kind::ResourceKind;
use crate::DELETED_SUFFIX;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionState {
    Active,
    SoftDeleted,
}

/// Capability every source row exposes to the recorder and the projectors
pub trait SourceRow: Clone + Debug + Send + Sync + 'static {
    const KIND: ResourceKind;

    /// Whether deleting this resource keeps the row with a deletion marker
    const SOFT_DELETE: bool = true;

    fn id(&self) -> i32;

    fn set_id(&mut self, id: i32);

    fn lcuuid(&self) -> &str;

    fn name(&self) -> &str;

    fn deleted_at(&self) -> Option<DateTime<Utc>>;

    fn set_deleted_at(&mut self, deleted_at: Option<DateTime<Utc>>);

    fn deletion_state(&self) -> DeletionState {
        match self.deleted_at() {
            Some(_) => DeletionState::SoftDeleted,
            None => DeletionState::Active,
        }
    }

    fn is_soft_deleted(&self) -> bool {
        self.deletion_state() == DeletionState::SoftDeleted
    }

    /// Name as shown in CH tables, suffixed once the row is soft-deleted
    fn display_name(&self) -> String {
        match self.deletion_state() {
            DeletionState::Active => self.name().to_string(),
            DeletionState::SoftDeleted => format!("{}{}", self.name(), DELETED_SUFFIX),
        }
    }
}

macro_rules! source_row {
    ($ty:ident, $kind:expr) => {
        source_row!($ty, $kind, true);
    };
    ($ty:ident, $kind:expr, $soft:expr) => {
        impl SourceRow for $ty {
            const KIND: ResourceKind = $kind;
            const SOFT_DELETE: bool = $soft;

            fn id(&self) -> i32 {
                self.id
            }

            fn set_id(&mut self, id: i32) {
                self.id = id;
            }

            fn lcuuid(&self) -> &str {
                &self.lcuuid
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn deleted_at(&self) -> Option<DateTime<Utc>> {
                self.deleted_at
            }

            fn set_deleted_at(&mut self, deleted_at: Option<DateTime<Utc>>) {
                self.deleted_at = deleted_at;
            }
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: i32,
    pub lcuuid: String,
    pub name: String,
    pub label: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vpc {
    pub id: i32,
    pub lcuuid: String,
    pub name: String,
    pub label: String,
    pub cidr: String,
    pub region_id: i32,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub id: i32,
    pub lcuuid: String,
    pub name: String,
    pub label: String,
    pub segmentation_id: i32,
    pub vpc_id: i32,
    pub region_id: i32,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vm {
    pub id: i32,
    pub lcuuid: String,
    pub name: String,
    pub label: String,
    pub ip: String,
    pub state: i32,
    pub vpc_id: i32,
    pub region_id: i32,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodCluster {
    pub id: i32,
    pub lcuuid: String,
    pub name: String,
    pub cluster_name: String,
    pub version: String,
    pub vpc_id: i32,
    pub region_id: i32,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodNamespace {
    pub id: i32,
    pub lcuuid: String,
    pub name: String,
    pub pod_cluster_id: i32,
    pub region_id: i32,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pod {
    pub id: i32,
    pub lcuuid: String,
    pub name: String,
    pub label: String,
    pub state: i32,
    pub pod_cluster_id: i32,
    pub pod_namespace_id: i32,
    pub vpc_id: i32,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodIngress {
    pub id: i32,
    pub lcuuid: String,
    pub name: String,
    pub pod_cluster_id: i32,
    pub pod_namespace_id: i32,
    pub region_id: i32,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodService {
    pub id: i32,
    pub lcuuid: String,
    pub name: String,
    pub service_cluster_ip: String,
    pub pod_cluster_id: i32,
    pub pod_namespace_id: i32,
    pub vpc_id: i32,
    pub deleted_at: Option<DateTime<Utc>>,
}

source_row!(Region, ResourceKind::Region, false);
source_row!(Vpc, ResourceKind::Vpc);
source_row!(Network, ResourceKind::Network);
source_row!(Vm, ResourceKind::Vm);
source_row!(PodCluster, ResourceKind::PodCluster);
source_row!(PodNamespace, ResourceKind::PodNamespace);
source_row!(Pod, ResourceKind::Pod);
source_row!(PodIngress, ResourceKind::PodIngress);
source_row!(PodService, ResourceKind::PodService);
