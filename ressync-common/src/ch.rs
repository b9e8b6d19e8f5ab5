//! CH rows: denormalized projections of source rows
//!
//! Every row names its table and exposes its composite key. Rows are
//! serialized column-for-field, so serde names double as column names in
//! update maps and conflict clauses.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// Composite key addressing one row of a CH table.
///
/// Key order is the row order of table scans.
pub trait ChKey:
    Serialize + DeserializeOwned + Clone + Debug + Eq + Ord + Hash + Send + Sync + 'static
{
    /// Key columns, in the order used by conflict clauses
    const COLUMNS: &'static [&'static str];
}

/// A row of a CH table
pub trait ChRow: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    type Key: ChKey;

    const TABLE: &'static str;

    fn key(&self) -> Self::Key;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdKey {
    pub id: i32,
}

impl IdKey {
    pub const fn new(id: i32) -> Self {
        Self { id }
    }
}

impl ChKey for IdKey {
    const COLUMNS: &'static [&'static str] = &["id"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceKey {
    pub devicetype: i32,
    pub deviceid: i32,
}

impl DeviceKey {
    pub const fn new(devicetype: i32, deviceid: i32) -> Self {
        Self {
            devicetype,
            deviceid,
        }
    }
}

impl ChKey for DeviceKey {
    const COLUMNS: &'static [&'static str] = &["devicetype", "deviceid"];
}

/// Device type constants used in `ch_device`
pub mod device_type {
    pub const VM: i32 = 1;
    pub const POD: i32 = 10;
    pub const POD_SERVICE: i32 = 11;
    /// Service view of a pod service, sharing its ID
    pub const SERVICE: i32 = 102;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChRegion {
    pub id: i32,
    pub name: String,
}

impl ChRow for ChRegion {
    type Key = IdKey;
    const TABLE: &'static str = "ch_region";

    fn key(&self) -> IdKey {
        IdKey::new(self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChVpc {
    pub id: i32,
    pub name: String,
    pub uid: String,
    pub team_id: String,
    pub domain_id: String,
    pub sub_domain_id: String,
}

impl ChRow for ChVpc {
    type Key = IdKey;
    const TABLE: &'static str = "ch_l3_epc";

    fn key(&self) -> IdKey {
        IdKey::new(self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChSubnet {
    pub id: i32,
    pub name: String,
    pub l3_epc_id: i32,
    pub team_id: String,
    pub domain_id: String,
    pub sub_domain_id: String,
}

impl ChRow for ChSubnet {
    type Key = IdKey;
    const TABLE: &'static str = "ch_subnet";

    fn key(&self) -> IdKey {
        IdKey::new(self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChPodCluster {
    pub id: i32,
    pub name: String,
    pub team_id: String,
    pub domain_id: String,
    pub sub_domain_id: String,
}

impl ChRow for ChPodCluster {
    type Key = IdKey;
    const TABLE: &'static str = "ch_pod_cluster";

    fn key(&self) -> IdKey {
        IdKey::new(self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChPodNs {
    pub id: i32,
    pub name: String,
    pub pod_cluster_id: i32,
    pub team_id: String,
    pub domain_id: String,
    pub sub_domain_id: String,
}

impl ChRow for ChPodNs {
    type Key = IdKey;
    const TABLE: &'static str = "ch_pod_ns";

    fn key(&self) -> IdKey {
        IdKey::new(self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChPod {
    pub id: i32,
    pub name: String,
    pub pod_cluster_id: i32,
    pub pod_ns_id: i32,
    pub team_id: String,
    pub domain_id: String,
    pub sub_domain_id: String,
}

impl ChRow for ChPod {
    type Key = IdKey;
    const TABLE: &'static str = "ch_pod";

    fn key(&self) -> IdKey {
        IdKey::new(self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChPodIngress {
    pub id: i32,
    pub name: String,
    pub pod_cluster_id: i32,
    pub pod_ns_id: i32,
    pub team_id: String,
    pub domain_id: String,
    pub sub_domain_id: String,
}

impl ChRow for ChPodIngress {
    type Key = IdKey;
    const TABLE: &'static str = "ch_pod_ingress";

    fn key(&self) -> IdKey {
        IdKey::new(self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChDevice {
    pub devicetype: i32,
    pub deviceid: i32,
    pub name: String,
    pub uid: String,
    pub ip: String,
    pub team_id: String,
    pub domain_id: String,
    pub sub_domain_id: String,
}

impl ChRow for ChDevice {
    type Key = DeviceKey;
    const TABLE: &'static str = "ch_device";

    fn key(&self) -> DeviceKey {
        DeviceKey::new(self.devicetype, self.deviceid)
    }
}
