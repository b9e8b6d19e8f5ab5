//! CH table maintenance driven by recorder messages
//!
//! One `SubscriberComponent` per projector, each registered on the hub
//! under its resource kind.

pub mod ch_device;
pub mod ch_pod;
pub mod ch_pod_cluster;
pub mod ch_pod_ingress;
pub mod ch_pod_namespace;
pub mod ch_region;
pub mod ch_subnet;
pub mod ch_vpc;
pub mod subscriber;

pub use ch_device::{PodDeviceProjector, PodServiceDeviceProjector, VmDeviceProjector};
pub use ch_pod::PodProjector;
pub use ch_pod_cluster::PodClusterProjector;
pub use ch_pod_ingress::PodIngressProjector;
pub use ch_pod_namespace::PodNamespaceProjector;
pub use ch_region::RegionProjector;
pub use ch_subnet::SubnetProjector;
pub use ch_vpc::VpcProjector;
pub use subscriber::{ChProjector, ChTx, SubscriberComponent, TableSync};

use crate::chdb::{ChStore, ChTable};
use crate::config::TagRecorderConfig;
use crate::metrics::Metrics;
use crate::pubsub::PubSubHub;
use crate::recorder::metadb::MetaDb;
use crate::recorder::resource::Resource;
use crate::Result;
use ressync_common::ch::{
    ChDevice, ChPod, ChPodCluster, ChPodIngress, ChPodNs, ChRegion, ChSubnet, ChVpc,
};
use ressync_common::{ChRow, Metadata};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

pub struct TagRecorder {
    store: Arc<dyn ChStore>,
    metrics: Arc<Metrics>,
    config: TagRecorderConfig,
    syncers: Vec<Arc<dyn TableSync>>,
}

impl TagRecorder {
    pub fn new(
        store: Arc<dyn ChStore>,
        metrics: Arc<Metrics>,
        config: TagRecorderConfig,
    ) -> Self {
        Self {
            store,
            metrics,
            config,
            syncers: Vec::new(),
        }
    }

    /// Register every CH projector on `hub`
    pub fn subscribe_all(&mut self, hub: &mut PubSubHub) {
        self.register(hub, RegionProjector);
        self.register(hub, VpcProjector);
        self.register(hub, SubnetProjector);
        self.register(hub, PodClusterProjector);
        self.register(hub, PodNamespaceProjector);
        self.register(hub, PodProjector);
        self.register(hub, PodIngressProjector);
        self.register(hub, VmDeviceProjector);
        self.register(hub, PodDeviceProjector);
        self.register(hub, PodServiceDeviceProjector);
    }

    pub fn register<P: ChProjector>(
        &mut self,
        hub: &mut PubSubHub,
        projector: P,
    ) -> Arc<SubscriberComponent<P>> {
        let component = Arc::new(SubscriberComponent::new(
            projector,
            self.store.clone(),
            self.metrics.clone(),
            self.config.clone(),
        ));
        hub.subscribe::<P::Resource>(component.clone());
        self.syncers.push(component.clone());
        debug!("{} subscribed to {}", P::Target::TABLE, P::Resource::KIND);
        component
    }

    pub fn subscriber_count(&self) -> usize {
        self.syncers.len()
    }

    /// Run the pending full-table syncs. Every table is attempted; the first
    /// failure is returned. Returns the number of tables synced.
    pub fn sync_pending(&self, md: &Metadata, db: &MetaDb) -> Result<usize> {
        let mut synced = 0;
        let mut first_err = None;
        for syncer in &self.syncers {
            match syncer.sync_if_needed(md, db) {
                Ok(true) => synced += 1,
                Ok(false) => {}
                Err(e) => {
                    error!("Sync of {} failed: {}", syncer.table(), e);
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(synced),
        }
    }

    pub fn dump(&self) -> Result<ChDump> {
        let store = self.store.as_ref();
        Ok(ChDump {
            ch_region: ChTable::<ChRegion>::new(store).rows()?,
            ch_l3_epc: ChTable::<ChVpc>::new(store).rows()?,
            ch_subnet: ChTable::<ChSubnet>::new(store).rows()?,
            ch_pod_cluster: ChTable::<ChPodCluster>::new(store).rows()?,
            ch_pod_ns: ChTable::<ChPodNs>::new(store).rows()?,
            ch_pod: ChTable::<ChPod>::new(store).rows()?,
            ch_pod_ingress: ChTable::<ChPodIngress>::new(store).rows()?,
            ch_device: ChTable::<ChDevice>::new(store).rows()?,
        })
    }
}

/// Contents of every CH table, keyed by table name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChDump {
    pub ch_region: Vec<ChRegion>,
    pub ch_l3_epc: Vec<ChVpc>,
    pub ch_subnet: Vec<ChSubnet>,
    pub ch_pod_cluster: Vec<ChPodCluster>,
    pub ch_pod_ns: Vec<ChPodNs>,
    pub ch_pod: Vec<ChPod>,
    pub ch_pod_ingress: Vec<ChPodIngress>,
    pub ch_device: Vec<ChDevice>,
}
