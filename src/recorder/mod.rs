//! Resource recorder: reconciles live cloud snapshots against the cache
//!
//! Each `refresh` builds the next cache generation from a clone of the
//! current one and swaps it in when the cycle is done, so readers holding
//! `cache()` never see a half-applied cycle.

pub mod dataset;
pub mod diffbase;
pub mod metadb;
pub mod resource;
pub mod updater;

pub use dataset::{ApplyOutcome, DataSet, EntityStore};
pub use diffbase::{DiffBase, DiffBaseEntity};
pub use metadb::MetaDb;
pub use resource::Resource;
pub use updater::CycleSummary;

use crate::metrics::Metrics;
use crate::pubsub::{PubSubHub, ResourceSubscriber};
use crate::{RessyncError, Result};
use arc_swap::ArcSwap;
use resource::{
    Networks, PodClusters, PodIngresses, PodNamespaces, PodServices, Pods, Regions, Vms, Vpcs,
};
use ressync_common::{Metadata, ResourceKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use updater::Cycle;

/// Live inventory of one domain as reported by the cloud in one poll
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudSnapshot {
    /// Cycle number assigned by the producer; the recorder's next number
    /// when absent
    pub sequence: Option<u64>,
    pub regions: Vec<diffbase::Region>,
    pub vpcs: Vec<diffbase::Vpc>,
    pub networks: Vec<diffbase::Network>,
    pub vms: Vec<diffbase::Vm>,
    pub pod_clusters: Vec<diffbase::PodCluster>,
    pub pod_namespaces: Vec<diffbase::PodNamespace>,
    pub pods: Vec<diffbase::Pod>,
    pub pod_ingresses: Vec<diffbase::PodIngress>,
    pub pod_services: Vec<diffbase::PodService>,
}

impl CloudSnapshot {
    pub fn len(&self) -> usize {
        self.regions.len()
            + self.vpcs.len()
            + self.networks.len()
            + self.vms.len()
            + self.pod_clusters.len()
            + self.pod_namespaces.len()
            + self.pods.len()
            + self.pod_ingresses.len()
            + self.pod_services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct Recorder {
    metadata: Arc<Metadata>,
    cache: ArcSwap<DataSet>,
    metadb: MetaDb,
    hub: PubSubHub,
    metrics: Arc<Metrics>,
    sequence: u64,
}

impl Recorder {
    pub fn new(metadata: Arc<Metadata>, metrics: Arc<Metrics>) -> Self {
        let cache = ArcSwap::from_pointee(DataSet::new(metadata.clone()));
        Self {
            metadata,
            cache,
            metadb: MetaDb::new(),
            hub: PubSubHub::new(),
            metrics,
            sequence: 0,
        }
    }

    pub fn metadata(&self) -> &Arc<Metadata> {
        &self.metadata
    }

    /// Current cache generation
    pub fn cache(&self) -> Arc<DataSet> {
        self.cache.load_full()
    }

    pub fn metadb(&self) -> &MetaDb {
        &self.metadb
    }

    pub fn hub_mut(&mut self) -> &mut PubSubHub {
        &mut self.hub
    }

    pub fn subscribe<R: Resource>(&mut self, subscriber: Arc<dyn ResourceSubscriber<R>>) {
        self.hub.subscribe::<R>(subscriber);
    }

    /// Sequence of the last applied cycle
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Run one reconciliation cycle.
    ///
    /// The cycle is committed even when a subscriber fails; the first
    /// failure is returned afterwards so the caller can resync.
    pub fn refresh(&mut self, snapshot: &CloudSnapshot) -> Result<CycleSummary> {
        let sequence = match snapshot.sequence {
            Some(sequence) => sequence,
            None => self
                .sequence
                .checked_add(1)
                .ok_or(RessyncError::SequenceExhausted(self.sequence))?,
        };
        if sequence <= self.sequence {
            warn!(
                "Ignoring stale snapshot {} for {} (at {})",
                sequence, self.metadata, self.sequence
            );
            return Ok(CycleSummary {
                sequence,
                stale: true,
                ..Default::default()
            });
        }

        let mut next = DataSet::clone(&self.cache.load());
        let mut cycle = Cycle::new(
            &self.metadata,
            &mut next,
            &mut self.metadb,
            &self.hub,
            &self.metrics,
            sequence,
        );

        for kind in ResourceKind::ALL {
            apply_kind(&mut cycle, kind, snapshot);
        }
        for kind in ResourceKind::ALL.into_iter().rev() {
            remove_kind(&mut cycle, kind);
        }

        let (summary, failure) = cycle.finish();
        self.cache.store(Arc::new(next));
        self.sequence = sequence;

        info!(
            "Cycle {} for {}: {} added, {} updated, {} deleted, {} skipped",
            sequence,
            self.metadata,
            summary.added,
            summary.updated,
            summary.deleted,
            summary.skipped
        );

        match failure {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }
}

fn apply_kind(cycle: &mut Cycle<'_>, kind: ResourceKind, snapshot: &CloudSnapshot) {
    match kind {
        ResourceKind::Region => cycle.apply_live::<Regions>(&snapshot.regions),
        ResourceKind::Vpc => cycle.apply_live::<Vpcs>(&snapshot.vpcs),
        ResourceKind::Network => cycle.apply_live::<Networks>(&snapshot.networks),
        ResourceKind::Vm => cycle.apply_live::<Vms>(&snapshot.vms),
        ResourceKind::PodCluster => cycle.apply_live::<PodClusters>(&snapshot.pod_clusters),
        ResourceKind::PodNamespace => cycle.apply_live::<PodNamespaces>(&snapshot.pod_namespaces),
        ResourceKind::Pod => cycle.apply_live::<Pods>(&snapshot.pods),
        ResourceKind::PodIngress => cycle.apply_live::<PodIngresses>(&snapshot.pod_ingresses),
        ResourceKind::PodService => cycle.apply_live::<PodServices>(&snapshot.pod_services),
    }
}

fn remove_kind(cycle: &mut Cycle<'_>, kind: ResourceKind) {
    match kind {
        ResourceKind::Region => cycle.remove_unseen::<Regions>(),
        ResourceKind::Vpc => cycle.remove_unseen::<Vpcs>(),
        ResourceKind::Network => cycle.remove_unseen::<Networks>(),
        ResourceKind::Vm => cycle.remove_unseen::<Vms>(),
        ResourceKind::PodCluster => cycle.remove_unseen::<PodClusters>(),
        ResourceKind::PodNamespace => cycle.remove_unseen::<PodNamespaces>(),
        ResourceKind::Pod => cycle.remove_unseen::<Pods>(),
        ResourceKind::PodIngress => cycle.remove_unseen::<PodIngresses>(),
        ResourceKind::PodService => cycle.remove_unseen::<PodServices>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pubsub::message::{Added, Deleted, PodIngressFieldsUpdate, Updated};
    use ressync_common::model::PodIngress;
    use ressync_common::{ResourceKind, SourceRow};
    use std::sync::Mutex;

    fn recorder() -> Recorder {
        Recorder::new(
            Arc::new(Metadata::new("t1", "d1")),
            Arc::new(Metrics::new().unwrap()),
        )
    }

    fn snapshot(ingress_name: &str) -> CloudSnapshot {
        CloudSnapshot {
            regions: vec![diffbase::Region {
                base: DiffBase::new("r1"),
                name: "east".to_string(),
                ..Default::default()
            }],
            pod_clusters: vec![diffbase::PodCluster {
                base: DiffBase::new("c1"),
                name: "prod".to_string(),
                region_lcuuid: "r1".to_string(),
                ..Default::default()
            }],
            pod_namespaces: vec![diffbase::PodNamespace {
                base: DiffBase::new("ns1"),
                name: "default".to_string(),
                pod_cluster_lcuuid: "c1".to_string(),
                region_lcuuid: "r1".to_string(),
            }],
            pod_ingresses: vec![diffbase::PodIngress {
                base: DiffBase::new("ing1"),
                name: ingress_name.to_string(),
                pod_cluster_lcuuid: "c1".to_string(),
                pod_namespace_lcuuid: "ns1".to_string(),
                region_lcuuid: "r1".to_string(),
            }],
            ..Default::default()
        }
    }

    #[derive(Default)]
    struct Log {
        events: Mutex<Vec<String>>,
    }

    impl ResourceSubscriber<PodIngresses> for Log {
        fn on_batch_added(&self, _md: &Metadata, msg: &Added<PodIngress>) -> Result<()> {
            let mut events = self.events.lock().unwrap();
            events.extend(msg.items.iter().map(|i| format!("add {}", i.name)));
            Ok(())
        }

        fn on_updated(
            &self,
            _md: &Metadata,
            msg: &Updated<PodIngress, PodIngressFieldsUpdate>,
        ) -> Result<()> {
            let mut events = self.events.lock().unwrap();
            events.push(format!("update {}", msg.fields.name.new_value()));
            Ok(())
        }

        fn on_batch_deleted(&self, _md: &Metadata, msg: &Deleted<PodIngress>) -> Result<()> {
            let mut events = self.events.lock().unwrap();
            events.extend(msg.items.iter().map(|i| format!("delete {}", i.display_name())));
            Ok(())
        }
    }

    #[test]
    fn test_first_cycle_adds_everything() {
        let mut rec = recorder();
        let summary = rec.refresh(&snapshot("web")).unwrap();

        assert_eq!(summary.sequence, 1);
        assert_eq!(summary.added, 4);
        let cache = rec.cache();
        assert_eq!(cache.total_len(), 4);
        let ingress = cache
            .store::<diffbase::PodIngress>()
            .and_then(|s| s.get("ing1"))
            .unwrap();
        assert_eq!(ingress.sequence(), 1);
    }

    #[test]
    fn test_unchanged_cycle_only_bumps_sequence() {
        let mut rec = recorder();
        rec.refresh(&snapshot("web")).unwrap();
        let summary = rec.refresh(&snapshot("web")).unwrap();

        assert_eq!(summary.changes(), 0);
        let cache = rec.cache();
        let region = cache
            .store::<diffbase::Region>()
            .and_then(|s| s.get("r1"))
            .unwrap();
        assert_eq!(region.sequence(), 2);
    }

    #[test]
    fn test_rename_publishes_update_and_keeps_id() {
        let mut rec = recorder();
        let log = Arc::new(Log::default());
        rec.subscribe::<PodIngresses>(log.clone());

        rec.refresh(&snapshot("web")).unwrap();
        let id = rec.metadb().live_id::<PodIngress>("ing1").unwrap();
        let summary = rec.refresh(&snapshot("web-v2")).unwrap();

        assert_eq!(summary.updated, 1);
        assert_eq!(rec.metadb().live_id::<PodIngress>("ing1"), Some(id));
        assert_eq!(
            *log.events.lock().unwrap(),
            vec!["add web".to_string(), "update web-v2".to_string()]
        );
    }

    #[test]
    fn test_missing_entities_are_deleted() {
        let mut rec = recorder();
        let log = Arc::new(Log::default());
        rec.subscribe::<PodIngresses>(log.clone());
        rec.refresh(&snapshot("web")).unwrap();

        let mut next = snapshot("web");
        next.pod_ingresses.clear();
        let summary = rec.refresh(&next).unwrap();

        assert_eq!(summary.deleted, 1);
        assert_eq!(rec.cache().len_of(ResourceKind::PodIngress), 0);
        let row = rec.metadb().get_by_lcuuid::<PodIngress>("ing1").unwrap();
        assert!(row.is_soft_deleted());
        assert_eq!(
            log.events.lock().unwrap().last().unwrap(),
            "delete web (deleted)"
        );
    }

    #[test]
    fn test_missing_parent_skips_item_until_it_appears() {
        let mut rec = recorder();
        let mut orphan = snapshot("web");
        orphan.pod_namespaces.clear();

        let summary = rec.refresh(&orphan).unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(rec.cache().len_of(ResourceKind::PodIngress), 0);

        let summary = rec.refresh(&snapshot("web")).unwrap();
        assert_eq!(summary.added, 2);
        assert_eq!(rec.cache().len_of(ResourceKind::PodIngress), 1);
    }

    #[test]
    fn test_stale_snapshot_is_ignored() {
        let mut rec = recorder();
        let mut first = snapshot("web");
        first.sequence = Some(5);
        rec.refresh(&first).unwrap();

        let late = CloudSnapshot {
            sequence: Some(3),
            ..Default::default()
        };
        let summary = rec.refresh(&late).unwrap();

        assert!(summary.stale);
        assert_eq!(rec.sequence(), 5);
        assert_eq!(rec.cache().total_len(), 4);
    }

    #[test]
    fn test_producer_sequence_stamps_every_entry() {
        let mut rec = recorder();
        rec.refresh(&snapshot("web")).unwrap();

        let jump = CloudSnapshot {
            sequence: Some(10),
            ..snapshot("web-v2")
        };
        let summary = rec.refresh(&jump).unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.skipped, 0);

        let cache = rec.cache();
        let ingresses = cache.store::<diffbase::PodIngress>().unwrap();
        assert!(ingresses.iter().all(|(_, i)| i.sequence() == 10));
        assert_eq!(ingresses.get("ing1").unwrap().name, "web-v2");

        assert_eq!(rec.refresh(&snapshot("web-v2")).unwrap().sequence, 11);
    }

    #[test]
    fn test_sequence_exhaustion_is_an_error() {
        let mut rec = recorder();
        let last = CloudSnapshot {
            sequence: Some(u64::MAX),
            ..snapshot("web")
        };
        rec.refresh(&last).unwrap();

        let err = rec.refresh(&snapshot("web")).unwrap_err();
        assert!(matches!(err, RessyncError::SequenceExhausted(u64::MAX)));
        assert_eq!(rec.sequence(), u64::MAX);
        assert_eq!(rec.cache().total_len(), 4);

        let explicit = CloudSnapshot {
            sequence: Some(u64::MAX),
            ..snapshot("web")
        };
        assert!(rec.refresh(&explicit).unwrap().stale);
    }

    #[test]
    fn test_networks_follow_their_vpc() {
        let mut rec = recorder();
        let mut snap = snapshot("web");
        snap.vpcs.push(diffbase::Vpc {
            base: DiffBase::new("vpc1"),
            name: "prod".to_string(),
            region_lcuuid: "r1".to_string(),
            ..Default::default()
        });
        snap.networks.push(diffbase::Network {
            base: DiffBase::new("net1"),
            name: "subnet-a".to_string(),
            segmentation_id: 100,
            vpc_lcuuid: "vpc1".to_string(),
            region_lcuuid: "r1".to_string(),
            ..Default::default()
        });

        let summary = rec.refresh(&snap).unwrap();
        assert_eq!(summary.added, 6);
        let vpc_id = rec.metadb().live_id::<ressync_common::model::Vpc>("vpc1");
        let network = rec
            .metadb()
            .get_by_lcuuid::<ressync_common::model::Network>("net1")
            .unwrap();
        assert_eq!(Some(network.vpc_id), vpc_id);

        snap.networks.clear();
        let summary = rec.refresh(&snap).unwrap();
        assert_eq!(summary.deleted, 1);
        assert_eq!(rec.cache().len_of(ResourceKind::Network), 0);
    }

    #[test]
    fn test_pod_and_its_namespace_added_in_one_cycle() {
        let mut rec = recorder();
        let mut snap = snapshot("web");
        snap.pods.push(diffbase::Pod {
            base: DiffBase::new("pod1"),
            name: "web-0".to_string(),
            pod_cluster_lcuuid: "c1".to_string(),
            pod_namespace_lcuuid: "ns1".to_string(),
            ..Default::default()
        });

        let summary = rec.refresh(&snap).unwrap();
        assert_eq!(summary.added, 5);
        assert_eq!(summary.skipped, 0);
        let ns_id = rec.metadb().live_id::<ressync_common::model::PodNamespace>("ns1");
        let pod = rec
            .metadb()
            .get_by_lcuuid::<ressync_common::model::Pod>("pod1")
            .unwrap();
        assert_eq!(Some(pod.pod_namespace_id), ns_id);

        snap.pods[0].state = 2;
        let summary = rec.refresh(&snap).unwrap();
        assert_eq!(summary.updated, 1);
    }

    #[test]
    fn test_readers_keep_previous_generation() {
        let mut rec = recorder();
        rec.refresh(&snapshot("web")).unwrap();
        let before = rec.cache();

        rec.refresh(&CloudSnapshot::default()).unwrap();

        assert_eq!(before.total_len(), 4);
        assert_eq!(rec.cache().total_len(), 0);
    }

    #[test]
    fn test_readded_resource_restores_id() {
        let mut rec = recorder();
        rec.refresh(&snapshot("web")).unwrap();
        let id = rec.metadb().live_id::<PodIngress>("ing1").unwrap();

        let mut gone = snapshot("web");
        gone.pod_ingresses.clear();
        rec.refresh(&gone).unwrap();
        rec.refresh(&snapshot("web")).unwrap();

        assert_eq!(rec.metadb().live_id::<PodIngress>("ing1"), Some(id));
    }
}
