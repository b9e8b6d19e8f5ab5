//! Drives reconciliation cycles from a snapshot source
//!
//! Each cycle runs the recorder, then any CH table syncs the cycle asked
//! for. Cycle work is synchronous; only waiting for snapshots and pacing
//! are async.

use crate::chdb::ChStore;
use crate::config::RessyncConfig;
use crate::metrics::Metrics;
use crate::recorder::{CloudSnapshot, CycleSummary, Recorder};
use crate::tagrecorder::TagRecorder;
use crate::{RessyncError, Result};
use async_trait::async_trait;
use ressync_common::Metadata;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Producer of live inventory snapshots
#[async_trait]
pub trait SnapshotSource: Send {
    /// Next snapshot, or `None` once the source is exhausted
    async fn next_snapshot(&mut self) -> Result<Option<CloudSnapshot>>;
}

/// Recorded sequence of snapshots for one scope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub metadata: Metadata,
    pub cycles: Vec<CloudSnapshot>,
}

impl Scenario {
    /// Parse a YAML or JSON scenario
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(raw)
            .map_err(|e| RessyncError::ScenarioError(format!("Invalid scenario: {}", e)))?;
        if scenario.cycles.is_empty() {
            return Err(RessyncError::ScenarioError(
                "Scenario has no cycles".to_string(),
            ));
        }
        Ok(scenario)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        debug!("Loading scenario from {}", path.display());
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            RessyncError::ScenarioError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&raw)
    }
}

/// Replays the cycles of a scenario in order
pub struct ScenarioSource {
    cycles: VecDeque<CloudSnapshot>,
}

impl ScenarioSource {
    pub fn new(cycles: Vec<CloudSnapshot>) -> Self {
        Self {
            cycles: cycles.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.cycles.len()
    }
}

#[async_trait]
impl SnapshotSource for ScenarioSource {
    async fn next_snapshot(&mut self) -> Result<Option<CloudSnapshot>> {
        Ok(self.cycles.pop_front())
    }
}

pub struct Pipeline {
    recorder: Recorder,
    tag_recorder: TagRecorder,
}

impl Pipeline {
    pub fn new(
        metadata: Metadata,
        config: &RessyncConfig,
        store: Arc<dyn ChStore>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let mut recorder = Recorder::new(Arc::new(metadata), metrics.clone());
        let mut tag_recorder = TagRecorder::new(store, metrics, config.tag_recorder.clone());
        tag_recorder.subscribe_all(recorder.hub_mut());

        Self {
            recorder,
            tag_recorder,
        }
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn tag_recorder(&self) -> &TagRecorder {
        &self.tag_recorder
    }

    /// One cycle: reconcile, then run pending table syncs.
    ///
    /// Syncs run even when a subscriber failed during the cycle; the cycle
    /// error takes precedence over a sync error.
    pub fn run_cycle(&mut self, snapshot: &CloudSnapshot) -> Result<CycleSummary> {
        let cycle = self.recorder.refresh(snapshot);
        let synced = self
            .tag_recorder
            .sync_pending(self.recorder.metadata(), self.recorder.metadb());

        match (cycle, synced) {
            (Err(e), _) => Err(e),
            (Ok(_), Err(e)) => Err(e),
            (Ok(summary), Ok(tables)) => {
                if tables > 0 {
                    info!("Cycle {} resynced {} tables", summary.sequence, tables);
                }
                Ok(summary)
            }
        }
    }

    /// Run cycles until the source is exhausted or `shutdown` resolves,
    /// waiting `pace` between cycles
    pub async fn run<S, F>(
        &mut self,
        source: &mut S,
        pace: Duration,
        shutdown: F,
    ) -> Result<Vec<CycleSummary>>
    where
        S: SnapshotSource,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut summaries = Vec::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping after {} cycles", summaries.len());
                    break;
                }
                next = source.next_snapshot() => next?,
            };

            let Some(snapshot) = next else {
                debug!("Snapshot source exhausted");
                break;
            };

            match self.run_cycle(&snapshot) {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    error!("Cycle failed: {}", e);
                    return Err(e);
                }
            }

            if !pace.is_zero() {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => {
                        info!("Shutdown requested, stopping after {} cycles", summaries.len());
                        break;
                    }
                    _ = tokio::time::sleep(pace) => {}
                }
            }
        }

        Ok(summaries)
    }
}
