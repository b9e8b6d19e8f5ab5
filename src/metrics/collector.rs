use crate::Result;
use prometheus::{IntCounterVec, Opts, Registry};
use ressync_common::ResourceKind;

/// Lifecycle event observed by the recorder for one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderEvent {
    Added,
    Updated,
    Deleted,
    /// Live item dropped this cycle (stale sequence or unresolved parent)
    Skipped,
}

impl RecorderEvent {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RecorderEvent::Added => "added",
            RecorderEvent::Updated => "updated",
            RecorderEvent::Deleted => "deleted",
            RecorderEvent::Skipped => "skipped",
        }
    }
}

/// Write applied to a CH table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChOp {
    Upsert,
    Update,
    Delete,
    SoftDelete,
    Sync,
}

impl ChOp {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ChOp::Upsert => "upsert",
            ChOp::Update => "update",
            ChOp::Delete => "delete",
            ChOp::SoftDelete => "soft_delete",
            ChOp::Sync => "sync",
        }
    }
}

/// Counters shared by the recorder and every CH subscriber
pub struct Metrics {
    registry: Registry,
    recorder_events: IntCounterVec,
    ch_rows: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let recorder_events = IntCounterVec::new(
            Opts::new(
                "ressync_recorder_events_total",
                "Resource lifecycle events emitted by the recorder",
            ),
            &["resource", "event"],
        )?;
        let ch_rows = IntCounterVec::new(
            Opts::new("ressync_ch_rows_total", "Rows written to CH tables"),
            &["table", "op"],
        )?;

        registry.register(Box::new(recorder_events.clone()))?;
        registry.register(Box::new(ch_rows.clone()))?;

        Ok(Self {
            registry,
            recorder_events,
            ch_rows,
        })
    }

    pub fn record_event(&self, kind: ResourceKind, event: RecorderEvent, count: usize) {
        self.recorder_events
            .with_label_values(&[kind.as_str(), event.as_str()])
            .inc_by(count as u64);
    }

    pub fn record_rows(&self, table: &str, op: ChOp, count: usize) {
        self.ch_rows
            .with_label_values(&[table, op.as_str()])
            .inc_by(count as u64);
    }

    pub fn events(&self, kind: ResourceKind, event: RecorderEvent) -> u64 {
        self.recorder_events
            .with_label_values(&[kind.as_str(), event.as_str()])
            .get()
    }

    pub fn rows(&self, table: &str, op: ChOp) -> u64 {
        self.ch_rows.with_label_values(&[table, op.as_str()]).get()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
