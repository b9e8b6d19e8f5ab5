pub mod collector;
pub mod exporter;

pub use collector::{ChOp, Metrics, RecorderEvent};
pub use exporter::PrometheusExporter;
