use crate::metrics::collector::Metrics;
use crate::{RessyncError, Result};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;

/// Renders the shared counters in the Prometheus text exposition format
pub struct PrometheusExporter {
    metrics: Arc<Metrics>,
}

impl PrometheusExporter {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    pub fn format_current_metrics(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let families = self.metrics.registry().gather();

        let mut buf = Vec::new();
        encoder.encode(&families, &mut buf)?;

        String::from_utf8(buf).map_err(|e| RessyncError::MetricsError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ChOp;

    #[test]
    fn test_format_contains_counters() {
        let metrics = Arc::new(Metrics::new().unwrap());
        metrics.record_rows("ch_pod_ingress", ChOp::Upsert, 2);

        let exporter = PrometheusExporter::new(metrics);
        let text = exporter.format_current_metrics().unwrap();

        assert!(text.contains("# TYPE ressync_ch_rows_total counter"));
        assert!(text.contains("table=\"ch_pod_ingress\""));
    }
}
