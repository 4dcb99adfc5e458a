//! Prometheus metrics for query tasks and aggregation.
//!
//! Recording is always safe: without an installed recorder the macros are
//! no-ops, so library users and tests pay nothing.

use crate::types::{SourceKind, ToolResult};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricName {
    TasksTotal,
    TaskDurationSeconds,
    GenesParsed,
    ConsensusGroups,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::TasksTotal => "gene_consensus_tasks_total",
            MetricName::TaskDurationSeconds => "gene_consensus_task_duration_seconds",
            MetricName::GenesParsed => "gene_consensus_genes_parsed_total",
            MetricName::ConsensusGroups => "gene_consensus_groups",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record the outcome of one source's query task
pub fn record_task_outcome(source: SourceKind, result: &ToolResult, elapsed: Duration) {
    let outcome = match result {
        ToolResult::Success { .. } => "success".to_string(),
        ToolResult::Failure { kind, .. } => kind.to_string(),
    };
    ::metrics::counter!(MetricName::TasksTotal.as_str(), "source" => source.label(), "outcome" => outcome)
        .increment(1);
    ::metrics::histogram!(MetricName::TaskDurationSeconds.as_str(), "source" => source.label())
        .record(elapsed.as_secs_f64());
    if let ToolResult::Success { genes } = result {
        ::metrics::counter!(MetricName::GenesParsed.as_str(), "source" => source.label())
            .increment(genes.len() as u64);
    }
}

pub fn record_groups(groups: usize) {
    ::metrics::gauge!(MetricName::ConsensusGroups.as_str()).set(groups as f64);
}

/// Installs the Prometheus exporter on `0.0.0.0:port`. Failure is logged, not
/// fatal; the run proceeds without metrics.
pub fn init_metrics(port: u16) {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => info!("Prometheus exporter listening on http://{}/metrics", addr),
        Err(e) => warn!("Prometheus exporter install failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeneError;

    #[test]
    fn test_metric_names_are_prefixed() {
        for name in [
            MetricName::TasksTotal,
            MetricName::TaskDurationSeconds,
            MetricName::GenesParsed,
            MetricName::ConsensusGroups,
        ] {
            assert!(name.to_string().starts_with("gene_consensus_"));
        }
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_task_outcome(SourceKind::Glimmer, &ToolResult::Success { genes: vec![] }, Duration::from_millis(5));
        record_task_outcome(SourceKind::Rast, &ToolResult::failure(&GeneError::Cancelled), Duration::ZERO);
        record_groups(3);
    }

    #[test]
    fn test_exporter_renders_recorded_metrics() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        ::metrics::with_local_recorder(&recorder, || {
            let genes = vec![crate::gene::Gene::new(10, 100, crate::gene::Direction::Forward, SourceKind::Glimmer).unwrap()];
            record_task_outcome(SourceKind::Glimmer, &ToolResult::Success { genes }, Duration::from_millis(5));
            record_groups(7);
        });

        let rendered = handle.render();
        assert!(rendered.contains("gene_consensus_groups 7"), "{}", rendered);
        assert!(rendered.contains("gene_consensus_tasks_total{"), "{}", rendered);
        assert!(rendered.contains("source=\"glimmer\""), "{}", rendered);
        assert!(rendered.contains("gene_consensus_genes_parsed_total{source=\"glimmer\"} 1"), "{}", rendered);
    }
}
