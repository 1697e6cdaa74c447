//! # Prometheus Metrics
//!
//! Import counters for one `strata-node` run, rendered in the Prometheus
//! text exposition format on request (`import --metrics`).
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use strata_protocol::ImportOutcome;

/// Holds all Prometheus metric handles for an import run.
#[derive(Clone)]
pub struct ImportMetrics {
    registry: Registry,
    /// Imports by outcome label: accepted, known, deferred, rejected.
    pub imports_total: IntCounterVec,
    /// Accepted blocks that moved the tip off its previous branch.
    pub reorgs_total: IntCounter,
    /// Number of the canonical tip.
    pub tip_number: IntGauge,
    /// Wall time of one `import` call, in seconds.
    pub import_duration_seconds: Histogram,
}

impl ImportMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("strata".into()), None)?;

        let imports_total = IntCounterVec::new(
            Opts::new("imports_total", "Block import attempts by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(imports_total.clone()))?;

        let reorgs_total = IntCounter::new(
            "reorgs_total",
            "Imports that switched the canonical tip to another branch",
        )?;
        registry.register(Box::new(reorgs_total.clone()))?;

        let tip_number = IntGauge::new("tip_number", "Number of the canonical tip")?;
        registry.register(Box::new(tip_number.clone()))?;

        let import_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("import_duration_seconds", "Time spent in a single block import")
                .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(import_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            imports_total,
            reorgs_total,
            tip_number,
            import_duration_seconds,
        })
    }

    /// Count one import outcome.
    pub fn observe(&self, outcome: &ImportOutcome) {
        self.imports_total.with_label_values(&[outcome.label()]).inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_protocol::chain::{DeferReason, RejectReason};

    #[test]
    fn outcomes_counted_by_label() {
        let metrics = ImportMetrics::new().unwrap();
        metrics.observe(&ImportOutcome::AlreadyKnown([1; 32]));
        metrics.observe(&ImportOutcome::AlreadyKnown([2; 32]));
        metrics.observe(&ImportOutcome::Deferred(DeferReason::UnknownParent([3; 32])));
        metrics.observe(&ImportOutcome::Rejected(RejectReason::InvalidDifficulty));

        assert_eq!(metrics.imports_total.with_label_values(&["known"]).get(), 2);
        assert_eq!(metrics.imports_total.with_label_values(&["deferred"]).get(), 1);
        assert_eq!(metrics.imports_total.with_label_values(&["rejected"]).get(), 1);
        assert_eq!(metrics.imports_total.with_label_values(&["accepted"]).get(), 0);
    }

    #[test]
    fn encode_uses_namespace() {
        let metrics = ImportMetrics::new().unwrap();
        metrics.tip_number.set(42);
        metrics.reorgs_total.inc();
        metrics.observe(&ImportOutcome::AlreadyKnown([0; 32]));

        let text = metrics.encode().unwrap();
        assert!(text.contains("strata_tip_number 42"));
        assert!(text.contains("strata_reorgs_total 1"));
        assert!(text.contains("strata_imports_total{outcome=\"known\"} 1"));
    }
}
