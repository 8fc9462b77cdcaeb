//! Prometheus metrics for the sync controller

use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Metrics recorded by the control loop
#[derive(Clone)]
pub struct ControllerMetrics {
    /// Reconciliation passes by outcome
    pub reconcile_passes_total: IntCounterVec,
    /// Destination table updates by terminal status
    pub route_table_updates_total: IntCounterVec,
    /// Node events taken off the queue by the control loop, by kind.
    /// Events still queued at shutdown are not counted.
    pub node_events_total: IntCounterVec,
    /// Duration of a reconciliation pass in seconds
    pub reconcile_duration_seconds: HistogramVec,
    /// Unix time of the last pass that completed without error
    pub last_success_timestamp_seconds: Gauge,
    pub registry: Arc<Registry>,
}

impl ControllerMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let reconcile_passes_total = IntCounterVec::new(
            Opts::new("rtsync_reconcile_passes_total", "Reconciliation passes by outcome"),
            &["outcome"],
        )?;

        let route_table_updates_total = IntCounterVec::new(
            Opts::new(
                "rtsync_route_table_updates_total",
                "Destination route table updates by terminal status",
            ),
            &["status"],
        )?;

        let node_events_total = IntCounterVec::new(
            Opts::new("rtsync_node_events_total", "Node events processed by kind"),
            &["kind"],
        )?;

        let reconcile_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "rtsync_reconcile_duration_seconds",
                "Reconciliation pass latency in seconds",
            ),
            &["outcome"],
        )?;

        let last_success_timestamp_seconds = Gauge::new(
            "rtsync_last_success_timestamp_seconds",
            "Unix time of the last successful reconciliation pass",
        )?;

        registry.register(Box::new(reconcile_passes_total.clone()))?;
        registry.register(Box::new(route_table_updates_total.clone()))?;
        registry.register(Box::new(node_events_total.clone()))?;
        registry.register(Box::new(reconcile_duration_seconds.clone()))?;
        registry.register(Box::new(last_success_timestamp_seconds.clone()))?;

        Ok(Self {
            reconcile_passes_total,
            route_table_updates_total,
            node_events_total,
            reconcile_duration_seconds,
            last_success_timestamp_seconds,
            registry,
        })
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub(crate) fn observe_pass(&self, outcome: &str, seconds: f64) {
        self.reconcile_passes_total.with_label_values(&[outcome]).inc();
        self.reconcile_duration_seconds
            .with_label_values(&[outcome])
            .observe(seconds);
    }

    pub(crate) fn observe_update(&self, status: &str) {
        self.route_table_updates_total.with_label_values(&[status]).inc();
    }

    pub(crate) fn observe_event(&self, kind: &str) {
        self.node_events_total.with_label_values(&[kind]).inc();
    }

    pub(crate) fn mark_success(&self) {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        self.last_success_timestamp_seconds.set(now);
    }
}
