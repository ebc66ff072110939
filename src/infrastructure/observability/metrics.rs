//! Prometheus metric definitions. Push-based only: no HTTP exporter.

use prometheus::{
    CounterVec, GaugeVec, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGaugeVec},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Open position count, labelled by account.
    pub open_positions: GenericGaugeVec<AtomicF64>,
    /// Micro-equivalent capacity in use, labelled by account.
    pub capacity_used: GenericGaugeVec<AtomicF64>,
    /// Configured micro-equivalent capacity ceiling, labelled by account.
    pub capacity_max: GenericGaugeVec<AtomicF64>,
    /// Dirty-position count awaiting the next flush cycle.
    pub write_queue_depth: GenericGaugeVec<AtomicF64>,
    /// Persistence write failures, labelled by row kind (position/trade).
    pub write_failures_total: CounterVec,
    /// Retry-ladder invocations, labelled by account and symbol.
    pub retry_invocations_total: CounterVec,
    /// Orphaned brokerage positions found by the last reconciliation pass.
    pub reconciliation_orphans: GenericGaugeVec<AtomicF64>,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let open_positions = GaugeVec::new(
            Opts::new("vpvr_open_positions", "Open positions per account"),
            &["account_id"],
        )?;
        registry.register(Box::new(open_positions.clone()))?;

        let capacity_used = GaugeVec::new(
            Opts::new(
                "vpvr_capacity_used",
                "Micro-equivalent capacity currently committed per account",
            ),
            &["account_id"],
        )?;
        registry.register(Box::new(capacity_used.clone()))?;

        let capacity_max = GaugeVec::new(
            Opts::new(
                "vpvr_capacity_max",
                "Configured micro-equivalent capacity ceiling per account",
            ),
            &["account_id"],
        )?;
        registry.register(Box::new(capacity_max.clone()))?;

        let write_queue_depth = GaugeVec::new(
            Opts::new(
                "vpvr_write_queue_depth",
                "Dirty positions awaiting the next flush cycle",
            ),
            &["account_id"],
        )?;
        registry.register(Box::new(write_queue_depth.clone()))?;

        let write_failures_total = CounterVec::new(
            Opts::new("vpvr_write_failures_total", "Persistence write failures"),
            &["kind"],
        )?;
        registry.register(Box::new(write_failures_total.clone()))?;

        let retry_invocations_total = CounterVec::new(
            Opts::new(
                "vpvr_retry_invocations_total",
                "Retry-ladder entries placed",
            ),
            &["account_id", "symbol"],
        )?;
        registry.register(Box::new(retry_invocations_total.clone()))?;

        let reconciliation_orphans = GaugeVec::new(
            Opts::new(
                "vpvr_reconciliation_orphans",
                "Brokerage positions with no local counterpart, per account",
            ),
            &["account_id"],
        )?;
        registry.register(Box::new(reconciliation_orphans.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            open_positions,
            capacity_used,
            capacity_max,
            write_queue_depth,
            write_failures_total,
            retry_invocations_total,
            reconciliation_orphans,
        })
    }

    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn inc_write_failure(&self, kind: &str) {
        self.write_failures_total.with_label_values(&[kind]).inc();
    }

    pub fn inc_retry(&self, account_id: &str, symbol: &str) {
        self.retry_invocations_total
            .with_label_values(&[account_id, symbol])
            .inc();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("failed to build default Metrics registry")
    }
}
