//! Push-based metrics reporter: periodically samples in-process state into
//! the Prometheus gauges and logs a structured JSON snapshot. No inbound
//! HTTP surface — this engine only emits data, it never serves a `/metrics`
//! route.

use crate::infrastructure::observability::metrics::Metrics;
use serde::Serialize;
use std::time::Instant;
use tracing::info;

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: u64,
    pub accounts: Vec<AccountSnapshot>,
    pub write_queue_depth: usize,
}

#[derive(Serialize)]
pub struct AccountSnapshot {
    pub account_id: String,
    pub open_positions: usize,
    pub capacity_used: String,
    pub capacity_max: String,
}

/// One per-account observation fed in by the Orchestrator on each
/// reporting tick (the Runner exclusively owns the state machines, so it is
/// the only component that can gather this without breaking map ownership).
pub struct AccountObservation {
    pub account_id: String,
    pub open_positions: usize,
    pub capacity_used: rust_decimal::Decimal,
    pub capacity_max: rust_decimal::Decimal,
}

pub struct MetricsReporter {
    metrics: Metrics,
    start_time: Instant,
}

impl MetricsReporter {
    pub fn new(metrics: Metrics) -> Self {
        Self {
            metrics,
            start_time: Instant::now(),
        }
    }

    /// Updates the Prometheus gauges and emits one JSON log line. Called by
    /// the Orchestrator on its metrics timer, never on its own task, since
    /// the data it needs lives behind the Runner's exclusive state-machine
    /// ownership (§9 "map ownership").
    pub fn record(&self, accounts: &[AccountObservation], write_queue_depth: usize) {
        use rust_decimal::prelude::ToPrimitive;

        let mut snapshot_accounts = Vec::with_capacity(accounts.len());
        for account in accounts {
            self.metrics
                .open_positions
                .with_label_values(&[&account.account_id])
                .set(account.open_positions as f64);
            self.metrics
                .capacity_used
                .with_label_values(&[&account.account_id])
                .set(account.capacity_used.to_f64().unwrap_or_default());
            self.metrics
                .capacity_max
                .with_label_values(&[&account.account_id])
                .set(account.capacity_max.to_f64().unwrap_or_default());

            snapshot_accounts.push(AccountSnapshot {
                account_id: account.account_id.clone(),
                open_positions: account.open_positions,
                capacity_used: account.capacity_used.to_string(),
                capacity_max: account.capacity_max.to_string(),
            });
        }

        self.metrics
            .write_queue_depth
            .with_label_values(&["global"])
            .set(write_queue_depth as f64);

        let snapshot = MetricsSnapshot {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            accounts: snapshot_accounts,
            write_queue_depth,
        };
        match serde_json::to_string(&snapshot) {
            Ok(json) => info!(target: "metrics", "METRICS_JSON:{json}"),
            Err(err) => tracing::warn!("failed to serialize metrics snapshot: {err}"),
        }
    }

    pub fn set_reconciliation_orphans(&self, account_id: &str, count: usize) {
        self.metrics
            .reconciliation_orphans
            .with_label_values(&[account_id])
            .set(count as f64);
    }

    pub fn inc_retry(&self, account_id: &str, symbol: &str) {
        self.metrics.inc_retry(account_id, symbol);
    }

    pub fn inc_write_failure(&self, kind: &str) {
        self.metrics.inc_write_failure(kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_updates_gauges_and_does_not_panic() {
        let reporter = MetricsReporter::new(Metrics::new().unwrap());
        reporter.record(
            &[AccountObservation {
                account_id: "acct-1".into(),
                open_positions: 2,
                capacity_used: rust_decimal::Decimal::from(5),
                capacity_max: rust_decimal::Decimal::from(10),
            }],
            3,
        );
    }
}
