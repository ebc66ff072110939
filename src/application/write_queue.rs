//! Component G — Durable Write Queue (§4.7).
//!
//! Three write paths against the external `PositionStore`: a periodic
//! dirty-position flush, an immediate new-position insert, and an immediate
//! trade-log insert. The flush path is at-least-once: a failed update stays
//! dirty for the next cycle because updates are whole-snapshot writes.

use crate::domain::position::ManagedPosition;
use crate::domain::ports::PositionStore;
use crate::domain::trade_result::TradeResult;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

pub struct WriteQueue {
    store: Arc<dyn PositionStore>,
    dirty: HashMap<String, ManagedPosition>,
}

impl WriteQueue {
    pub fn new(store: Arc<dyn PositionStore>) -> Self {
        Self {
            store,
            dirty: HashMap::new(),
        }
    }

    /// §4.7 "Create new position" — inserted immediately, not batched.
    /// Returns `false` on failure so the caller can surface it in metrics.
    pub async fn insert_new(&self, position: &ManagedPosition) -> bool {
        if let Err(err) = self.store.insert_position(position).await {
            error!(position_id = %position.id, "new position insert failed: {err}");
            return false;
        }
        true
    }

    /// Stages a position whose fields changed for the next flush cycle.
    /// Overwrites any prior staged snapshot for the same id (last write wins
    /// within a cycle; flushes are whole-snapshot so this is safe).
    pub fn stage_dirty(&mut self, position: ManagedPosition) {
        self.dirty.insert(position.id.clone(), position);
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// §4.7 "Trade-log insert" — immediate, single attempt, not retried.
    /// Returns `false` on failure so the caller can surface it in metrics.
    pub async fn insert_trade(&self, trade: &TradeResult) -> bool {
        if let Err(err) = self.store.insert_trade(trade).await {
            error!(position_id = %trade.position_id, "trade log insert failed (not retried): {err}");
            return false;
        }
        true
    }

    /// Drains the dirty set, issuing an update-by-id for each position.
    /// Failures are re-staged for the next cycle (at-least-once). Used both
    /// by the periodic timer and synchronously on shutdown. Returns the
    /// number of updates that failed this cycle, for the metrics reporter.
    pub async fn flush(&mut self) -> usize {
        if self.dirty.is_empty() {
            return 0;
        }
        let batch: Vec<ManagedPosition> = self.dirty.drain().map(|(_, v)| v).collect();
        info!(count = batch.len(), "flushing dirty positions");
        let mut failures = 0;
        for position in batch {
            if let Err(err) = self.store.update_position(&position).await {
                error!(position_id = %position.id, "position update failed, re-staging: {err}");
                self.dirty.insert(position.id.clone(), position);
                failures += 1;
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeStore {
        fail_updates: AtomicBool,
        update_calls: AtomicUsize,
        insert_calls: AtomicUsize,
        trade_calls: AtomicUsize,
        last_updated: Mutex<Vec<String>>,
    }

    impl FakeStore {
        fn new() -> Self {
            Self {
                fail_updates: AtomicBool::new(false),
                update_calls: AtomicUsize::new(0),
                insert_calls: AtomicUsize::new(0),
                trade_calls: AtomicUsize::new(0),
                last_updated: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PositionStore for FakeStore {
        async fn insert_position(&self, _position: &ManagedPosition) -> anyhow::Result<()> {
            self.insert_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn update_position(&self, position: &ManagedPosition) -> anyhow::Result<()> {
            self.update_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_updates.load(Ordering::SeqCst) {
                anyhow::bail!("simulated failure");
            }
            self.last_updated.lock().unwrap().push(position.id.clone());
            Ok(())
        }

        async fn insert_trade(&self, _trade: &TradeResult) -> anyhow::Result<()> {
            self.trade_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn sample_position(id: &str) -> ManagedPosition {
        use crate::domain::position::{PositionState, RetryLadder, Side};
        use crate::domain::vpvr::VpvrSummary;
        let now = Utc::now();
        ManagedPosition {
            id: id.to_string(),
            alert_id: "a1".into(),
            original_alert_id: "a1".into(),
            symbol: "ES".into(),
            side: Side::Long,
            state: PositionState::PendingEntry,
            target_entry_price: Decimal::ZERO,
            fill_price: None,
            quantity: 1,
            contract_id: "CON-ES".into(),
            account_id: "ACC1".into(),
            current_sl: Decimal::ZERO,
            initial_sl: Decimal::ZERO,
            tp1: Decimal::ZERO,
            tp2: Decimal::ZERO,
            tp3: Decimal::ZERO,
            last_price: None,
            unrealized_pnl: Decimal::ZERO,
            vpvr_snapshot: VpvrSummary {
                poc: Decimal::ZERO,
                vah: Decimal::ZERO,
                val: Decimal::ZERO,
                range_high: Decimal::ZERO,
                range_low: Decimal::ZERO,
                total_volume: Decimal::ZERO,
                bar_count: 0,
            },
            confirmation_score: None,
            llm_reasoning: None,
            llm_confidence: None,
            created_at: now,
            updated_at: now,
            closed_at: None,
            exit_price: None,
            exit_reason: None,
            retry_count: 0,
            max_retries: 2,
            retry_entry_levels: RetryLadder { levels: [Decimal::ZERO; 3] },
            strategy_tag: None,
            entry_order_id: None,
            dirty: true,
        }
    }

    #[tokio::test]
    async fn flush_clears_dirty_set_on_success() {
        let store = Arc::new(FakeStore::new());
        let mut queue = WriteQueue::new(store.clone());
        queue.stage_dirty(sample_position("p1"));
        queue.stage_dirty(sample_position("p2"));
        assert_eq!(queue.dirty_count(), 2);

        queue.flush().await;
        assert_eq!(queue.dirty_count(), 0);
        assert_eq!(store.update_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_update_is_restaged_for_next_cycle() {
        let store = Arc::new(FakeStore::new());
        store.fail_updates.store(true, Ordering::SeqCst);
        let mut queue = WriteQueue::new(store.clone());
        queue.stage_dirty(sample_position("p1"));

        queue.flush().await;
        assert_eq!(queue.dirty_count(), 1);

        store.fail_updates.store(false, Ordering::SeqCst);
        queue.flush().await;
        assert_eq!(queue.dirty_count(), 0);
        assert_eq!(store.last_updated.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn new_position_insert_is_immediate() {
        let store = Arc::new(FakeStore::new());
        let queue = WriteQueue::new(store.clone());
        queue.insert_new(&sample_position("p1")).await;
        assert_eq!(store.insert_calls.load(Ordering::SeqCst), 1);
    }
}
