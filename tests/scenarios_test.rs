//! End-to-end scenarios driven against the in-process `Runner` with a
//! dry-run brokerage adapter and an in-memory store.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;

use vpvr_trader::application::router::{AccountEntry, Router};
use vpvr_trader::application::runner::{Runner, RunnerConfig};
use vpvr_trader::application::state_machine::{AccountConfig, PositionStateMachine};
use vpvr_trader::application::write_queue::WriteQueue;
use vpvr_trader::domain::alert::{AlertAction, AlertRecord};
use vpvr_trader::domain::ports::{AlertSource, PositionStore};
use vpvr_trader::domain::position::ManagedPosition;
use vpvr_trader::domain::ports::QuoteEvent;
use vpvr_trader::domain::trade_result::TradeResult;
use vpvr_trader::domain::vpvr::VpvrSummary;
use vpvr_trader::infrastructure::alert_source::ChannelAlertSource;
use vpvr_trader::infrastructure::brokerage::DryRunAdapter;

#[derive(Default)]
struct RecordingStore {
    inserted: Mutex<Vec<ManagedPosition>>,
    updated: Mutex<Vec<ManagedPosition>>,
    trades: Mutex<Vec<TradeResult>>,
}

#[async_trait]
impl PositionStore for RecordingStore {
    async fn insert_position(&self, position: &ManagedPosition) -> Result<()> {
        self.inserted.lock().await.push(position.clone());
        Ok(())
    }

    async fn update_position(&self, position: &ManagedPosition) -> Result<()> {
        self.updated.lock().await.push(position.clone());
        Ok(())
    }

    async fn insert_trade(&self, trade: &TradeResult) -> Result<()> {
        self.trades.lock().await.push(trade.clone());
        Ok(())
    }
}

fn es_vpvr() -> VpvrSummary {
    VpvrSummary {
        poc: dec!(5050),
        vah: dec!(5080),
        val: dec!(5020),
        range_high: dec!(5100),
        range_low: dec!(5000),
        total_volume: dec!(1000),
        bar_count: 50,
    }
}

fn buy_alert(id: &str) -> AlertRecord {
    AlertRecord {
        id: id.into(),
        timestamp: 0,
        symbol: "ES".into(),
        action: AlertAction::Buy,
        quantity_override: None,
        strategy_tag: None,
        sfx_levels: None,
        vpvr: Some(es_vpvr()),
        confirmation_score: None,
    }
}

/// S1: a long entry fills, trails through TP1, then exits on an SL breach
/// once the stop has moved to breakeven.
#[tokio::test]
async fn s1_full_lifecycle_runs_through_the_orchestrator() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();

    let store = Arc::new(RecordingStore::default());
    let write_queue = WriteQueue::new(store.clone());

    let account = AccountEntry {
        account_id: "acct-1".into(),
        symbol_filter: vec![],
        sl_buffer_ticks: 0,
        max_retries: 2,
        max_contracts: dec!(10),
        signal_filter: vec![],
    };
    let router = Router::new(vec![account], HashMap::new());

    let mut state_machines = HashMap::new();
    state_machines.insert(
        "acct-1".to_string(),
        PositionStateMachine::new(AccountConfig {
            account_id: "acct-1".into(),
            sl_buffer_ticks: 0,
            max_retries: 2,
            max_contracts: dec!(10),
            default_quantity: 1,
        }),
    );

    let adapter = Arc::new(DryRunAdapter::new());
    let alert_source = ChannelAlertSource::default();
    let alert_tx = alert_source.sender();

    let runner = Runner::new(
        router,
        state_machines,
        adapter.clone(),
        Arc::new(alert_source),
        write_queue,
        RunnerConfig {
            write_flush_interval: Duration::from_millis(20),
            sync_interval: Duration::ZERO,
            flatten_on_start: false,
            metrics_interval: Duration::from_secs(3600),
        },
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(runner.run(shutdown_rx));

    // alert -> entry at VAL (5020), TP1 at POC (5050), SL mirrors the
    // entry<->TP1 distance (30) below entry, i.e. 4990.
    alert_tx.send(buy_alert("a1")).await.unwrap();
    sleep(Duration::from_millis(60)).await;

    // Price reaches TP1: state should advance and the stop should trail to
    // breakeven (entry price).
    adapter
        .push_quote(QuoteEvent {
            contract_id: "CON-ES".into(),
            last: dec!(5050),
            timestamp: 1,
        })
        .await;
    sleep(Duration::from_millis(60)).await;

    // Price then drops through the trailed (breakeven) stop.
    adapter
        .push_quote(QuoteEvent {
            contract_id: "CON-ES".into(),
            last: dec!(5019),
            timestamp: 2,
        })
        .await;
    sleep(Duration::from_millis(60)).await;

    let _ = shutdown_tx.send(());
    handle.await.unwrap().unwrap();

    let trades = store.trades.lock().await;
    assert_eq!(trades.len(), 1, "expected exactly one closed trade");
    let trade = &trades[0];
    assert_eq!(trade.symbol, "ES");
    assert_eq!(trade.entry_price, dec!(5020));
    assert_eq!(trade.exit_price, dec!(5020)); // breakeven stop
    assert!(matches!(
        trade.highest_tp_hit,
        vpvr_trader::domain::position::HighestTp::Tp1
    ));

    let inserted = store.inserted.lock().await;
    assert_eq!(inserted.len(), 1, "one new position row should have been written");
}

/// S5/S6: a capacity-exceeded opposing alert does not create a replacement
/// position, and the process keeps running rather than panicking.
#[tokio::test]
async fn capacity_exceeded_alert_does_not_crash_the_runner() {
    let store = Arc::new(RecordingStore::default());
    let write_queue = WriteQueue::new(store.clone());

    let account = AccountEntry {
        account_id: "acct-1".into(),
        symbol_filter: vec![],
        sl_buffer_ticks: 0,
        max_retries: 0,
        max_contracts: dec!(0), // no capacity at all
        signal_filter: vec![],
    };
    let router = Router::new(vec![account], HashMap::new());

    let mut state_machines = HashMap::new();
    state_machines.insert(
        "acct-1".to_string(),
        PositionStateMachine::new(AccountConfig {
            account_id: "acct-1".into(),
            sl_buffer_ticks: 0,
            max_retries: 0,
            max_contracts: dec!(0),
            default_quantity: 1,
        }),
    );

    let adapter = Arc::new(DryRunAdapter::new());
    let alert_source = ChannelAlertSource::default();
    let alert_tx = alert_source.sender();

    let runner = Runner::new(
        router,
        state_machines,
        adapter,
        Arc::new(alert_source),
        write_queue,
        RunnerConfig {
            write_flush_interval: Duration::from_millis(20),
            sync_interval: Duration::ZERO,
            flatten_on_start: false,
            metrics_interval: Duration::from_secs(3600),
        },
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(runner.run(shutdown_rx));

    alert_tx.send(buy_alert("a1")).await.unwrap();
    sleep(Duration::from_millis(60)).await;

    let _ = shutdown_tx.send(());
    handle.await.unwrap().unwrap();

    assert!(store.inserted.lock().await.is_empty());
}
