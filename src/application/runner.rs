//! Component I — Orchestrator (§4.8). Demultiplexes alerts, brokerage
//! user-events, quote ticks, and timers onto the per-account state machines,
//! then dispatches the resulting `Intent`s to the brokerage adapter and the
//! write queue. Everything here runs on one logical thread of control (§5):
//! concurrency between events comes only from interleaving at the `.await`
//! points on brokerage calls, persistence writes, and timers.

use crate::application::reconciliation;
use crate::application::retry_coordinator::{RetryCoordinator, RetryEntryIntent};
use crate::application::router::Router;
use crate::application::state_machine::PositionStateMachine;
use crate::application::write_queue::WriteQueue;
use crate::domain::intents::Intent;
use crate::domain::ports::{AlertSource, BrokerageAdapter, OrderEvent, QuoteEvent};
use crate::domain::position::Side;
use crate::infrastructure::observability::reporter::AccountObservation;
use crate::infrastructure::observability::{Metrics, MetricsReporter};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};

pub struct RunnerConfig {
    pub write_flush_interval: Duration,
    /// Zero disables reconciliation (§4.9).
    pub sync_interval: Duration,
    pub flatten_on_start: bool,
    /// How often the push-based metrics snapshot is logged and the
    /// Prometheus gauges refreshed (§10.5).
    pub metrics_interval: Duration,
}

pub struct Runner {
    router: Router,
    state_machines: HashMap<String, PositionStateMachine>,
    coordinators: HashMap<String, RetryCoordinator>,
    adapter: Arc<dyn BrokerageAdapter>,
    alert_source: Arc<dyn AlertSource>,
    write_queue: WriteQueue,
    metrics: MetricsReporter,
    config: RunnerConfig,
}

impl Runner {
    pub fn new(
        router: Router,
        state_machines: HashMap<String, PositionStateMachine>,
        adapter: Arc<dyn BrokerageAdapter>,
        alert_source: Arc<dyn AlertSource>,
        write_queue: WriteQueue,
        config: RunnerConfig,
    ) -> Self {
        let coordinators = state_machines
            .keys()
            .map(|id| (id.clone(), RetryCoordinator::new(id.clone())))
            .collect();
        Self {
            router,
            state_machines,
            coordinators,
            adapter,
            alert_source,
            write_queue,
            metrics: MetricsReporter::new(Metrics::default()),
            config,
        }
    }

    /// §4.8 "start()" followed by the event-loop demultiplexer. Returns when
    /// `shutdown` fires or a required stream closes.
    pub async fn run(mut self, shutdown: oneshot::Receiver<()>) -> anyhow::Result<()> {
        self.adapter.authenticate().await?;

        if self.config.flatten_on_start {
            let account_ids: Vec<String> = self.state_machines.keys().cloned().collect();
            for account_id in account_ids {
                match self.adapter.flatten(&account_id).await {
                    Ok(result) => info!(
                        account = %account_id, cancelled = result.orders_cancelled,
                        closed = result.positions_closed, "flattened account at startup"
                    ),
                    Err(err) => warn!(account = %account_id, "flatten at startup failed: {err}"),
                }
            }
        }

        let mut order_events = self.adapter.take_order_events();
        let mut quote_events = self.adapter.take_quote_events();
        let mut alerts = self.alert_source.subscribe();

        for contract_id in self.router.seeded_contract_ids() {
            if self.router.mark_subscribed(&contract_id) {
                if let Err(err) = self.adapter.subscribe_quote(&contract_id).await {
                    warn!(%contract_id, "initial quote subscribe failed: {err}");
                }
            }
        }

        let mut flush_timer = tokio::time::interval(self.config.write_flush_interval);
        let reconciliation_enabled = !self.config.sync_interval.is_zero();
        let mut sync_timer = tokio::time::interval(if reconciliation_enabled {
            self.config.sync_interval
        } else {
            Duration::from_secs(3600)
        });
        let mut metrics_timer = tokio::time::interval(self.config.metrics_interval);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                maybe_alert = alerts.recv() => {
                    match maybe_alert {
                        Some(alert) => self.handle_alert(alert).await,
                        None => { warn!("alert source closed"); break; }
                    }
                }
                maybe_event = order_events.recv() => {
                    match maybe_event {
                        Some(event) => self.handle_order_event(event).await,
                        None => { warn!("brokerage user-event stream closed"); break; }
                    }
                }
                maybe_quote = quote_events.recv() => {
                    match maybe_quote {
                        Some(quote) => self.handle_quote_event(quote).await,
                        None => { warn!("brokerage quote stream closed"); break; }
                    }
                }
                _ = flush_timer.tick() => {
                    let failures = self.write_queue.flush().await;
                    if failures > 0 {
                        self.metrics.inc_write_failure("position");
                    }
                }
                _ = sync_timer.tick(), if reconciliation_enabled => {
                    self.run_reconciliation().await;
                }
                _ = metrics_timer.tick() => {
                    self.record_metrics();
                }
            }
        }

        self.write_queue.flush().await;
        Ok(())
    }

    async fn handle_alert(&mut self, alert: crate::domain::alert::AlertRecord) {
        let Some(contract_id) = self.router.resolve_contract_id(&alert.symbol) else {
            warn!(symbol = %alert.symbol, "dropping alert: unknown symbol");
            return;
        };
        if self.router.mark_subscribed(&contract_id) {
            if let Err(err) = self.adapter.subscribe_quote(&contract_id).await {
                warn!(%contract_id, "quote subscribe failed: {err}");
            }
        }

        let account_ids: Vec<String> = self
            .router
            .select_accounts(&alert)
            .into_iter()
            .map(|a| a.account_id.clone())
            .collect();

        for account_id in account_ids {
            // §4.5 "must be invoked to clean up any pending retry pair when an
            // opposing alert or a close alert arrives on the same symbol".
            // Gated on the coordinator's own tracking, not the position's
            // state: once onRetryOrderPlaced fires the position is back to
            // pending_entry while both retry legs are still live on the
            // broker, so a position-state check alone would leave the
            // fallback leg dangling.
            let retry_pair_live = self
                .coordinators
                .get(&account_id)
                .map(|c| c.is_tracking(&alert.symbol))
                .unwrap_or(false);
            if retry_pair_live {
                if let Some(coordinator) = self.coordinators.get_mut(&account_id) {
                    coordinator.cancel_pending(self.adapter.as_ref(), &alert.symbol).await;
                }
            }

            let intents = match self.state_machines.get_mut(&account_id) {
                Some(sm) => sm.on_alert(&alert, &contract_id),
                None => continue,
            };
            self.handle_intents(intents).await;
        }
    }

    async fn handle_order_event(&mut self, event: OrderEvent) {
        match event {
            OrderEvent::Filled { order_id, fill_price } => {
                let account_ids: Vec<String> = self.coordinators.keys().cloned().collect();
                for account_id in account_ids {
                    let outcome = self
                        .coordinators
                        .get(&account_id)
                        .and_then(|c| c.lookup_fill(&order_id));
                    let Some(outcome) = outcome else { continue };

                    if let Err(err) = self.adapter.cancel(&outcome.other_order_id, &account_id).await {
                        warn!(account = %account_id, "failed to cancel other retry leg: {err}");
                    }
                    if let Some(coordinator) = self.coordinators.get_mut(&account_id) {
                        coordinator.clear(&outcome.symbol);
                    }
                    if outcome.filled_was_fallback {
                        if let Some(sm) = self.state_machines.get_mut(&account_id) {
                            sm.record_entry_order_id(&outcome.symbol, order_id.clone());
                        }
                    }
                    break;
                }

                let account_ids: Vec<String> = self.state_machines.keys().cloned().collect();
                for account_id in account_ids {
                    let intents = self
                        .state_machines
                        .get_mut(&account_id)
                        .map(|sm| sm.on_fill(&order_id, fill_price))
                        .unwrap_or_default();
                    if !intents.is_empty() {
                        self.handle_intents(intents).await;
                    }
                }
            }
            OrderEvent::Rejected { order_id, message } => {
                let account_ids: Vec<String> = self.state_machines.keys().cloned().collect();
                for account_id in account_ids {
                    let intents = self
                        .state_machines
                        .get_mut(&account_id)
                        .map(|sm| sm.on_order_rejected(&order_id, &message))
                        .unwrap_or_default();
                    if !intents.is_empty() {
                        self.handle_intents(intents).await;
                        break;
                    }
                }
            }
            OrderEvent::PositionUpdate { account_id, contract_id, size, average_price } => {
                if !size.is_zero() {
                    return;
                }
                let Some(symbol) = self.router.symbol_for_contract(&contract_id) else {
                    return;
                };

                let target_accounts: Vec<String> = if self.state_machines.contains_key(&account_id) {
                    vec![account_id.clone()]
                } else {
                    self.state_machines.keys().cloned().collect()
                };

                for aid in target_accounts {
                    let intents = self
                        .state_machines
                        .get_mut(&aid)
                        .map(|sm| sm.on_close(&symbol, average_price, "eod_liquidation"))
                        .unwrap_or_default();
                    if !intents.is_empty() {
                        self.handle_intents(intents).await;
                    }
                }
            }
        }
    }

    async fn handle_quote_event(&mut self, quote: QuoteEvent) {
        let Some(symbol) = self.router.symbol_for_contract(&quote.contract_id) else {
            return;
        };
        let account_ids: Vec<String> = self.state_machines.keys().cloned().collect();
        for account_id in account_ids {
            let intents = self
                .state_machines
                .get_mut(&account_id)
                .map(|sm| sm.on_tick(&symbol, quote.last, quote.timestamp))
                .unwrap_or_default();
            if !intents.is_empty() {
                self.handle_intents(intents).await;
            }
        }
    }

    /// Samples every account's position/capacity state and the write
    /// queue's dirty-set depth into the push-based metrics reporter
    /// (§10.5). Never suspends; reads only in-memory state.
    fn record_metrics(&self) {
        let accounts: Vec<AccountObservation> = self
            .state_machines
            .iter()
            .map(|(account_id, sm)| {
                let (used, max) = sm.capacity_snapshot();
                AccountObservation {
                    account_id: account_id.clone(),
                    open_positions: sm.positions().count(),
                    capacity_used: used,
                    capacity_max: max,
                }
            })
            .collect();
        self.metrics.record(&accounts, self.write_queue.dirty_count());
    }

    async fn run_reconciliation(&mut self) {
        let account_ids: Vec<String> = self.state_machines.keys().cloned().collect();
        for account_id in account_ids {
            let local: Vec<(String, String)> = self
                .state_machines
                .get(&account_id)
                .map(|sm| sm.positions().map(|p| (p.symbol.clone(), p.contract_id.clone())).collect())
                .unwrap_or_default();

            let open = match self.adapter.list_positions(&account_id).await {
                Ok(open) => open,
                Err(err) => {
                    warn!(account = %account_id, "reconciliation skipped, listPositions failed: {err}");
                    continue;
                }
            };

            let outcome = reconciliation::reconcile(&local, &open);
            self.metrics.set_reconciliation_orphans(&account_id, outcome.orphans.len());
            for contract_id in &outcome.orphans {
                warn!(account = %account_id, %contract_id, "brokerage reports an open position with no local match");
            }
            for symbol in outcome.to_close {
                let exit_price = self
                    .state_machines
                    .get(&account_id)
                    .and_then(|sm| sm.position(&symbol))
                    .map(|p| p.last_price.unwrap_or(p.current_sl))
                    .unwrap_or(Decimal::ZERO);
                let intents = self
                    .state_machines
                    .get_mut(&account_id)
                    .map(|sm| sm.on_close(&symbol, exit_price, "eod_liquidation"))
                    .unwrap_or_default();
                if !intents.is_empty() {
                    self.handle_intents(intents).await;
                }
            }
        }
    }

    /// §4.8 "The orchestrator also listens for each State Machine event".
    async fn handle_intents(&mut self, intents: Vec<Intent>) {
        let mut queue: VecDeque<Intent> = intents.into();
        while let Some(intent) = queue.pop_front() {
            match intent {
                Intent::PlaceOrder { account_id: aid, symbol, side, price, quantity, .. } => {
                    let contract_id = self
                        .state_machines
                        .get(&aid)
                        .and_then(|sm| sm.position(&symbol))
                        .map(|p| p.contract_id.clone());
                    let Some(contract_id) = contract_id else { continue };

                    match self
                        .adapter
                        .place_limit(&aid, &contract_id, side.into(), quantity, price, None)
                        .await
                    {
                        Ok(result) if result.success => {
                            if let Some(order_id) = result.order_id {
                                if let Some(sm) = self.state_machines.get_mut(&aid) {
                                    sm.record_entry_order_id(&symbol, order_id);
                                    if let Some(pos) = sm.position(&symbol) {
                                        self.write_queue.stage_dirty(pos.clone());
                                    }
                                }
                            }
                        }
                        Ok(result) => {
                            let message = result.error_message.unwrap_or_default();
                            warn!(%symbol, account = %aid, "placeLimit rejected: {message}");
                            if let Some(sm) = self.state_machines.get_mut(&aid) {
                                queue.extend(sm.force_cancel_rejected(&symbol, &message));
                            }
                        }
                        Err(err) => {
                            warn!(%symbol, account = %aid, "placeLimit call failed: {err}");
                            if let Some(sm) = self.state_machines.get_mut(&aid) {
                                queue.extend(sm.force_cancel_rejected(&symbol, &err.to_string()));
                            }
                        }
                    }
                }
                Intent::CancelOrder { account_id: aid, order_id, .. } => {
                    if let Err(err) = self.adapter.cancel(&order_id, &aid).await {
                        warn!(%order_id, account = %aid, "cancel failed (non-fatal): {err}");
                    }
                }
                Intent::ClosePosition { account_id: aid, symbol, side, quantity, contract_id, reason, displaced } => {
                    match self
                        .adapter
                        .market_close(&aid, &contract_id, quantity, side == Side::Long)
                        .await
                    {
                        Ok(result) if result.success => {
                            if let Some(old) = displaced {
                                // Already removed from the state machine's map
                                // (§4.3 opposing-alert displacement) — finalize
                                // from the snapshot the intent carried rather
                                // than looking the symbol back up.
                                let exit_price = old.last_price.unwrap_or(old.current_sl);
                                if let Some(sm) = self.state_machines.get_mut(&aid) {
                                    queue.extend(sm.finalize_displaced(*old, exit_price, &reason));
                                }
                            } else {
                                let exit_price = self
                                    .state_machines
                                    .get(&aid)
                                    .and_then(|sm| sm.position(&symbol))
                                    .map(|p| p.last_price.unwrap_or(p.current_sl))
                                    .unwrap_or(Decimal::ZERO);
                                if let Some(sm) = self.state_machines.get_mut(&aid) {
                                    queue.extend(sm.on_close(&symbol, exit_price, &reason));
                                }
                            }
                        }
                        Ok(result) => {
                            warn!(%symbol, account = %aid, "marketClose rejected: {:?}", result.error_message);
                        }
                        Err(err) => warn!(%symbol, account = %aid, "marketClose call failed: {err}"),
                    }
                }
                Intent::RetryEntry { ref account_id, ref symbol, .. } => {
                    let aid = account_id.clone();
                    let sym = symbol.clone();
                    let contract_id = self
                        .state_machines
                        .get(&aid)
                        .and_then(|sm| sm.position(&sym))
                        .map(|p| p.contract_id.clone());
                    let Some(contract_id) = contract_id else { continue };
                    let retry_intent = RetryEntryIntent::from_intent(&intent)
                        .expect("intent matched RetryEntry above");

                    let placed = if let Some(coordinator) = self.coordinators.get_mut(&aid) {
                        coordinator
                            .place_retry_pair(self.adapter.as_ref(), &contract_id, &retry_intent)
                            .await
                    } else {
                        continue;
                    };

                    match placed {
                        Ok(stepped_id) => {
                            self.metrics.inc_retry(&aid, &sym);
                            if let Some(sm) = self.state_machines.get_mut(&aid) {
                                // §4.5 "calls the State Machine's onRetryOrderPlaced
                                // with the new retryCount (before the fill has been
                                // processed)" — drives pending_retry -> pending_entry
                                // so the stepped/fallback fill that follows is not
                                // discarded by on_fill's PendingEntry-only guard.
                                queue.extend(sm.on_retry_order_placed(&sym, retry_intent.retry_count));
                                sm.record_entry_order_id(&sym, stepped_id);
                                if let Some(pos) = sm.position(&sym) {
                                    self.write_queue.stage_dirty(pos.clone());
                                }
                            }
                        }
                        Err(err) => warn!(%sym, account = %aid, "failed to place retry pair: {err}"),
                    }
                }
                Intent::StateChange { position } => {
                    self.write_queue.stage_dirty(position);
                }
                Intent::PositionClosed { result } => {
                    if !self.write_queue.insert_trade(&result).await {
                        self.metrics.inc_write_failure("trade");
                    }
                }
                Intent::PositionCreated { position } => {
                    if !self.write_queue.insert_new(&position).await {
                        self.metrics.inc_write_failure("position_insert");
                    }
                }
                Intent::CapacityExceeded { .. } => {}
            }
        }
    }
}
