//! Component C — Position State Machine (§4.3).
//!
//! One instance per brokerage account. Exclusively owns that account's
//! symbol -> position map (§9 "map ownership") and its capacity accountant.
//! Every handler call returns the `Intent`s the Orchestrator must act on;
//! the map itself is never exposed mutably to callers.

use crate::application::capacity::CapacityAccountant;
use crate::application::entry_calculator;
use crate::application::trailing_stop::{self, TrailingInput};
use crate::domain::alert::{AlertAction, AlertRecord};
use crate::domain::intents::Intent;
use crate::domain::position::{HighestTp, ManagedPosition, PositionState, Side};
use crate::domain::symbol_spec;
use crate::domain::trade_result::TradeResult;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct AccountConfig {
    pub account_id: String,
    pub sl_buffer_ticks: u32,
    pub max_retries: u32,
    pub max_contracts: Decimal,
    pub default_quantity: i64,
}

pub struct PositionStateMachine {
    config: AccountConfig,
    positions: HashMap<String, ManagedPosition>,
    capacity: CapacityAccountant,
}

impl PositionStateMachine {
    pub fn new(config: AccountConfig) -> Self {
        let capacity = CapacityAccountant::new(config.max_contracts);
        Self {
            config,
            positions: HashMap::new(),
            capacity,
        }
    }

    pub fn account_id(&self) -> &str {
        &self.config.account_id
    }

    pub fn position(&self, symbol: &str) -> Option<&ManagedPosition> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = &ManagedPosition> {
        self.positions.values()
    }

    /// Current/ceiling micro-equivalent capacity, for the metrics reporter.
    pub fn capacity_snapshot(&self) -> (Decimal, Decimal) {
        (self.capacity.used(), self.capacity.max())
    }

    fn symbol_for_entry_order(&self, order_id: &str) -> Option<String> {
        self.positions.iter().find_map(|(sym, pos)| {
            (pos.entry_order_id.as_deref() == Some(order_id)).then(|| sym.clone())
        })
    }

    /// §4.3 "On alert".
    pub fn on_alert(&mut self, alert: &AlertRecord, contract_id: &str) -> Vec<Intent> {
        let mut intents = Vec::new();

        if alert.action.is_close() {
            let Some(existing) = self.positions.get(&alert.symbol) else {
                return intents;
            };
            if side_matches_close_action(alert.action, existing.side) {
                intents.extend(self.cancel_or_close(&alert.symbol.clone(), "close_alert"));
            }
            return intents;
        }

        debug_assert!(alert.action.is_entry());
        let side = match alert.action {
            AlertAction::Buy => Side::Long,
            AlertAction::Sell => Side::Short,
            _ => unreachable!(),
        };

        if let Some(existing) = self.positions.get(&alert.symbol) {
            if matches!(existing.state, PositionState::PendingEntry | PositionState::PendingRetry) {
                intents.extend(self.cancel_or_close(&alert.symbol.clone(), "opposing_alert"));
            } else {
                intents.extend(self.displace_active_position(&alert.symbol.clone(), "opposing_alert"));
            }
        }

        // Any existing same-symbol position was already removed and its
        // capacity released above (either cancelled outright or displaced
        // pending an async market-close), so the check never needs to
        // subtract a still-present entry.
        let quantity = alert.quantity_override.unwrap_or(self.config.default_quantity);
        let check = self.capacity.check(&alert.symbol, quantity, false);
        if !check.fits {
            warn!(
                symbol = %alert.symbol,
                account = %self.config.account_id,
                "capacity exceeded: {} + {} > {}",
                check.current, check.required, check.max
            );
            intents.push(Intent::CapacityExceeded {
                account_id: self.config.account_id.clone(),
                symbol: alert.symbol.clone(),
                current: check.current,
                max: check.max,
                required: check.required,
            });
            return intents;
        }

        let Some(vpvr) = alert.vpvr.as_ref() else {
            warn!(symbol = %alert.symbol, "dropping alert: missing VPVR data");
            return intents;
        };

        let mut levels = entry_calculator::compute_entry(side, vpvr, self.config.sl_buffer_ticks, &alert.symbol);
        if let Some(sfx) = alert.sfx_levels {
            levels.tp1 = sfx.tp1;
            levels.tp2 = sfx.tp2;
            levels.tp3 = sfx.tp3;
            if let Some(sl) = sfx.stop_loss {
                levels.initial_sl = sl;
            }
        }
        let retry_entry_levels = entry_calculator::retry_ladder(side, vpvr);

        let now = Utc::now();
        let position = ManagedPosition {
            id: uuid::Uuid::new_v4().to_string(),
            alert_id: alert.id.clone(),
            original_alert_id: alert.id.clone(),
            symbol: alert.symbol.clone(),
            side,
            state: PositionState::PendingEntry,
            target_entry_price: levels.entry_price,
            fill_price: None,
            quantity,
            contract_id: contract_id.to_string(),
            account_id: self.config.account_id.clone(),
            current_sl: levels.initial_sl,
            initial_sl: levels.initial_sl,
            tp1: levels.tp1,
            tp2: levels.tp2,
            tp3: levels.tp3,
            last_price: None,
            unrealized_pnl: Decimal::ZERO,
            vpvr_snapshot: *vpvr,
            confirmation_score: alert.confirmation_score,
            llm_reasoning: None,
            llm_confidence: None,
            created_at: now,
            updated_at: now,
            closed_at: None,
            exit_price: None,
            exit_reason: None,
            retry_count: 0,
            max_retries: self.config.max_retries,
            retry_entry_levels,
            strategy_tag: alert.strategy_tag.clone(),
            entry_order_id: None,
            dirty: true,
        };

        info!(
            symbol = %alert.symbol, account = %self.config.account_id, side = ?side,
            entry = %levels.entry_price, "opening position {}", position.id
        );

        self.capacity.reserve(&alert.symbol, quantity);
        intents.push(Intent::PlaceOrder {
            position_id: position.id.clone(),
            account_id: self.config.account_id.clone(),
            symbol: alert.symbol.clone(),
            side,
            price: levels.entry_price,
            quantity,
        });
        intents.push(Intent::PositionCreated {
            position: position.clone(),
        });
        intents.push(Intent::StateChange { position: position.clone() });
        self.positions.insert(alert.symbol.clone(), position);
        intents
    }

    fn cancel_or_close(&mut self, symbol: &str, reason: &str) -> Vec<Intent> {
        let mut intents = Vec::new();
        let Some(position) = self.positions.get(symbol) else {
            return intents;
        };
        match position.state {
            PositionState::PendingEntry | PositionState::PendingRetry => {
                if let Some(order_id) = position.entry_order_id.clone() {
                    intents.push(Intent::CancelOrder {
                        position_id: position.id.clone(),
                        account_id: self.config.account_id.clone(),
                        order_id,
                    });
                }
                let mut position = self.positions.remove(symbol).expect("checked above");
                position.state = PositionState::Cancelled;
                position.exit_reason = Some(reason.to_string());
                position.closed_at = Some(Utc::now());
                position.mark_dirty();
                self.capacity.release(symbol);
                intents.push(Intent::StateChange { position });
            }
            _ => {
                intents.push(Intent::ClosePosition {
                    position_id: position.id.clone(),
                    account_id: self.config.account_id.clone(),
                    symbol: symbol.to_string(),
                    side: position.side,
                    quantity: position.quantity,
                    contract_id: position.contract_id.clone(),
                    reason: reason.to_string(),
                    displaced: None,
                });
            }
        }
        intents
    }

    /// Removes an active (non-pending) position from the map *now* — used
    /// only when an opposing alert is about to insert a replacement under
    /// the same symbol key in this same `on_alert` call, which would
    /// otherwise collide with the departing position (§9 "opposing alert on
    /// same symbol frees its slot", §8 S6). The removed snapshot travels
    /// with the intent so the Orchestrator can finalize it once the
    /// brokerage confirms the market-close, without looking the symbol back
    /// up in a map that by then holds the new position.
    fn displace_active_position(&mut self, symbol: &str, reason: &str) -> Vec<Intent> {
        let Some(position) = self.positions.remove(symbol) else {
            return Vec::new();
        };
        self.capacity.release(symbol);
        vec![Intent::ClosePosition {
            position_id: position.id.clone(),
            account_id: self.config.account_id.clone(),
            symbol: symbol.to_string(),
            side: position.side,
            quantity: position.quantity,
            contract_id: position.contract_id.clone(),
            reason: reason.to_string(),
            displaced: Some(Box::new(position)),
        }]
    }

    /// Finalizes a position that was displaced out of the map by
    /// `displace_active_position`, once the Orchestrator's market-close for
    /// it has been confirmed. The position is not looked up by symbol —
    /// the caller hands back exactly the snapshot it was given, which by
    /// now may no longer match whatever (if anything) lives under that
    /// symbol in the map.
    pub fn finalize_displaced(
        &mut self,
        mut position: ManagedPosition,
        exit_price: Decimal,
        reason: &str,
    ) -> Vec<Intent> {
        let highest_tp = HighestTp::from_state(position.state);
        position.state = PositionState::Closed;
        position.exit_price = Some(exit_price);
        position.exit_reason = Some(reason.to_string());
        position.closed_at = Some(Utc::now());
        position.mark_dirty();

        info!(symbol = %position.symbol, exit = %exit_price, reason = %reason, "displaced position closed");

        let mut intents = Vec::new();
        if position.fill_price.is_some() {
            if let Some(result) = build_trade_result_with_tp(&position, exit_price, reason, highest_tp) {
                intents.push(Intent::PositionClosed { result });
            }
        }
        intents.push(Intent::StateChange { position });
        intents
    }

    /// §4.3 "On order fill".
    pub fn on_fill(&mut self, order_id: &str, fill_price: Decimal) -> Vec<Intent> {
        let Some(symbol) = self.positions.iter().find_map(|(sym, pos)| {
            (pos.entry_order_id.as_deref() == Some(order_id)).then(|| sym.clone())
        }) else {
            return Vec::new();
        };
        let position = self.positions.get_mut(&symbol).expect("looked up above");
        if position.state != PositionState::PendingEntry {
            return Vec::new();
        }

        position.state = PositionState::Active;
        position.fill_price = Some(fill_price);
        if self.config.sl_buffer_ticks > 0 {
            let recomputed = entry_calculator::sl_from_fill(
                fill_price,
                position.tp1,
                position.side,
                &position.symbol,
                self.config.sl_buffer_ticks,
            );
            position.initial_sl = recomputed;
            position.current_sl = recomputed;
        }
        position.mark_dirty();
        info!(symbol = %symbol, fill = %fill_price, "position filled, now active");
        vec![Intent::StateChange { position: position.clone() }]
    }

    /// §4.3 "On tick".
    pub fn on_tick(&mut self, symbol: &str, price: Decimal, _ts: i64) -> Vec<Intent> {
        let Some(position) = self.positions.get_mut(symbol) else {
            return Vec::new();
        };
        if !position.state.is_trailing() {
            return Vec::new();
        }

        position.last_price = Some(price);
        if let Some(entry) = position.fill_price {
            let point_value = symbol_spec::point_value(symbol);
            let delta = price - entry;
            let signed = match position.side {
                Side::Long => delta,
                Side::Short => -delta,
            };
            position.unrealized_pnl = signed * point_value * Decimal::from(position.quantity);
        }

        let eval = trailing_stop::evaluate(TrailingInput {
            side: position.side,
            state: position.state,
            entry_price: position.fill_price.unwrap_or(position.target_entry_price),
            current_sl: position.current_sl,
            tp1: position.tp1,
            tp2: position.tp2,
            tp3: position.tp3,
            current_price: price,
        });

        let mut intents = Vec::new();
        if eval.should_close {
            intents.push(Intent::ClosePosition {
                position_id: position.id.clone(),
                account_id: self.config.account_id.clone(),
                symbol: symbol.to_string(),
                side: position.side,
                quantity: position.quantity,
                contract_id: position.contract_id.clone(),
                reason: eval.close_reason.unwrap_or_default(),
                displaced: None,
            });
            return intents;
        }

        let mut changed = false;
        if let Some(new_state) = eval.new_state {
            position.state = new_state;
            changed = true;
        }
        if let Some(new_sl) = eval.new_sl {
            position.current_sl = new_sl;
            changed = true;
        }
        if changed {
            position.mark_dirty();
            intents.push(Intent::StateChange { position: position.clone() });
        }
        intents
    }

    /// §4.3 "On close".
    pub fn on_close(&mut self, symbol: &str, exit_price: Decimal, reason: &str) -> Vec<Intent> {
        let Some(position) = self.positions.get(symbol) else {
            return Vec::new();
        };
        if position.state.is_terminal() {
            return Vec::new();
        }

        let mut intents = Vec::new();
        if reason.starts_with("sl_hit_from_active") && position.retry_count < position.max_retries {
            let position = self.positions.get_mut(symbol).expect("checked above");
            if let Some(result) = build_trade_result(position, exit_price, reason) {
                intents.push(Intent::PositionClosed { result });
            }

            let next_retry = position.retry_count + 1;
            let stepped_price = position.retry_entry_levels.price_at(next_retry as usize);
            let fallback_price = position.retry_entry_levels.price_at(0);

            position.state = PositionState::PendingRetry;
            position.fill_price = None;
            position.exit_price = None;
            position.exit_reason = None;
            position.entry_order_id = None;
            position.mark_dirty();

            info!(
                symbol = %symbol, retry = next_retry, stepped = %stepped_price,
                fallback = %fallback_price, "stopped out, entering retry ladder"
            );

            intents.push(Intent::RetryEntry {
                position_id: position.id.clone(),
                account_id: self.config.account_id.clone(),
                symbol: symbol.to_string(),
                side: position.side,
                stepped_price,
                fallback_price,
                quantity: position.quantity,
                retry_count: next_retry,
                max_retries: position.max_retries,
            });
            intents.push(Intent::StateChange { position: position.clone() });
            return intents;
        }

        let mut position = self.positions.remove(symbol).expect("checked above");
        let highest_tp = HighestTp::from_state(position.state);
        position.state = PositionState::Closed;
        position.exit_price = Some(exit_price);
        position.exit_reason = Some(reason.to_string());
        position.closed_at = Some(Utc::now());
        position.mark_dirty();
        self.capacity.release(symbol);

        info!(symbol = %symbol, exit = %exit_price, reason = %reason, "position closed");

        if position.fill_price.is_some() {
            if let Some(result) = build_trade_result_with_tp(&position, exit_price, reason, highest_tp) {
                intents.push(Intent::PositionClosed { result });
            }
        }
        intents.push(Intent::StateChange { position });
        intents
    }

    /// §4.3 "On retry-order-placed".
    pub fn on_retry_order_placed(&mut self, symbol: &str, new_retry_count: u32) -> Vec<Intent> {
        let Some(position) = self.positions.get_mut(symbol) else {
            return Vec::new();
        };
        if position.state != PositionState::PendingRetry {
            return Vec::new();
        }
        position.state = PositionState::PendingEntry;
        position.retry_count = new_retry_count;
        position.fill_price = None;
        position.exit_price = None;
        position.exit_reason = None;
        position.current_sl = position.initial_sl;
        position.mark_dirty();
        vec![Intent::StateChange { position: position.clone() }]
    }

    /// Records the entry order id once the Orchestrator has confirmed
    /// placement with the brokerage (§4.8 "placeOrder").
    pub fn record_entry_order_id(&mut self, symbol: &str, order_id: String) {
        if let Some(position) = self.positions.get_mut(symbol) {
            position.entry_order_id = Some(order_id);
            position.mark_dirty();
        }
    }

    /// §4.8 "on rejection, force the position to cancelled".
    pub fn force_cancel_rejected(&mut self, symbol: &str, message: &str) -> Vec<Intent> {
        let Some(mut position) = self.positions.remove(symbol) else {
            return Vec::new();
        };
        position.state = PositionState::Cancelled;
        position.exit_reason = Some(format!("order_rejected: {message}"));
        position.closed_at = Some(Utc::now());
        position.mark_dirty();
        self.capacity.release(symbol);
        vec![Intent::StateChange { position }]
    }

    /// Finds the position by its working entry order id and force-cancels
    /// it, for async rejection notifications arriving on the user-event
    /// stream rather than synchronously from `placeLimit`'s own response.
    pub fn on_order_rejected(&mut self, order_id: &str, message: &str) -> Vec<Intent> {
        let Some(symbol) = self.symbol_for_entry_order(order_id) else {
            return Vec::new();
        };
        self.force_cancel_rejected(&symbol, message)
    }
}

fn side_matches_close_action(action: AlertAction, side: Side) -> bool {
    match action {
        AlertAction::Close => true,
        AlertAction::CloseLong => side == Side::Long,
        AlertAction::CloseShort => side == Side::Short,
        _ => false,
    }
}

fn build_trade_result(position: &ManagedPosition, exit_price: Decimal, reason: &str) -> Option<TradeResult> {
    build_trade_result_with_tp(position, exit_price, reason, HighestTp::from_state(position.state))
}

fn build_trade_result_with_tp(
    position: &ManagedPosition,
    exit_price: Decimal,
    reason: &str,
    highest_tp: HighestTp,
) -> Option<TradeResult> {
    let entry_price = position.fill_price?;
    let point_value = symbol_spec::point_value(&position.symbol);
    let gross_pnl = position.gross_pnl(exit_price, point_value)?;
    Some(TradeResult {
        position_id: position.id.clone(),
        alert_id: position.alert_id.clone(),
        original_alert_id: position.original_alert_id.clone(),
        symbol: position.symbol.clone(),
        side: position.side,
        entry_price,
        entry_time: position.created_at,
        exit_price,
        exit_time: Utc::now(),
        exit_reason: reason.to_string(),
        quantity: position.quantity,
        gross_pnl,
        fees: Decimal::ZERO,
        net_pnl: gross_pnl,
        vpvr_poc: position.vpvr_snapshot.poc,
        vpvr_vah: position.vpvr_snapshot.vah,
        vpvr_val: position.vpvr_snapshot.val,
        highest_tp_hit: highest_tp,
        retry_count: position.retry_count,
        confirmation_score: position.confirmation_score,
        llm_reasoning: position.llm_reasoning.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vpvr::VpvrSummary;
    use rust_decimal_macros::dec;

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

    fn cfg() -> AccountConfig {
        AccountConfig {
            account_id: "ACC1".into(),
            sl_buffer_ticks: 0,
            max_retries: 2,
            max_contracts: dec!(10),
            default_quantity: 1,
        }
    }

    fn buy_alert(symbol: &str) -> AlertRecord {
        AlertRecord {
            id: "a1".into(),
            timestamp: 0,
            symbol: symbol.into(),
            action: AlertAction::Buy,
            quantity_override: None,
            strategy_tag: None,
            sfx_levels: None,
            vpvr: Some(es_vpvr()),
            confirmation_score: None,
        }
    }

    #[test]
    fn s1_full_lifecycle_tp1_then_sl_at_breakeven() {
        let mut sm = PositionStateMachine::new(cfg());
        let intents = sm.on_alert(&buy_alert("ES"), "CON-ES");
        assert!(matches!(intents[0], Intent::PlaceOrder { .. }));

        let pos_id = sm.position("ES").unwrap().id.clone();
        sm.record_entry_order_id("ES", "ORD1".into());
        sm.on_fill("ORD1", dec!(5020));
        assert_eq!(sm.position("ES").unwrap().state, PositionState::Active);

        sm.on_tick("ES", dec!(5030), 1);
        sm.on_tick("ES", dec!(5050), 2);
        assert_eq!(sm.position("ES").unwrap().state, PositionState::Tp1Hit);
        assert_eq!(sm.position("ES").unwrap().current_sl, dec!(5020));

        let intents = sm.on_tick("ES", dec!(5019), 3);
        let close = intents.iter().find_map(|i| match i {
            Intent::ClosePosition { reason, .. } => Some(reason.clone()),
            _ => None,
        });
        assert_eq!(close.as_deref(), Some("sl_hit_from_tp1_hit"));

        let intents = sm.on_close("ES", dec!(5020), "sl_hit_from_tp1_hit");
        let result = intents.iter().find_map(|i| match i {
            Intent::PositionClosed { result } => Some(result.clone()),
            _ => None,
        }).unwrap();
        assert_eq!(result.gross_pnl, dec!(0));
        assert_eq!(result.highest_tp_hit.as_str(), "tp1");
        assert_eq!(result.position_id, pos_id);
        assert!(sm.position("ES").is_none());
    }

    #[test]
    fn s4_retry_after_sl_from_active() {
        let mut config = cfg();
        config.sl_buffer_ticks = 8;
        let mut sm = PositionStateMachine::new(config);
        sm.on_alert(&buy_alert("ES"), "CON-ES");
        sm.record_entry_order_id("ES", "ORD1".into());
        sm.on_fill("ORD1", dec!(5020));
        assert_eq!(sm.position("ES").unwrap().current_sl, dec!(5018));

        let tick_intents = sm.on_tick("ES", dec!(5017), 1);
        assert!(matches!(tick_intents[0], Intent::ClosePosition { .. }));

        let close_intents = sm.on_close("ES", dec!(5018), "sl_hit_from_active");
        let trade = close_intents.iter().find_map(|i| match i {
            Intent::PositionClosed { result } => Some(result.clone()),
            _ => None,
        }).unwrap();
        assert_eq!(trade.gross_pnl, dec!(-100));

        let retry = close_intents.iter().find_map(|i| match i {
            Intent::RetryEntry { stepped_price, fallback_price, retry_count, .. } => {
                Some((*stepped_price, *fallback_price, *retry_count))
            }
            _ => None,
        }).unwrap();
        assert_eq!(retry, (dec!(5000), dec!(5020), 1));
        assert_eq!(sm.position("ES").unwrap().state, PositionState::PendingRetry);

        sm.on_retry_order_placed("ES", 1);
        assert_eq!(sm.position("ES").unwrap().state, PositionState::PendingEntry);
        assert_eq!(sm.position("ES").unwrap().current_sl, sm.position("ES").unwrap().initial_sl);

        sm.record_entry_order_id("ES", "ORD2".into());
        sm.on_fill("ORD2", dec!(5000));
        assert_eq!(sm.position("ES").unwrap().current_sl, dec!(4998));
        assert_eq!(sm.position("ES").unwrap().retry_count, 1);
    }

    #[test]
    fn max_retries_zero_closes_without_retry() {
        let mut config = cfg();
        config.max_retries = 0;
        let mut sm = PositionStateMachine::new(config);
        sm.on_alert(&buy_alert("ES"), "CON-ES");
        sm.record_entry_order_id("ES", "ORD1".into());
        sm.on_fill("ORD1", dec!(5020));
        let intents = sm.on_close("ES", dec!(5018), "sl_hit_from_active");
        assert!(intents.iter().all(|i| !matches!(i, Intent::RetryEntry { .. })));
        assert!(sm.position("ES").is_none());
    }

    #[test]
    fn opposing_alert_on_active_position_displaces_and_reopens() {
        let mut sm = PositionStateMachine::new(cfg());
        sm.on_alert(&buy_alert("ES"), "CON-ES");
        sm.record_entry_order_id("ES", "ORD1".into());
        sm.on_fill("ORD1", dec!(5020));
        let old_id = sm.position("ES").unwrap().id.clone();

        let mut sell = buy_alert("ES");
        sell.id = "a2".into();
        sell.action = AlertAction::Sell;
        let intents = sm.on_alert(&sell, "CON-ES");

        // the old long position travels with the intent rather than sitting
        // in the map, so the brand-new short position can occupy the symbol
        // slot immediately (§8 S6).
        let displaced = intents.iter().find_map(|i| match i {
            Intent::ClosePosition { reason, displaced, .. } if reason == "opposing_alert" => {
                displaced.clone()
            }
            _ => None,
        });
        let old = displaced.expect("opposing alert must emit a displaced snapshot");
        assert_eq!(old.id, old_id);
        assert_eq!(old.side, Side::Long);

        assert_eq!(sm.position("ES").unwrap().side, Side::Short);
        assert_eq!(sm.position("ES").unwrap().state, PositionState::PendingEntry);

        let finalize = sm.finalize_displaced(*old, dec!(5025), "opposing_alert");
        let trade = finalize.iter().find_map(|i| match i {
            Intent::PositionClosed { result } => Some(result.clone()),
            _ => None,
        }).unwrap();
        assert_eq!(trade.gross_pnl, dec!(250));
    }

    #[test]
    fn duplicate_fill_events_are_ignored() {
        let mut sm = PositionStateMachine::new(cfg());
        sm.on_alert(&buy_alert("ES"), "CON-ES");
        sm.record_entry_order_id("ES", "ORD1".into());
        sm.on_fill("ORD1", dec!(5020));
        let intents = sm.on_fill("ORD1", dec!(5021));
        assert!(intents.is_empty());
        assert_eq!(sm.position("ES").unwrap().fill_price, Some(dec!(5020)));
    }

    #[test]
    fn repeated_close_on_terminal_position_is_ignored() {
        let mut sm = PositionStateMachine::new(cfg());
        sm.on_alert(&buy_alert("ES"), "CON-ES");
        sm.record_entry_order_id("ES", "ORD1".into());
        sm.on_fill("ORD1", dec!(5020));
        sm.on_close("ES", dec!(5100), "manual");
        assert!(sm.position("ES").is_none());
        // no position left to re-close; handler must not panic
        let intents = sm.on_close("ES", dec!(5100), "manual");
        assert!(intents.is_empty());
    }
}
