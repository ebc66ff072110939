//! Component E — Retry Coordinator (§4.5).
//!
//! Places the dual-order retry ladder and tracks the pair until one leg
//! fills (and the other is cancelled) or the pair is torn down by an
//! opposing/close alert on the same symbol. One instance per account,
//! alongside that account's `PositionStateMachine`.

use crate::domain::intents::Intent;
use crate::domain::ports::BrokerageAdapter;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{info, warn};

struct RetryPair {
    symbol: String,
    stepped_order_id: String,
    fallback_order_id: String,
}

pub struct RetryCoordinator {
    account_id: String,
    pairs_by_symbol: HashMap<String, RetryPair>,
    order_to_symbol: HashMap<String, String>,
}

/// Which leg of a tracked pair filled, and the other leg's order id so the
/// caller can cancel it.
pub struct RetryFillOutcome {
    pub symbol: String,
    pub filled_was_fallback: bool,
    pub other_order_id: String,
}

impl RetryCoordinator {
    pub fn new(account_id: String) -> Self {
        Self {
            account_id,
            pairs_by_symbol: HashMap::new(),
            order_to_symbol: HashMap::new(),
        }
    }

    /// Places both legs concurrently and starts tracking them. Returns the
    /// stepped leg's order id, which the caller should record on the
    /// position as its provisional `entry_order_id` (§4.5 "updates the
    /// position's entry order id" only fires if the fallback fills instead).
    pub async fn place_retry_pair(
        &mut self,
        adapter: &dyn BrokerageAdapter,
        contract_id: &str,
        intent: &RetryEntryIntent,
    ) -> anyhow::Result<String> {
        let side = intent.side.into();
        let (stepped, fallback) = tokio::try_join!(
            adapter.place_limit(
                &self.account_id,
                contract_id,
                side,
                intent.quantity,
                intent.stepped_price,
                Some("retry_stepped"),
            ),
            adapter.place_limit(
                &self.account_id,
                contract_id,
                side,
                intent.quantity,
                intent.fallback_price,
                Some("retry_fallback"),
            ),
        )?;

        let stepped_id = stepped
            .order_id
            .ok_or_else(|| anyhow::anyhow!("stepped retry order placed without an order id"))?;
        let fallback_id = fallback
            .order_id
            .ok_or_else(|| anyhow::anyhow!("fallback retry order placed without an order id"))?;

        info!(
            symbol = %intent.symbol, account = %self.account_id,
            stepped = %stepped_id, fallback = %fallback_id,
            "placed dual retry orders"
        );

        self.order_to_symbol.insert(stepped_id.clone(), intent.symbol.clone());
        self.order_to_symbol.insert(fallback_id.clone(), intent.symbol.clone());
        self.pairs_by_symbol.insert(
            intent.symbol.clone(),
            RetryPair {
                symbol: intent.symbol.clone(),
                stepped_order_id: stepped_id.clone(),
                fallback_order_id: fallback_id,
            },
        );

        Ok(stepped_id)
    }

    /// Looks up a fill against tracked retry pairs without yet cancelling
    /// the other leg (the caller does that via the brokerage adapter, then
    /// calls [`Self::clear`]).
    pub fn lookup_fill(&self, order_id: &str) -> Option<RetryFillOutcome> {
        let symbol = self.order_to_symbol.get(order_id)?;
        let pair = self.pairs_by_symbol.get(symbol)?;
        let (filled_was_fallback, other) = if pair.stepped_order_id == order_id {
            (false, pair.fallback_order_id.clone())
        } else if pair.fallback_order_id == order_id {
            (true, pair.stepped_order_id.clone())
        } else {
            return None;
        };
        Some(RetryFillOutcome {
            symbol: symbol.clone(),
            filled_was_fallback,
            other_order_id: other,
        })
    }

    /// Drops tracking for a symbol's pair once one leg has filled (§4.5).
    pub fn clear(&mut self, symbol: &str) {
        if let Some(pair) = self.pairs_by_symbol.remove(symbol) {
            self.order_to_symbol.remove(&pair.stepped_order_id);
            self.order_to_symbol.remove(&pair.fallback_order_id);
        }
    }

    /// §4.5 "must be invoked to clean up any pending retry pair when an
    /// opposing alert or a close alert arrives on the same symbol". Cancels
    /// both legs and clears tracking; returns the cancelled order ids.
    pub async fn cancel_pending(
        &mut self,
        adapter: &dyn BrokerageAdapter,
        symbol: &str,
    ) -> Vec<String> {
        let Some(pair) = self.pairs_by_symbol.remove(symbol) else {
            return Vec::new();
        };
        self.order_to_symbol.remove(&pair.stepped_order_id);
        self.order_to_symbol.remove(&pair.fallback_order_id);

        let mut cancelled = Vec::new();
        for order_id in [&pair.stepped_order_id, &pair.fallback_order_id] {
            match adapter.cancel(order_id, &self.account_id).await {
                Ok(true) => cancelled.push(order_id.clone()),
                Ok(false) => {}
                Err(err) => warn!(%order_id, symbol = %pair.symbol, "retry leg cancel failed: {err}"),
            }
        }
        cancelled
    }

    pub fn is_tracking(&self, symbol: &str) -> bool {
        self.pairs_by_symbol.contains_key(symbol)
    }
}

/// Fields of `Intent::RetryEntry` the Coordinator needs, extracted so it
/// doesn't have to match on the whole `Intent` enum.
pub struct RetryEntryIntent {
    pub symbol: String,
    pub side: crate::domain::position::Side,
    pub stepped_price: Decimal,
    pub fallback_price: Decimal,
    pub quantity: i64,
    pub retry_count: u32,
}

impl RetryEntryIntent {
    pub fn from_intent(intent: &Intent) -> Option<Self> {
        match intent {
            Intent::RetryEntry {
                symbol,
                side,
                stepped_price,
                fallback_price,
                quantity,
                retry_count,
                ..
            } => Some(RetryEntryIntent {
                symbol: symbol.clone(),
                side: *side,
                stepped_price: *stepped_price,
                fallback_price: *fallback_price,
                quantity: *quantity,
                retry_count: *retry_count,
            }),
            _ => None,
        }
    }
}
