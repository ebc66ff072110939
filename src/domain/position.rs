//! Managed Position (§3) — one per (account, symbol) at a time.
//!
//! Mutated only by the Position State Machine (`application::state_machine`);
//! every other component observes it by value or by shared reference.

use crate::domain::vpvr::VpvrSummary;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionState {
    PendingEntry,
    Active,
    Tp1Hit,
    Tp2Hit,
    Tp3Hit,
    PendingRetry,
    Closed,
    Cancelled,
}

impl PositionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PositionState::Closed | PositionState::Cancelled)
    }

    /// States in which a tick is evaluated against TP/SL (§4.3 "on tick").
    pub fn is_trailing(self) -> bool {
        matches!(
            self,
            PositionState::Active
                | PositionState::Tp1Hit
                | PositionState::Tp2Hit
                | PositionState::Tp3Hit
        )
    }
}

/// Which take-profit level (if any) a closed position reached before exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HighestTp {
    None,
    Tp1,
    Tp2,
    Tp3,
}

impl HighestTp {
    pub fn from_state(state: PositionState) -> HighestTp {
        match state {
            PositionState::Tp1Hit => HighestTp::Tp1,
            PositionState::Tp2Hit => HighestTp::Tp2,
            PositionState::Tp3Hit => HighestTp::Tp3,
            _ => HighestTp::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HighestTp::None => "none",
            HighestTp::Tp1 => "tp1",
            HighestTp::Tp2 => "tp2",
            HighestTp::Tp3 => "tp3",
        }
    }
}

/// Pre-computed retry-entry ladder (§4.1). Indices >= 2 all resolve to the
/// same (deepest) level, so only three prices are ever stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryLadder {
    pub levels: [Decimal; 3],
}

impl RetryLadder {
    /// `retryEntryLevels[attempt]`, clamping attempt indices >= 2 to the
    /// final rung per §4.1.
    pub fn price_at(&self, attempt: usize) -> Decimal {
        self.levels[attempt.min(2)]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedPosition {
    pub id: String,
    pub alert_id: String,
    pub original_alert_id: String,
    pub symbol: String,
    pub side: Side,
    pub state: PositionState,

    pub target_entry_price: Decimal,
    pub fill_price: Option<Decimal>,
    pub quantity: i64,
    pub contract_id: String,
    pub account_id: String,

    pub current_sl: Decimal,
    pub initial_sl: Decimal,
    pub tp1: Decimal,
    pub tp2: Decimal,
    pub tp3: Decimal,

    pub last_price: Option<Decimal>,
    pub unrealized_pnl: Decimal,

    pub vpvr_snapshot: VpvrSummary,
    pub confirmation_score: Option<f64>,
    pub llm_reasoning: Option<String>,
    pub llm_confidence: Option<f64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,

    pub exit_price: Option<Decimal>,
    pub exit_reason: Option<String>,

    pub retry_count: u32,
    pub max_retries: u32,
    pub retry_entry_levels: RetryLadder,

    pub strategy_tag: Option<String>,

    /// Entry/working order id at the brokerage, once placed (§4.3, §4.5).
    pub entry_order_id: Option<String>,

    pub dirty: bool,
}

impl ManagedPosition {
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.updated_at = Utc::now();
    }

    /// `grossPnl = (exitPrice - entryPrice) * pointValue * quantity` for
    /// longs, negated for shorts (§3 Trade Result, §8 universal property).
    pub fn gross_pnl(&self, exit_price: Decimal, point_value: Decimal) -> Option<Decimal> {
        let entry = self.fill_price?;
        let delta = exit_price - entry;
        let signed = match self.side {
            Side::Long => delta,
            Side::Short => -delta,
        };
        Some(signed * point_value * Decimal::from(self.quantity))
    }
}
