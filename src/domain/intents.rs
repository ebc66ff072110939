//! Typed intent records emitted by the State Machine / Retry Coordinator.
//!
//! Every handler call returns a `Vec<Intent>` that the Orchestrator matches
//! on and wires to adapter calls or the Write Queue, rather than the state
//! machine calling out through an event-emitter or registered callbacks.
//! The core stays pure-ish and unit-testable without a running event loop.

use crate::domain::position::{ManagedPosition, Side};
use crate::domain::trade_result::TradeResult;
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub enum Intent {
    /// Place a limit entry order (§4.3 "on alert").
    PlaceOrder {
        position_id: String,
        account_id: String,
        symbol: String,
        side: Side,
        price: Decimal,
        quantity: i64,
    },
    /// Cancel a working order (§4.3 close/opposing-alert handling).
    CancelOrder {
        position_id: String,
        account_id: String,
        order_id: String,
    },
    /// Liquidate an open position at market (§4.3, §4.8).
    ClosePosition {
        position_id: String,
        account_id: String,
        symbol: String,
        side: Side,
        quantity: i64,
        contract_id: String,
        reason: String,
        /// Set when the symbol slot was already handed to a brand-new
        /// position in the same `on_alert` call (opposing-alert
        /// displacement, §4.3). The Orchestrator must finalize this
        /// snapshot directly via `finalize_displaced` rather than looking
        /// the symbol up in the state machine's map, which by now holds the
        /// replacement position.
        displaced: Option<Box<ManagedPosition>>,
    },
    /// Place the dual-order retry pair (§4.3 "on close" → pending_retry, §4.5).
    RetryEntry {
        position_id: String,
        account_id: String,
        symbol: String,
        side: Side,
        stepped_price: Decimal,
        fallback_price: Decimal,
        quantity: i64,
        retry_count: u32,
        max_retries: u32,
    },
    /// A position's persisted fields changed; the Write Queue should mark it
    /// dirty (or already has it staged) for the next flush.
    StateChange { position: ManagedPosition },
    /// A position reached a terminal state; the Write Queue should insert
    /// the TradeResult immediately (§4.7 "trade-log insert").
    PositionClosed { result: TradeResult },
    /// Capacity budget would be exceeded; no position was created (§4.4, §7.5).
    CapacityExceeded {
        account_id: String,
        symbol: String,
        current: Decimal,
        max: Decimal,
        required: Decimal,
    },
    /// A new position record was created; the Write Queue inserts the
    /// initial row (§4.7 "create new position").
    PositionCreated { position: ManagedPosition },
}
