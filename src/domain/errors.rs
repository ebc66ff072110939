//! Domain error taxonomy.
//!
//! Mirrors the rest of the engine's error discipline: a `thiserror` enum per
//! concern that callers can match on, `anyhow::Result` everywhere else.

use thiserror::Error;

/// Failure to derive entry/TP/SL levels from a VPVR summary (§4.1, §7.4).
#[derive(Debug, Error)]
pub enum EntryCalculationError {
    #[error("VPVR summary is missing required data for symbol {symbol}")]
    MissingVpvr { symbol: String },
}

/// Failure surfaced by a `PositionStore` implementation (§6, §7.6).
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to upsert position snapshot {position_id}: {reason}")]
    PositionUpdate { position_id: String, reason: String },

    #[error("failed to insert new position row {position_id}: {reason}")]
    PositionInsert { position_id: String, reason: String },

    #[error("failed to insert trade log row for position {position_id}: {reason}")]
    TradeInsert { position_id: String, reason: String },
}

/// Failure surfaced by a `BrokerageAdapter` implementation (§6, §7.1-§7.2).
#[derive(Debug, Error)]
pub enum BrokerageError {
    #[error("authenticate failed: {0}")]
    Authenticate(String),

    #[error("placeLimit rejected for {symbol}: {message}")]
    PlaceRejected { symbol: String, message: String },

    #[error("cancel failed for order {order_id}: {0}")]
    Cancel { order_id: String, message: String },

    #[error("marketClose failed for {symbol}: {0}")]
    CloseFailed { symbol: String, message: String },

    #[error("listPositions failed for account {account_id}: {0}")]
    ListPositions { account_id: String, message: String },

    #[error("flatten failed for account {account_id}: {0}")]
    Flatten { account_id: String, message: String },

    #[error("call to brokerage timed out after {millis}ms")]
    Timeout { millis: u64 },
}
