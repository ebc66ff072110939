//! Trade Result (§3) — output, persisted by the Durable Write Queue.

use crate::domain::position::{HighestTp, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeResult {
    pub position_id: String,
    pub alert_id: String,
    pub original_alert_id: String,
    pub symbol: String,
    pub side: Side,

    pub entry_price: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit_price: Decimal,
    pub exit_time: DateTime<Utc>,
    pub exit_reason: String,

    pub quantity: i64,
    pub gross_pnl: Decimal,
    pub fees: Decimal,
    pub net_pnl: Decimal,

    pub vpvr_poc: Decimal,
    pub vpvr_vah: Decimal,
    pub vpvr_val: Decimal,

    pub highest_tp_hit: HighestTp,
    pub retry_count: u32,
    pub confirmation_score: Option<f64>,
    pub llm_reasoning: Option<String>,
}
