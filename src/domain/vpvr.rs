//! VPVR Summary (§3) — input to the Entry Calculator, owned by whatever
//! produces it (out of scope here). Passed by value.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VpvrSummary {
    /// Point of Control — the mode price.
    pub poc: Decimal,
    /// Value Area High — upper bound of the value area.
    pub vah: Decimal,
    /// Value Area Low — lower bound of the value area.
    pub val: Decimal,
    pub range_high: Decimal,
    pub range_low: Decimal,
    pub total_volume: Decimal,
    pub bar_count: u32,
}
