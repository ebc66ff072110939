//! Component A — Entry Calculator (§4.1). Pure; no I/O, no suspension.

use crate::domain::errors::EntryCalculationError;
use crate::domain::position::{RetryLadder, Side};
use crate::domain::symbol_spec;
use crate::domain::vpvr::VpvrSummary;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryLevels {
    pub entry_price: Decimal,
    pub initial_sl: Decimal,
    pub tp1: Decimal,
    pub tp2: Decimal,
    pub tp3: Decimal,
}

/// §4.1 "Rules". Long entries buy the value-area low, shorts sell the
/// value-area high; TP1/TP2/TP3 step out toward the range extreme.
pub fn compute_entry(side: Side, vpvr: &VpvrSummary, sl_buffer_ticks: u32, symbol: &str) -> EntryLevels {
    let entry_price = match side {
        Side::Long => vpvr.val,
        Side::Short => vpvr.vah,
    };
    let (tp1, tp2, tp3) = match side {
        Side::Long => (vpvr.poc, vpvr.vah, vpvr.range_high),
        Side::Short => (vpvr.poc, vpvr.val, vpvr.range_low),
    };
    let initial_sl = sl_from_anchor(entry_price, tp1, side, symbol, sl_buffer_ticks);

    EntryLevels {
        entry_price,
        initial_sl,
        tp1,
        tp2,
        tp3,
    }
}

/// §4.1 "SL from fill price helper" — same formula, anchored at an actual
/// fill rather than the target entry (used when fills may slip, or as the
/// post-fill recompute in §4.3 "on order fill").
pub fn sl_from_fill(fill_price: Decimal, tp1: Decimal, side: Side, symbol: &str, sl_buffer_ticks: u32) -> Decimal {
    sl_from_anchor(fill_price, tp1, side, symbol, sl_buffer_ticks)
}

fn sl_from_anchor(anchor: Decimal, tp1: Decimal, side: Side, symbol: &str, sl_buffer_ticks: u32) -> Decimal {
    if sl_buffer_ticks > 0 {
        let buffer = symbol_spec::tick_size(symbol) * Decimal::from(sl_buffer_ticks);
        match side {
            Side::Long => anchor - buffer,
            Side::Short => anchor + buffer,
        }
    } else {
        // Mirror the entry <-> TP1 distance below/above entry.
        let distance = (tp1 - anchor).abs();
        match side {
            Side::Long => anchor - distance,
            Side::Short => anchor + distance,
        }
    }
}

/// §4.1 "Retry ladder". Attempt indices >= 3 repeat index 2, so only three
/// rungs are ever materialized (`RetryLadder::price_at` clamps the index).
pub fn retry_ladder(side: Side, vpvr: &VpvrSummary) -> RetryLadder {
    let levels = match side {
        Side::Long => {
            let rung0 = vpvr.val;
            let rung1 = vpvr.range_low;
            let rung2 = vpvr.range_low - (vpvr.val - vpvr.range_low);
            [rung0, rung1, rung2]
        }
        Side::Short => {
            let rung0 = vpvr.vah;
            let rung1 = vpvr.range_high;
            let rung2 = vpvr.range_high + (vpvr.range_high - vpvr.vah);
            [rung0, rung1, rung2]
        }
    };
    RetryLadder { levels }
}

/// Entry-alert validation: a non-close alert with no VPVR is dropped (§4.10,
/// §7.4). Close alerts never reach this function.
pub fn require_vpvr<'a>(
    vpvr: Option<&'a VpvrSummary>,
    symbol: &str,
) -> Result<&'a VpvrSummary, EntryCalculationError> {
    vpvr.ok_or_else(|| EntryCalculationError::MissingVpvr {
        symbol: symbol.to_string(),
    })
}
