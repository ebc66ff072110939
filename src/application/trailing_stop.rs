//! Component B — Trailing Stop Evaluator (§4.2). Pure; no I/O, no suspension.

use crate::domain::position::{PositionState, Side};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct EvalResult {
    pub new_state: Option<PositionState>,
    pub new_sl: Option<Decimal>,
    pub should_close: bool,
    pub close_reason: Option<String>,
}

impl EvalResult {
    fn noop() -> Self {
        EvalResult {
            new_state: None,
            new_sl: None,
            should_close: false,
            close_reason: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrailingInput {
    pub side: Side,
    pub state: PositionState,
    pub entry_price: Decimal,
    pub current_sl: Decimal,
    pub tp1: Decimal,
    pub tp2: Decimal,
    pub tp3: Decimal,
    pub current_price: Decimal,
}

/// Evaluates one tick against a position's current TP/SL levels (§4.2).
/// SL breach always wins over a simultaneous TP hit (step 2, tie-break rule).
pub fn evaluate(input: TrailingInput) -> EvalResult {
    let TrailingInput {
        side,
        state,
        entry_price,
        current_sl,
        tp1,
        tp2,
        tp3,
        current_price,
    } = input;

    if !state.is_trailing() {
        return EvalResult::noop();
    }

    if sl_breached(side, current_price, current_sl) {
        return EvalResult {
            new_state: Some(PositionState::Closed),
            new_sl: None,
            should_close: true,
            close_reason: Some(format!("sl_hit_from_{}", state_tag(state))),
        };
    }

    match state {
        PositionState::Active if tp_reached(side, current_price, tp1) => EvalResult {
            new_state: Some(PositionState::Tp1Hit),
            new_sl: Some(entry_price),
            should_close: false,
            close_reason: None,
        },
        PositionState::Tp1Hit if tp_reached(side, current_price, tp2) => EvalResult {
            new_state: Some(PositionState::Tp2Hit),
            new_sl: Some(tp1),
            should_close: false,
            close_reason: None,
        },
        PositionState::Tp2Hit if tp_reached(side, current_price, tp3) => EvalResult {
            new_state: Some(PositionState::Tp3Hit),
            new_sl: Some(tp2),
            should_close: false,
            close_reason: None,
        },
        PositionState::Tp3Hit => {
            // Pure trailing extension at the constant tp3<->tp2 gap (step 6).
            let gap = (tp3 - tp2).abs();
            let trailing_sl = match side {
                Side::Long => current_price - gap,
                Side::Short => current_price + gap,
            };
            let improved = match side {
                Side::Long => trailing_sl > current_sl,
                Side::Short => trailing_sl < current_sl,
            };
            if improved {
                EvalResult {
                    new_state: None,
                    new_sl: Some(trailing_sl),
                    should_close: false,
                    close_reason: None,
                }
            } else {
                EvalResult::noop()
            }
        }
        _ => EvalResult::noop(),
    }
}

fn sl_breached(side: Side, price: Decimal, sl: Decimal) -> bool {
    match side {
        Side::Long => price <= sl,
        Side::Short => price >= sl,
    }
}

fn tp_reached(side: Side, price: Decimal, tp: Decimal) -> bool {
    match side {
        Side::Long => price >= tp,
        Side::Short => price <= tp,
    }
}

fn state_tag(state: PositionState) -> &'static str {
    match state {
        PositionState::Active => "active",
        PositionState::Tp1Hit => "tp1_hit",
        PositionState::Tp2Hit => "tp2_hit",
        PositionState::Tp3Hit => "tp3_hit",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base(side: Side, state: PositionState, price: Decimal) -> TrailingInput {
        TrailingInput {
            side,
            state,
            entry_price: dec!(5020),
            current_sl: dec!(5020),
            tp1: dec!(5050),
            tp2: dec!(5080),
            tp3: dec!(5100),
            current_price: price,
        }
    }

    #[test]
    fn inactive_states_are_noop() {
        for state in [
            PositionState::PendingEntry,
            PositionState::PendingRetry,
            PositionState::Closed,
            PositionState::Cancelled,
        ] {
            let result = evaluate(base(Side::Long, state, dec!(9999)));
            assert_eq!(result, EvalResult::noop());
        }
    }

    #[test]
    fn s1_long_tp1_then_sl_at_breakeven() {
        let mut input = base(Side::Long, PositionState::Active, dec!(5030));
        let r = evaluate(input);
        assert!(!r.should_close);
        assert_eq!(r.new_state, None);

        input.current_price = dec!(5050);
        let r = evaluate(input);
        assert_eq!(r.new_state, Some(PositionState::Tp1Hit));
        assert_eq!(r.new_sl, Some(dec!(5020)));

        input.state = PositionState::Tp1Hit;
        input.current_sl = dec!(5020);
        input.current_price = dec!(5019);
        let r = evaluate(input);
        assert!(r.should_close);
        assert_eq!(r.close_reason.as_deref(), Some("sl_hit_from_tp1_hit"));
    }

    #[test]
    fn s2_long_ladder_to_tp3_then_trailing_sl() {
        let mut input = base(Side::Long, PositionState::Active, dec!(5050));
        let r = evaluate(input);
        assert_eq!(r.new_state, Some(PositionState::Tp1Hit));
        input.state = PositionState::Tp1Hit;
        input.current_sl = dec!(5020);

        input.current_price = dec!(5080);
        let r = evaluate(input);
        assert_eq!(r.new_state, Some(PositionState::Tp2Hit));
        assert_eq!(r.new_sl, Some(dec!(5050)));
        input.state = PositionState::Tp2Hit;
        input.current_sl = dec!(5050);

        input.current_price = dec!(5100);
        let r = evaluate(input);
        assert_eq!(r.new_state, Some(PositionState::Tp3Hit));
        assert_eq!(r.new_sl, Some(dec!(5080)));
        input.state = PositionState::Tp3Hit;
        input.current_sl = dec!(5080);

        input.current_price = dec!(5079);
        let r = evaluate(input);
        assert!(r.should_close);
        assert_eq!(r.close_reason.as_deref(), Some("sl_hit_from_tp3_hit"));
    }

    #[test]
    fn s3_short_tp1_then_tp2_then_sl() {
        let mut input = TrailingInput {
            side: Side::Short,
            state: PositionState::Active,
            entry_price: dec!(5080),
            current_sl: dec!(5080),
            tp1: dec!(5050),
            tp2: dec!(5020),
            tp3: dec!(5000),
            current_price: dec!(5050),
        };
        let r = evaluate(input);
        assert_eq!(r.new_state, Some(PositionState::Tp1Hit));
        assert_eq!(r.new_sl, Some(dec!(5080)));
        input.state = PositionState::Tp1Hit;
        input.current_sl = dec!(5080);

        input.current_price = dec!(5020);
        let r = evaluate(input);
        assert_eq!(r.new_state, Some(PositionState::Tp2Hit));
        assert_eq!(r.new_sl, Some(dec!(5050)));
        input.state = PositionState::Tp2Hit;
        input.current_sl = dec!(5050);

        input.current_price = dec!(5051);
        let r = evaluate(input);
        assert!(r.should_close);
        assert_eq!(r.close_reason.as_deref(), Some("sl_hit_from_tp2_hit"));
    }

    #[test]
    fn price_exactly_equal_to_sl_is_a_breach() {
        let input = base(Side::Long, PositionState::Active, dec!(5020));
        let r = evaluate(input);
        assert!(r.should_close);
    }

    #[test]
    fn tie_break_sl_wins_over_tp() {
        // current_sl equals tp1 exactly; a price that satisfies both
        // the breach and the TP condition must close, not advance state.
        let mut input = base(Side::Long, PositionState::Active, dec!(5050));
        input.current_sl = dec!(5050);
        let r = evaluate(input);
        assert!(r.should_close);
        assert_eq!(r.new_state, Some(PositionState::Closed));
    }
}
