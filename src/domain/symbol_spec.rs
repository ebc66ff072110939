//! Static per-symbol contract specification table (§4.1, §4.4).
//!
//! Tick size for SL-buffer math, point value for P&L math, and the
//! micro-equivalent coefficient for the capacity accountant. Read-only,
//! shared across every account's state machine.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// "mini" contracts count 10 toward capacity, "micro" contracts count 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractClass {
    Mini,
    Micro,
}

impl ContractClass {
    pub fn micro_equivalent_coefficient(self) -> Decimal {
        match self {
            ContractClass::Mini => dec!(10),
            ContractClass::Micro => dec!(1),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SymbolSpec {
    pub symbol: &'static str,
    pub tick_size: Decimal,
    pub point_value: Decimal,
    pub class: ContractClass,
}

const DEFAULT_TICK_SIZE: Decimal = dec!(0.25);

/// Table of known futures contracts. Minis and their micro counterparts are
/// both listed since either may appear in an alert/position independently.
const SYMBOL_TABLE: &[SymbolSpec] = &[
    SymbolSpec { symbol: "ES", tick_size: dec!(0.25), point_value: dec!(50), class: ContractClass::Mini },
    SymbolSpec { symbol: "MES", tick_size: dec!(0.25), point_value: dec!(5), class: ContractClass::Micro },
    SymbolSpec { symbol: "NQ", tick_size: dec!(0.25), point_value: dec!(20), class: ContractClass::Mini },
    SymbolSpec { symbol: "MNQ", tick_size: dec!(0.25), point_value: dec!(2), class: ContractClass::Micro },
    SymbolSpec { symbol: "YM", tick_size: dec!(1), point_value: dec!(5), class: ContractClass::Mini },
    SymbolSpec { symbol: "MYM", tick_size: dec!(1), point_value: dec!(0.5), class: ContractClass::Micro },
    SymbolSpec { symbol: "GC", tick_size: dec!(0.10), point_value: dec!(100), class: ContractClass::Mini },
    SymbolSpec { symbol: "MGC", tick_size: dec!(0.10), point_value: dec!(10), class: ContractClass::Micro },
    SymbolSpec { symbol: "CL", tick_size: dec!(0.01), point_value: dec!(1000), class: ContractClass::Mini },
    SymbolSpec { symbol: "MCL", tick_size: dec!(0.01), point_value: dec!(100), class: ContractClass::Micro },
];

/// Looks up a symbol's spec. Unknown symbols default to tick size 0.25
/// (§4.1) with a Mini classification and a point value of 1 — used only for
/// SL-buffer math; the Router drops alerts for symbols it cannot resolve a
/// contract id for (§4.6), so an unknown point value never reaches P&L math.
pub fn lookup(symbol: &str) -> SymbolSpec {
    SYMBOL_TABLE
        .iter()
        .find(|s| s.symbol.eq_ignore_ascii_case(symbol))
        .copied()
        .unwrap_or(SymbolSpec {
            symbol: "UNKNOWN",
            tick_size: DEFAULT_TICK_SIZE,
            point_value: Decimal::ONE,
            class: ContractClass::Mini,
        })
}

pub fn is_known(symbol: &str) -> bool {
    SYMBOL_TABLE.iter().any(|s| s.symbol.eq_ignore_ascii_case(symbol))
}

pub fn tick_size(symbol: &str) -> Decimal {
    lookup(symbol).tick_size
}

pub fn point_value(symbol: &str) -> Decimal {
    lookup(symbol).point_value
}

/// Micro-equivalent units consumed by `quantity` contracts of `symbol`
/// (§4.4, Glossary "Micro-equivalent").
pub fn micro_equivalent(symbol: &str, quantity: i64) -> Decimal {
    lookup(symbol).class.micro_equivalent_coefficient() * Decimal::from(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_mini_and_micro_coefficients() {
        assert_eq!(micro_equivalent("ES", 1), dec!(10));
        assert_eq!(micro_equivalent("MES", 1), dec!(1));
        assert_eq!(micro_equivalent("MNQ", 3), dec!(3));
    }

    #[test]
    fn unknown_symbol_defaults() {
        let spec = lookup("ZZZZ");
        assert_eq!(spec.tick_size, dec!(0.25));
    }

    #[test]
    fn case_insensitive_lookup() {
        assert!(is_known("es"));
        assert_eq!(point_value("mes"), dec!(5));
    }
}
