//! Component D — Capacity Accountant (§4.4).
//!
//! One instance per account's state machine, enforcing
//! `Σ microEquivalent(symbol, quantity) <= maxContracts` across that
//! account's non-terminal positions (§8 universal property).

use crate::domain::symbol_spec;
use rust_decimal::Decimal;
use std::collections::HashMap;

pub struct CapacityAccountant {
    max_contracts: Decimal,
    used_by_symbol: HashMap<String, Decimal>,
}

impl CapacityAccountant {
    pub fn new(max_contracts: Decimal) -> Self {
        Self {
            max_contracts,
            used_by_symbol: HashMap::new(),
        }
    }

    pub fn used(&self) -> Decimal {
        self.used_by_symbol.values().copied().sum()
    }

    pub fn max(&self) -> Decimal {
        self.max_contracts
    }

    /// Checks whether `quantity` more contracts of `symbol` fit under the
    /// budget, optionally first freeing the slot held by an existing
    /// same-symbol position that is about to be replaced (§4.3 "on alert").
    pub fn check(&self, symbol: &str, quantity: i64, freeing_existing: bool) -> CapacityCheck {
        let required = symbol_spec::micro_equivalent(symbol, quantity);
        let mut used = self.used();
        if freeing_existing {
            used -= self.used_by_symbol.get(symbol).copied().unwrap_or_default();
        }
        let projected = used + required;
        CapacityCheck {
            fits: projected <= self.max_contracts,
            current: used,
            max: self.max_contracts,
            required,
        }
    }

    pub fn reserve(&mut self, symbol: &str, quantity: i64) {
        let amount = symbol_spec::micro_equivalent(symbol, quantity);
        self.used_by_symbol.insert(symbol.to_string(), amount);
    }

    pub fn release(&mut self, symbol: &str) {
        self.used_by_symbol.remove(symbol);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacityCheck {
    pub fits: bool,
    pub current: Decimal,
    pub max: Decimal,
    pub required: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn s5_capacity_guard_rejects_when_full() {
        let mut acc = CapacityAccountant::new(dec!(3));
        acc.reserve("MES", 1);
        acc.reserve("MNQ", 1);
        acc.reserve("MYM", 1);

        let check = acc.check("MGC", 1, false);
        assert!(!check.fits);
        assert_eq!(check.current, dec!(3));
        assert_eq!(check.max, dec!(3));
        assert_eq!(check.required, dec!(1));
    }

    #[test]
    fn s6_opposing_alert_frees_its_own_slot() {
        let mut acc = CapacityAccountant::new(dec!(3));
        acc.reserve("MES", 1);
        acc.reserve("MNQ", 1);
        acc.reserve("MYM", 1);

        let check = acc.check("MES", 1, true);
        assert!(check.fits);
        assert_eq!(check.current, dec!(2));
    }

    #[test]
    fn mini_contract_consumes_ten_units() {
        let mut acc = CapacityAccountant::new(dec!(10));
        acc.reserve("ES", 1);
        assert_eq!(acc.used(), dec!(10));
        let check = acc.check("MES", 1, false);
        assert!(!check.fits);
    }
}
