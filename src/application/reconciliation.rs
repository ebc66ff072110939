//! Reconciliation (§4.9). Pure comparison between the local non-terminal
//! position set and the brokerage's reported open positions; the
//! Orchestrator drives the actual `onClose` calls and logging.

use crate::domain::ports::BrokeragePosition;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconciliationOutcome {
    /// Symbols of local non-terminal positions whose contract id has no
    /// matching brokerage-reported open position; these should be closed
    /// with reason `eod_liquidation` (§4.9).
    pub to_close: Vec<String>,
    /// Contract ids the brokerage reports open with no corresponding local
    /// position; logged as a warning, never auto-adopted (§4.9, §9).
    pub orphans: Vec<String>,
}

/// `local` is every account's non-terminal positions as `(symbol,
/// contract_id)` pairs; `open` is what `listPositions` returned.
pub fn reconcile(local: &[(String, String)], open: &[BrokeragePosition]) -> ReconciliationOutcome {
    let open_contract_ids: HashSet<&str> = open.iter().map(|p| p.contract_id.as_str()).collect();
    let local_contract_ids: HashSet<&str> = local.iter().map(|(_, c)| c.as_str()).collect();

    let to_close = local
        .iter()
        .filter(|(_, cid)| !open_contract_ids.contains(cid.as_str()))
        .map(|(symbol, _)| symbol.clone())
        .collect();

    let orphans = open
        .iter()
        .filter(|p| !local_contract_ids.contains(p.contract_id.as_str()))
        .map(|p| p.contract_id.clone())
        .collect();

    ReconciliationOutcome { to_close, orphans }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn open(contract_id: &str) -> BrokeragePosition {
        BrokeragePosition {
            contract_id: contract_id.to_string(),
            size: dec!(1),
            average_price: dec!(5000),
        }
    }

    #[test]
    fn matching_positions_produce_no_findings() {
        let local = vec![("ES".to_string(), "CON-ES".to_string())];
        let open = vec![open("CON-ES")];
        let outcome = reconcile(&local, &open);
        assert!(outcome.to_close.is_empty());
        assert!(outcome.orphans.is_empty());
    }

    #[test]
    fn local_position_missing_from_brokerage_is_flagged_for_close() {
        let local = vec![("ES".to_string(), "CON-ES".to_string())];
        let outcome = reconcile(&local, &[]);
        assert_eq!(outcome.to_close, vec!["ES".to_string()]);
    }

    #[test]
    fn exchange_position_with_no_local_match_is_an_orphan() {
        let outcome = reconcile(&[], &[open("CON-NQ")]);
        assert_eq!(outcome.orphans, vec!["CON-NQ".to_string()]);
    }

    #[test]
    fn no_local_and_no_open_positions_is_trivially_clean() {
        let outcome = reconcile(&[], &[]);
        assert_eq!(outcome, ReconciliationOutcome::default());
    }
}
