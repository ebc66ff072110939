//! Component F — Multi-Account Router (§4.6).
//!
//! Resolves contract ids, decides which accounts an alert fans out to, and
//! tracks which contract ids already have a live quote subscription so the
//! Orchestrator only subscribes once per contract even though many accounts
//! may trade the same symbol.

use crate::domain::alert::AlertRecord;
use crate::domain::symbol_spec;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct AccountEntry {
    pub account_id: String,
    /// Empty means "accept every known symbol" (§4.6).
    pub symbol_filter: Vec<String>,
    pub sl_buffer_ticks: u32,
    pub max_retries: u32,
    pub max_contracts: rust_decimal::Decimal,
    /// Empty means "accept every signal/strategy tag".
    pub signal_filter: Vec<String>,
}

impl AccountEntry {
    fn accepts_symbol(&self, symbol: &str) -> bool {
        self.symbol_filter.is_empty()
            || self.symbol_filter.iter().any(|s| s.eq_ignore_ascii_case(symbol))
    }

    fn accepts_signal(&self, strategy_tag: Option<&str>) -> bool {
        if self.signal_filter.is_empty() {
            return true;
        }
        match strategy_tag {
            Some(tag) => self.signal_filter.iter().any(|s| s.eq_ignore_ascii_case(tag)),
            None => false,
        }
    }
}

pub struct Router {
    accounts: Vec<AccountEntry>,
    contract_map: HashMap<String, String>,
    subscribed_contracts: HashSet<String>,
}

impl Router {
    pub fn new(accounts: Vec<AccountEntry>, seeded_contract_map: HashMap<String, String>) -> Self {
        Self {
            accounts,
            contract_map: seeded_contract_map,
            subscribed_contracts: HashSet::new(),
        }
    }

    pub fn accounts(&self) -> &[AccountEntry] {
        &self.accounts
    }

    /// Resolves a symbol to a contract id, first against the seeded map and
    /// then against the static symbol table (§4.6). `None` means the alert
    /// must be skipped.
    pub fn resolve_contract_id(&mut self, symbol: &str) -> Option<String> {
        if let Some(id) = self.contract_map.get(symbol) {
            return Some(id.clone());
        }
        if !symbol_spec::is_known(symbol) {
            return None;
        }
        let id = format!("CON-{}", symbol.to_uppercase());
        self.contract_map.insert(symbol.to_string(), id.clone());
        Some(id)
    }

    /// Returns `true` the first time a contract id is seen, signalling the
    /// Orchestrator to subscribe it on the shared quote stream (§4.6 "quote
    /// streams are shared").
    pub fn mark_subscribed(&mut self, contract_id: &str) -> bool {
        self.subscribed_contracts.insert(contract_id.to_string())
    }

    /// Selects every account whose symbol and signal filters accept this
    /// alert (§4.6).
    pub fn select_accounts<'a>(&'a self, alert: &AlertRecord) -> Vec<&'a AccountEntry> {
        self.accounts
            .iter()
            .filter(|a| a.accepts_symbol(&alert.symbol) && a.accepts_signal(alert.strategy_tag.as_deref()))
            .collect()
    }

    /// Contract ids known before startup, subscribed eagerly (§4.8 step 1).
    pub fn seeded_contract_ids(&self) -> Vec<String> {
        self.contract_map.values().cloned().collect()
    }

    /// Reverse lookup used when an order/position/quote event only carries
    /// a contract id (§4.8).
    pub fn symbol_for_contract(&self, contract_id: &str) -> Option<String> {
        self.contract_map
            .iter()
            .find(|(_, c)| c.as_str() == contract_id)
            .map(|(symbol, _)| symbol.clone())
    }
}
