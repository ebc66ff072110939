//! Alert Record (§3) — external input consumed by the Router/State Machine.

use crate::domain::vpvr::VpvrSummary;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertAction {
    Buy,
    Sell,
    Close,
    CloseLong,
    CloseShort,
}

impl AlertAction {
    pub fn is_close(self) -> bool {
        matches!(
            self,
            AlertAction::Close | AlertAction::CloseLong | AlertAction::CloseShort
        )
    }

    pub fn is_entry(self) -> bool {
        matches!(self, AlertAction::Buy | AlertAction::Sell)
    }
}

/// Raw-source-provided TP ladder that overrides computed levels when
/// present (§3, §4.3 "on alert").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SfxLevels {
    pub tp1: Decimal,
    pub tp2: Decimal,
    pub tp3: Decimal,
    pub stop_loss: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: String,
    pub timestamp: i64,
    pub symbol: String,
    pub action: AlertAction,
    pub quantity_override: Option<i64>,
    pub strategy_tag: Option<String>,
    pub sfx_levels: Option<SfxLevels>,
    /// Present on entry alerts; absent (and the alert dropped, §4.10) for a
    /// non-close alert whose VPVR is unavailable.
    pub vpvr: Option<VpvrSummary>,
    pub confirmation_score: Option<f64>,
}
