//! Capability interfaces consumed by the core.
//!
//! Concrete implementations live in `infrastructure::*`. The core never
//! depends on a concrete brokerage, store, or alert transport — only on
//! these traits.

use crate::domain::alert::AlertRecord;
use crate::domain::position::{ManagedPosition, Side};
use crate::domain::trade_result::TradeResult;
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::mpsc::Receiver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerSide {
    Buy,
    Sell,
}

impl From<Side> for BrokerSide {
    fn from(s: Side) -> Self {
        match s {
            Side::Long => BrokerSide::Buy,
            Side::Short => BrokerSide::Sell,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlaceOrderResult {
    pub success: bool,
    pub order_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BrokeragePosition {
    pub contract_id: String,
    pub size: Decimal,
    pub average_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct FlattenResult {
    pub orders_cancelled: u32,
    pub positions_closed: u32,
}

/// Order-status update delivered over the user-event stream (§6).
#[derive(Debug, Clone)]
pub enum OrderEvent {
    Filled {
        order_id: String,
        fill_price: Decimal,
    },
    Rejected {
        order_id: String,
        message: String,
    },
    PositionUpdate {
        account_id: String,
        contract_id: String,
        size: Decimal,
        average_price: Decimal,
    },
}

/// Quote tick delivered over the market data stream (§6).
#[derive(Debug, Clone)]
pub struct QuoteEvent {
    pub contract_id: String,
    pub last: Decimal,
    pub timestamp: i64,
}

/// Abstract brokerage operations consumed by the core (§6 "Brokerage
/// adapter"). Every call may suspend (§5); failures are surfaced as
/// `Err` and handled per §4.10/§7.
#[async_trait]
pub trait BrokerageAdapter: Send + Sync {
    async fn authenticate(&self) -> Result<String>;

    async fn place_limit(
        &self,
        account_id: &str,
        contract_id: &str,
        side: BrokerSide,
        size: i64,
        limit_price: Decimal,
        tag: Option<&str>,
    ) -> Result<PlaceOrderResult>;

    async fn cancel(&self, order_id: &str, account_id: &str) -> Result<bool>;

    async fn market_close(
        &self,
        account_id: &str,
        contract_id: &str,
        size: i64,
        is_long: bool,
    ) -> Result<PlaceOrderResult>;

    async fn list_positions(&self, account_id: &str) -> Result<Vec<BrokeragePosition>>;

    async fn flatten(&self, account_id: &str) -> Result<FlattenResult>;

    /// Subscribes to the given contract id on the shared quote stream.
    async fn subscribe_quote(&self, contract_id: &str) -> Result<()>;

    async fn unsubscribe_quote(&self, contract_id: &str) -> Result<()>;

    /// Takes the user-event (order/position) receiver. Callable once.
    fn take_order_events(&self) -> Receiver<OrderEvent>;

    /// Takes the shared quote receiver. Callable once.
    fn take_quote_events(&self) -> Receiver<QuoteEvent>;
}

/// Opaque persistence store (§6 "Persistence store", §4.7).
#[async_trait]
pub trait PositionStore: Send + Sync {
    async fn insert_position(&self, position: &ManagedPosition) -> Result<()>;
    async fn update_position(&self, position: &ManagedPosition) -> Result<()>;
    async fn insert_trade(&self, trade: &TradeResult) -> Result<()>;
}

/// Alert source (§6): a stream of alert records in creation order.
#[async_trait]
pub trait AlertSource: Send + Sync {
    fn subscribe(&self) -> Receiver<AlertRecord>;
}
