//! Dry-run `BrokerageAdapter`. Logs every call instead of reaching a real
//! brokerage and synthesizes an immediate fill at the requested price.

use crate::domain::ports::{
    BrokerSide, BrokerageAdapter, BrokeragePosition, FlattenResult, OrderEvent, PlaceOrderResult,
    QuoteEvent,
};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::info;

/// Order id returned for every synthetic fill (§6).
pub const DRY_RUN_ORDER_ID: &str = "-1";

pub struct DryRunAdapter {
    order_tx: Sender<OrderEvent>,
    order_rx: Mutex<Option<Receiver<OrderEvent>>>,
    quote_tx: Sender<QuoteEvent>,
    quote_rx: Mutex<Option<Receiver<QuoteEvent>>>,
}

impl DryRunAdapter {
    pub fn new() -> Self {
        let (order_tx, order_rx) = mpsc::channel(256);
        let (quote_tx, quote_rx) = mpsc::channel(256);
        Self {
            order_tx,
            order_rx: Mutex::new(Some(order_rx)),
            quote_tx,
            quote_rx: Mutex::new(Some(quote_rx)),
        }
    }

    /// Feeds a quote tick into the dry-run stream, for scenario tests that
    /// need to drive the trailing-stop evaluator without a live feed.
    pub async fn push_quote(&self, event: QuoteEvent) {
        let _ = self.quote_tx.send(event).await;
    }
}

impl Default for DryRunAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerageAdapter for DryRunAdapter {
    async fn authenticate(&self) -> Result<String> {
        info!("dry-run: authenticate");
        Ok("dry-run-session".to_string())
    }

    async fn place_limit(
        &self,
        account_id: &str,
        contract_id: &str,
        side: BrokerSide,
        size: i64,
        limit_price: Decimal,
        tag: Option<&str>,
    ) -> Result<PlaceOrderResult> {
        info!(
            account_id,
            contract_id,
            ?side,
            size,
            %limit_price,
            tag,
            "dry-run: place_limit"
        );
        let _ = self
            .order_tx
            .send(OrderEvent::Filled {
                order_id: DRY_RUN_ORDER_ID.to_string(),
                fill_price: limit_price,
            })
            .await;
        Ok(PlaceOrderResult {
            success: true,
            order_id: Some(DRY_RUN_ORDER_ID.to_string()),
            error_code: None,
            error_message: None,
        })
    }

    async fn cancel(&self, order_id: &str, account_id: &str) -> Result<bool> {
        info!(order_id, account_id, "dry-run: cancel");
        Ok(true)
    }

    async fn market_close(
        &self,
        account_id: &str,
        contract_id: &str,
        size: i64,
        is_long: bool,
    ) -> Result<PlaceOrderResult> {
        info!(account_id, contract_id, size, is_long, "dry-run: market_close");
        Ok(PlaceOrderResult {
            success: true,
            order_id: Some(DRY_RUN_ORDER_ID.to_string()),
            error_code: None,
            error_message: None,
        })
    }

    async fn list_positions(&self, account_id: &str) -> Result<Vec<BrokeragePosition>> {
        info!(account_id, "dry-run: list_positions (always empty)");
        Ok(vec![])
    }

    async fn flatten(&self, account_id: &str) -> Result<FlattenResult> {
        info!(account_id, "dry-run: flatten");
        Ok(FlattenResult {
            orders_cancelled: 0,
            positions_closed: 0,
        })
    }

    async fn subscribe_quote(&self, contract_id: &str) -> Result<()> {
        info!(contract_id, "dry-run: subscribe_quote");
        Ok(())
    }

    async fn unsubscribe_quote(&self, contract_id: &str) -> Result<()> {
        info!(contract_id, "dry-run: unsubscribe_quote");
        Ok(())
    }

    fn take_order_events(&self) -> Receiver<OrderEvent> {
        self.order_rx
            .try_lock()
            .expect("take_order_events called concurrently")
            .take()
            .expect("take_order_events called more than once")
    }

    fn take_quote_events(&self) -> Receiver<QuoteEvent> {
        self.quote_rx
            .try_lock()
            .expect("take_quote_events called concurrently")
            .take()
            .expect("take_quote_events called more than once")
    }
}
