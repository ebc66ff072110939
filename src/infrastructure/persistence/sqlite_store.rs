//! `PositionStore` over SQLite. Upserts positions by id and inserts one
//! `trades_log` row per closed trade; `Decimal` and enum fields bind as
//! strings.

use crate::domain::errors::PersistenceError;
use crate::domain::position::{ManagedPosition, PositionState, Side};
use crate::domain::ports::PositionStore;
use crate::domain::trade_result::TradeResult;
use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;

pub struct SqlitePositionStore {
    pool: SqlitePool,
}

impl SqlitePositionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn side_str(side: Side) -> &'static str {
    match side {
        Side::Long => "long",
        Side::Short => "short",
    }
}

fn state_str(state: PositionState) -> &'static str {
    match state {
        PositionState::PendingEntry => "pending_entry",
        PositionState::Active => "active",
        PositionState::Tp1Hit => "tp1_hit",
        PositionState::Tp2Hit => "tp2_hit",
        PositionState::Tp3Hit => "tp3_hit",
        PositionState::PendingRetry => "pending_retry",
        PositionState::Closed => "closed",
        PositionState::Cancelled => "cancelled",
    }
}

#[async_trait]
impl PositionStore for SqlitePositionStore {
    async fn insert_position(&self, position: &ManagedPosition) -> Result<()> {
        let vpvr_json = serde_json::to_string(&position.vpvr_snapshot)?;
        sqlx::query(
            r#"
            INSERT INTO positions (
                id, alert_id, original_alert_id, symbol, side, state,
                entry_order_id, entry_price, target_entry_price, quantity,
                contract_id, account_id, current_sl, initial_sl,
                tp1_price, tp2_price, tp3_price, unrealized_pnl, last_price,
                exit_price, exit_reason, closed_at, retry_count, max_retries,
                vpvr_data, confirmation_score, llm_reasoning, llm_confidence,
                strategy_tag, created_at, updated_at
            ) VALUES (
                ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
            )
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&position.id)
        .bind(&position.alert_id)
        .bind(&position.original_alert_id)
        .bind(&position.symbol)
        .bind(side_str(position.side))
        .bind(state_str(position.state))
        .bind(&position.entry_order_id)
        .bind(position.fill_price.map(|d| d.to_string()))
        .bind(position.target_entry_price.to_string())
        .bind(position.quantity)
        .bind(&position.contract_id)
        .bind(&position.account_id)
        .bind(position.current_sl.to_string())
        .bind(position.initial_sl.to_string())
        .bind(position.tp1.to_string())
        .bind(position.tp2.to_string())
        .bind(position.tp3.to_string())
        .bind(position.unrealized_pnl.to_string())
        .bind(position.last_price.map(|d| d.to_string()))
        .bind(position.exit_price.map(|d| d.to_string()))
        .bind(&position.exit_reason)
        .bind(position.closed_at)
        .bind(position.retry_count as i64)
        .bind(position.max_retries as i64)
        .bind(vpvr_json)
        .bind(position.confirmation_score)
        .bind(&position.llm_reasoning)
        .bind(position.llm_confidence)
        .bind(&position.strategy_tag)
        .bind(position.created_at)
        .bind(position.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| PersistenceError::PositionInsert {
            position_id: position.id.clone(),
            reason: err.to_string(),
        })?;

        Ok(())
    }

    async fn update_position(&self, position: &ManagedPosition) -> Result<()> {
        let vpvr_json = serde_json::to_string(&position.vpvr_snapshot)?;
        sqlx::query(
            r#"
            UPDATE positions SET
                state = ?, entry_order_id = ?, entry_price = ?, current_sl = ?,
                tp1_price = ?, tp2_price = ?, tp3_price = ?, unrealized_pnl = ?,
                last_price = ?, exit_price = ?, exit_reason = ?, closed_at = ?,
                retry_count = ?, vpvr_data = ?, llm_reasoning = ?, llm_confidence = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(state_str(position.state))
        .bind(&position.entry_order_id)
        .bind(position.fill_price.map(|d| d.to_string()))
        .bind(position.current_sl.to_string())
        .bind(position.tp1.to_string())
        .bind(position.tp2.to_string())
        .bind(position.tp3.to_string())
        .bind(position.unrealized_pnl.to_string())
        .bind(position.last_price.map(|d| d.to_string()))
        .bind(position.exit_price.map(|d| d.to_string()))
        .bind(&position.exit_reason)
        .bind(position.closed_at)
        .bind(position.retry_count as i64)
        .bind(vpvr_json)
        .bind(&position.llm_reasoning)
        .bind(position.llm_confidence)
        .bind(position.updated_at)
        .bind(&position.id)
        .execute(&self.pool)
        .await
        .map_err(|err| PersistenceError::PositionUpdate {
            position_id: position.id.clone(),
            reason: err.to_string(),
        })?;

        Ok(())
    }

    async fn insert_trade(&self, trade: &TradeResult) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trades_log (
                position_id, alert_id, original_alert_id, symbol, side,
                entry_price, entry_time, exit_price, exit_time, exit_reason,
                quantity, gross_pnl, fees, net_pnl, vpvr_poc, vpvr_vah, vpvr_val,
                highest_tp_hit, retry_count, confirmation_score, llm_reasoning
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&trade.position_id)
        .bind(&trade.alert_id)
        .bind(&trade.original_alert_id)
        .bind(&trade.symbol)
        .bind(side_str(trade.side))
        .bind(trade.entry_price.to_string())
        .bind(trade.entry_time)
        .bind(trade.exit_price.to_string())
        .bind(trade.exit_time)
        .bind(&trade.exit_reason)
        .bind(trade.quantity)
        .bind(trade.gross_pnl.to_string())
        .bind(trade.fees.to_string())
        .bind(trade.net_pnl.to_string())
        .bind(trade.vpvr_poc.to_string())
        .bind(trade.vpvr_vah.to_string())
        .bind(trade.vpvr_val.to_string())
        .bind(trade.highest_tp_hit.as_str())
        .bind(trade.retry_count as i64)
        .bind(trade.confirmation_score)
        .bind(&trade.llm_reasoning)
        .execute(&self.pool)
        .await
        .map_err(|err| PersistenceError::TradeInsert {
            position_id: trade.position_id.clone(),
            reason: err.to_string(),
        })?;

        Ok(())
    }
}
