//! SQLite connection pool and schema bootstrap: WAL journal mode,
//! `create_if_missing`, directory creation for file-backed URLs.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn connect(db_url: &str) -> Result<Self> {
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent)
                        .await
                        .context("failed to create database directory")?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("failed to connect to SQLite database")?;

        info!(%db_url, "connected to database");
        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS positions (
                id TEXT PRIMARY KEY,
                alert_id TEXT NOT NULL,
                original_alert_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                state TEXT NOT NULL,
                entry_order_id TEXT,
                entry_price TEXT,
                target_entry_price TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                contract_id TEXT NOT NULL,
                account_id TEXT NOT NULL,
                current_sl TEXT NOT NULL,
                initial_sl TEXT NOT NULL,
                tp1_price TEXT NOT NULL,
                tp2_price TEXT NOT NULL,
                tp3_price TEXT NOT NULL,
                unrealized_pnl TEXT NOT NULL,
                last_price TEXT,
                exit_price TEXT,
                exit_reason TEXT,
                closed_at TEXT,
                retry_count INTEGER NOT NULL,
                max_retries INTEGER NOT NULL,
                vpvr_data TEXT NOT NULL,
                confirmation_score REAL,
                llm_reasoning TEXT,
                llm_confidence REAL,
                strategy_tag TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create positions table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_positions_account_symbol
            ON positions (account_id, symbol);
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create positions index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                position_id TEXT NOT NULL,
                alert_id TEXT NOT NULL,
                original_alert_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                entry_price TEXT NOT NULL,
                entry_time TEXT NOT NULL,
                exit_price TEXT NOT NULL,
                exit_time TEXT NOT NULL,
                exit_reason TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                gross_pnl TEXT NOT NULL,
                fees TEXT NOT NULL,
                net_pnl TEXT NOT NULL,
                vpvr_poc TEXT NOT NULL,
                vpvr_vah TEXT NOT NULL,
                vpvr_val TEXT NOT NULL,
                highest_tp_hit TEXT,
                retry_count INTEGER NOT NULL,
                confirmation_score REAL,
                llm_reasoning TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create trades_log table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_trades_log_position
            ON trades_log (position_id);
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create trades_log index")?;

        info!("database schema initialized");
        Ok(())
    }
}
