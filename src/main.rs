//! Headless orchestrator entry point: load env, init tracing, build the
//! application, run until Ctrl+C.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;
use vpvr_trader::application::router::{AccountEntry, Router};
use vpvr_trader::application::runner::{Runner, RunnerConfig};
use vpvr_trader::application::state_machine::{AccountConfig, PositionStateMachine};
use vpvr_trader::application::write_queue::WriteQueue;
use vpvr_trader::config::Config;
use vpvr_trader::domain::ports::{AlertSource, BrokerageAdapter, PositionStore};
use vpvr_trader::infrastructure::alert_source::ChannelAlertSource;
use vpvr_trader::infrastructure::brokerage::DryRunAdapter;
use vpvr_trader::infrastructure::persistence::{Database, SqlitePositionStore};

#[tokio::main]
async fn main() -> Result<()> {
    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("vpvr-trader {} starting...", env!("CARGO_PKG_VERSION"));

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("configuration error: {err:#}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(config).await {
        tracing::error!("fatal: {err:#}");
        std::process::exit(1);
    }

    Ok(())
}

async fn run(config: Config) -> Result<()> {
    let database = Database::connect(&config.database_url)
        .await
        .context("failed to connect to persistence store")?;
    let store: Arc<dyn PositionStore> = Arc::new(SqlitePositionStore::new(database.pool.clone()));
    let write_queue = WriteQueue::new(store);

    let mut account_entries = Vec::with_capacity(config.accounts.len());
    let mut state_machines = HashMap::with_capacity(config.accounts.len());

    for account in &config.accounts {
        let symbol_filter = if account.symbols.is_empty() {
            config.default_symbols.clone()
        } else {
            account.symbols.clone()
        };
        let sl_buffer_ticks = account.sl_buffer_ticks.unwrap_or(config.default_sl_buffer);
        let max_retries = account.max_retries.unwrap_or(config.default_max_retries);
        let max_contracts = account
            .max_contracts
            .unwrap_or(config.default_max_contracts);

        account_entries.push(AccountEntry {
            account_id: account.account_id.clone(),
            symbol_filter,
            sl_buffer_ticks,
            max_retries,
            max_contracts,
            signal_filter: account.alert_name.iter().cloned().collect(),
        });

        state_machines.insert(
            account.account_id.clone(),
            PositionStateMachine::new(AccountConfig {
                account_id: account.account_id.clone(),
                sl_buffer_ticks,
                max_retries,
                max_contracts,
                default_quantity: config.default_quantity,
            }),
        );
    }

    let router = Router::new(account_entries, HashMap::new());

    let adapter: Arc<dyn BrokerageAdapter> = if config.dry_run {
        Arc::new(DryRunAdapter::new())
    } else {
        anyhow::bail!(
            "no live brokerage adapter is configured in this build; run with --dry-run, \
             or wire a concrete BrokerageAdapter behind infrastructure::brokerage"
        );
    };

    let alert_source: Arc<dyn AlertSource> = Arc::new(ChannelAlertSource::default());

    let runner = Runner::new(
        router,
        state_machines,
        adapter,
        alert_source,
        write_queue,
        RunnerConfig {
            write_flush_interval: config.write_flush_interval,
            sync_interval: config.sync_interval,
            flatten_on_start: config.flatten_on_start,
            metrics_interval: config.metrics_interval,
        },
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(runner.run(shutdown_rx));

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(());

    handle.await.context("runner task panicked")??;
    Ok(())
}
