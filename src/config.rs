//! CLI/env configuration surface: a `clap::Parser` derive plus a
//! `dotenvy::dotenv().ok()`-then-parse startup sequence.

use anyhow::{Context, Result, bail};
use clap::Parser;
use rust_decimal::Decimal;
use std::time::Duration;

/// Repeated `--account` entries, each `accountId[:alertName][:symbols][:slBuffer][:maxRetries][:maxContracts]`
/// colon-separated, one entry per account override.
#[derive(Debug, Clone)]
pub struct AccountArg {
    pub account_id: String,
    pub alert_name: Option<String>,
    pub symbols: Vec<String>,
    pub sl_buffer_ticks: Option<u32>,
    pub max_retries: Option<u32>,
    pub max_contracts: Option<Decimal>,
}

impl std::str::FromStr for AccountArg {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(':');
        let account_id = parts
            .next()
            .filter(|p| !p.is_empty())
            .context("--account requires a non-empty account id")?
            .to_string();
        let alert_name = parts.next().filter(|p| !p.is_empty()).map(String::from);
        let symbols = parts
            .next()
            .filter(|p| !p.is_empty())
            .map(|p| p.split(',').map(String::from).collect())
            .unwrap_or_default();
        let sl_buffer_ticks = parts
            .next()
            .filter(|p| !p.is_empty())
            .map(|p| p.parse())
            .transpose()
            .context("--account sl-buffer segment must be an integer")?;
        let max_retries = parts
            .next()
            .filter(|p| !p.is_empty())
            .map(|p| p.parse())
            .transpose()
            .context("--account max-retries segment must be an integer")?;
        let max_contracts = parts
            .next()
            .filter(|p| !p.is_empty())
            .map(|p| p.parse())
            .transpose()
            .context("--account max-contracts segment must be a decimal")?;

        Ok(AccountArg {
            account_id,
            alert_name,
            symbols,
            sl_buffer_ticks,
            max_retries,
            max_contracts,
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Autonomous VPVR position-lifecycle engine", long_about = None)]
pub struct Cli {
    /// Repeated per-account entry: accountId[:alertName][:symbols][:slBuffer][:maxRetries][:maxContracts]
    #[arg(long = "account")]
    pub accounts: Vec<AccountArg>,

    /// Global default symbol filter, comma-separated (overridden per-account).
    #[arg(long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Global default position quantity in contracts.
    #[arg(long, default_value_t = 1)]
    pub quantity: i64,

    /// Global default capacity ceiling in micro-equivalent units.
    #[arg(long, default_value = "10")]
    pub max_contracts: Decimal,

    /// Global default retry-ladder depth.
    #[arg(long, default_value_t = 2)]
    pub max_retries: u32,

    /// Global default SL buffer in ticks (0 = breakeven stop after fill).
    #[arg(long, default_value_t = 0)]
    pub sl_buffer: u32,

    /// Reconciliation interval in milliseconds; 0 disables it (§4.9).
    #[arg(long, default_value_t = 60_000)]
    pub sync_interval: u64,

    /// Durable-write-queue flush interval in milliseconds.
    #[arg(long, default_value_t = 5_000)]
    pub write_flush_interval: u64,

    /// Push-based metrics snapshot interval in milliseconds (§10.5).
    #[arg(long, default_value_t = 60_000)]
    pub metrics_interval: u64,

    /// Runs against the dry-run brokerage adapter instead of a live one.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Cancels working orders and market-closes positions on every
    /// configured account before connecting streams (§10.7).
    #[arg(long, default_value_t = false)]
    pub flatten_on_start: bool,

    /// `sqlite://` connection string for the persistence store.
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://vpvr_trader.db")]
    pub database_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub accounts: Vec<AccountArg>,
    pub default_symbols: Vec<String>,
    pub default_quantity: i64,
    pub default_max_contracts: Decimal,
    pub default_max_retries: u32,
    pub default_sl_buffer: u32,
    pub sync_interval: Duration,
    pub write_flush_interval: Duration,
    pub metrics_interval: Duration,
    pub dry_run: bool,
    pub flatten_on_start: bool,
    pub database_url: String,
}

impl Config {
    /// Loads `.env` via `dotenvy::dotenv().ok()` then parses the CLI. At
    /// least one `--account` is required.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let cli = Cli::parse();
        Self::from_cli(cli)
    }

    fn from_cli(cli: Cli) -> Result<Self> {
        if cli.accounts.is_empty() {
            bail!("at least one --account entry is required");
        }

        Ok(Config {
            accounts: cli.accounts,
            default_symbols: cli.symbols,
            default_quantity: cli.quantity,
            default_max_contracts: cli.max_contracts,
            default_max_retries: cli.max_retries,
            default_sl_buffer: cli.sl_buffer,
            sync_interval: Duration::from_millis(cli.sync_interval),
            write_flush_interval: Duration::from_millis(cli.write_flush_interval),
            metrics_interval: Duration::from_millis(cli.metrics_interval),
            dry_run: cli.dry_run,
            flatten_on_start: cli.flatten_on_start,
            database_url: cli.database_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn account_arg_parses_minimal_form() {
        let arg = AccountArg::from_str("acct-1").unwrap();
        assert_eq!(arg.account_id, "acct-1");
        assert!(arg.symbols.is_empty());
        assert!(arg.sl_buffer_ticks.is_none());
    }

    #[test]
    fn account_arg_parses_full_form() {
        let arg = AccountArg::from_str("acct-1:breakout:ES,NQ:2:3:10").unwrap();
        assert_eq!(arg.account_id, "acct-1");
        assert_eq!(arg.alert_name.as_deref(), Some("breakout"));
        assert_eq!(arg.symbols, vec!["ES", "NQ"]);
        assert_eq!(arg.sl_buffer_ticks, Some(2));
        assert_eq!(arg.max_retries, Some(3));
        assert_eq!(arg.max_contracts, Some(Decimal::from(10)));
    }

    #[test]
    fn missing_account_id_is_rejected() {
        assert!(AccountArg::from_str("").is_err());
    }

    #[test]
    fn config_requires_at_least_one_account() {
        let cli = Cli {
            accounts: vec![],
            symbols: vec![],
            quantity: 1,
            max_contracts: Decimal::from(10),
            max_retries: 2,
            sl_buffer: 0,
            sync_interval: 60_000,
            write_flush_interval: 5_000,
            metrics_interval: 60_000,
            dry_run: true,
            flatten_on_start: false,
            database_url: "sqlite://test.db".into(),
        };
        assert!(Config::from_cli(cli).is_err());
    }
}
