//! Futures Market-Making Simulator
//!
//! Replays aligned tick data for a rolling futures contract through an
//! inventory-skewed two-sided quoting strategy, with risk-based sizing,
//! forced deleveraging, contract rollover and daily mark-to-market
//! settlement.

mod backtest;
mod db;
mod error;
mod feed;
mod models;
mod trading;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::warn;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::backtest::Backtester;
use crate::db::Database;
use crate::models::ExpiryCalendar;
use crate::trading::{EngineConfig, InventoryMode};

/// Market-making backtest CLI.
#[derive(Parser)]
#[command(name = "mmsim")]
#[command(about = "Backtest a market-making strategy on rolling futures", long_about = None)]
struct Cli {
    /// Database file path
    #[arg(short, long, env = "MMSIM_DATABASE", default_value = "sqlite:./mmsim.db?mode=rwc")]
    database: String,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest over a tick file
    Run {
        /// JSON-lines file of aligned ticks
        #[arg(short, long)]
        ticks: PathBuf,

        /// TOML engine configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Initial capital (overrides config)
        #[arg(long)]
        capital: Option<Decimal>,

        /// Quote step in price points (overrides config)
        #[arg(long)]
        step: Option<Decimal>,

        /// Inventory mode: two_lane or net (overrides config)
        #[arg(short, long)]
        mode: Option<InventoryMode>,

        /// Expiry date (repeatable); takes precedence over --calendar
        #[arg(long = "expiry")]
        expiries: Vec<NaiveDate>,

        /// JSON array of expiry dates
        #[arg(long)]
        calendar: Option<PathBuf>,

        /// Write the full results as JSON
        #[arg(short, long)]
        export: Option<PathBuf>,

        /// Don't persist the run
        #[arg(long)]
        no_save: bool,
    },

    /// Show the effective configuration
    Config {
        /// TOML engine configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the generated monthly expiry calendar
    Calendar {
        /// First date covered
        #[arg(long)]
        from: NaiveDate,

        /// Last date covered
        #[arg(long)]
        to: NaiveDate,
    },

    /// List saved runs
    Runs {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Show a saved run's daily equity and order log
    Show {
        /// Run id
        run_id: String,

        /// Number of order log entries to print
        #[arg(short, long, default_value = "20")]
        orders: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => EnvFilter::try_new(cli.log_level.to_lowercase()).unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run {
            ticks,
            config,
            capital,
            step,
            mode,
            expiries,
            calendar,
            export,
            no_save,
        } => {
            let mut engine_config = EngineConfig::load(config.as_deref())?;
            if let Some(capital) = capital {
                engine_config.initial_capital = capital;
            }
            if let Some(step) = step {
                engine_config.tick_step = step;
            }
            if let Some(mode) = mode {
                engine_config.inventory_mode = mode;
            }
            engine_config.validate()?;

            let ticks = feed::load_ticks(&ticks)?;
            let calendar = if !expiries.is_empty() {
                ExpiryCalendar::new(expiries)?
            } else if let Some(path) = calendar {
                feed::load_calendar(&path)?
            } else {
                match (ticks.first(), ticks.last()) {
                    (Some(first), Some(last)) => ExpiryCalendar::third_thursdays(first.date, last.date),
                    _ => ExpiryCalendar::default(),
                }
            };

            if calendar.is_empty() {
                warn!("No expiries scheduled, the front month is never rolled");
            }

            println!("\n=== Market-Making Backtest ===");
            println!("Capital:  {}", engine_config.initial_capital);
            println!("Step:     {}", engine_config.tick_step);
            println!("Mode:     {}", engine_config.inventory_mode);
            println!("Ticks:    {}", ticks.len());
            println!(
                "Expiries: {}",
                calendar
                    .pending()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );

            let results = Backtester::new(engine_config, calendar)?.run(&ticks)?;
            println!("{}", results);

            if !results.rollovers.is_empty() {
                println!("\n--- Rollovers ---");
                for roll in &results.rollovers {
                    println!(
                        "  {} (expiry {}) | {} -> {} | {} contracts | P&L: {:.2} | Fee: {:.2}",
                        roll.date,
                        roll.expiry,
                        roll.front_price,
                        roll.back_price,
                        roll.contracts,
                        roll.pnl,
                        roll.fee
                    );
                }
            }

            if let Some(path) = export {
                let json = serde_json::to_string_pretty(&results).context("Failed to encode results")?;
                fs::write(&path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("\nResults written to {}", path.display());
            }

            if !no_save {
                let db = Database::new(&cli.database).await?;
                let run_id = db.save_run(&results).await?;
                println!("\nSaved run: {}", run_id);
            }
        }

        Commands::Config { config } => {
            let config = EngineConfig::load(config.as_deref())?;
            config.validate()?;

            println!("\n=== Engine Configuration ===\n");
            println!("Capital:");
            println!("  Initial Capital:      {}", config.initial_capital);
            println!("  Margin Fraction:      {}%", config.margin_fraction * dec!(100));
            println!("  Contract Multiplier:  {}", config.contract_multiplier);
            println!("  Fee Per Contract:     {}", config.fee_per_contract);
            println!("\nQuoting:");
            println!("  Tick Step:            {}", config.tick_step);
            println!("  Quote Skew:           {}", config.quote_skew);
            println!("  Refresh Interval:     {}s", config.quote_refresh_interval_secs);
            println!("\nInventory:");
            println!("  Mode:                 {}", config.inventory_mode);
        }

        Commands::Calendar { from, to } => {
            if to < from {
                anyhow::bail!("--to ({}) is before --from ({})", to, from);
            }
            let calendar = ExpiryCalendar::third_thursdays(from, to);

            println!("\n=== Expiry Calendar {} to {} ===", from, to);
            for expiry in calendar.pending() {
                println!("  {}  {}", expiry, expiry.format("%a"));
            }
            println!("\n{} expiries", calendar.len());
        }

        Commands::Runs { limit } => {
            let db = Database::new(&cli.database).await?;
            let runs = db.list_runs(limit).await?;
            if runs.is_empty() {
                println!("No saved runs. Use 'mmsim run --ticks <file>' to create one.");
                return Ok(());
            }

            println!(
                "\n{:<38} {:<20} {:<9} {:<23} {:>14} {:>9}",
                "RUN", "CREATED", "MODE", "PERIOD", "FINAL", "RETURN"
            );
            println!("{}", "-".repeat(118));

            for run in runs {
                let period = match (&run.start_date, &run.end_date) {
                    (Some(start), Some(end)) => format!("{}..{}", start, end),
                    _ => "-".to_string(),
                };
                let final_equity: Decimal = run
                    .final_equity
                    .parse()
                    .with_context(|| format!("Corrupt final_equity for run {}", run.id))?;
                println!(
                    "{:<38} {:<20} {:<9} {:<23} {:>14.2} {:>8.2}%",
                    run.id,
                    truncate(&run.created_at, 19),
                    run.mode,
                    period,
                    final_equity,
                    run.total_return_pct()?
                );
            }
        }

        Commands::Show { run_id, orders } => {
            let db = Database::new(&cli.database).await?;
            let run = db
                .get_run(&run_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Run not found: {}", run_id))?;

            println!("\n=== Run: {} ===", run.id);
            println!("Created:     {}", run.created_at);
            println!("Mode:        {}", run.mode);
            println!("Initial:     {}", run.initial_capital);
            println!("Final:       {}", run.final_equity);
            println!("Return:      {:.2}%", run.total_return_pct()?);
            println!("Fees Paid:   {}", run.total_fees);
            println!("Days:        {}", run.trading_days);
            println!("Ticks:       {}", run.ticks);
            println!("Fills:       {}", run.fills);
            println!("Trims:       {}", run.trims);
            println!("Rollovers:   {}", run.rollovers);

            let config: EngineConfig = serde_json::from_str(&run.config)
                .with_context(|| format!("Corrupt config for run {}", run.id))?;
            println!(
                "Config:      step {} | skew {} | refresh {}s | fee {} | x{} | margin {}",
                config.tick_step,
                config.quote_skew,
                config.quote_refresh_interval_secs,
                config.fee_per_contract,
                config.contract_multiplier,
                config.margin_fraction
            );

            let equity = db.get_equity(&run.id).await?;
            println!("\n--- Daily Equity ({} days) ---", equity.len());
            println!(
                "{:<12} {:>12} {:>14} {:>16} {:>10} {:>6} {:>8} {:>7}",
                "DATE", "CLOSE", "P&L", "EQUITY", "RETURN", "NET", "MATCHED", "ROLLED"
            );
            for row in &equity {
                let ret: Decimal = row
                    .daily_return
                    .parse()
                    .with_context(|| format!("Corrupt daily_return on {}", row.date))?;
                println!(
                    "{:<12} {:>12} {:>14} {:>16} {:>9.3}% {:>6} {:>8} {:>7}",
                    row.date,
                    row.close,
                    row.realized_pnl,
                    row.equity,
                    ret * dec!(100),
                    row.net_inventory,
                    row.matched,
                    if row.rolled { "yes" } else { "" }
                );
            }

            if orders > 0 {
                let total = db.get_order_count(&run.id).await?;
                let log = db.get_order_log(&run.id, Some(orders)).await?;
                println!("\n--- Order Log ({} of {}) ---", log.len(), total);
                for entry in log {
                    println!(
                        "  {} {:<10} {:<6} {:>12} {}",
                        truncate(&entry.timestamp, 23),
                        truncate(&entry.ticker, 10),
                        entry.side,
                        entry.price,
                        entry.status
                    );
                }
            }
        }
    }

    Ok(())
}

/// Truncate a string to max length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
