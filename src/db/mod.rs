//! Database persistence for backtest runs.
//!
//! Stores everything needed to inspect a run after the process exits:
//! - Run summary and the configuration it used
//! - Daily equity, returns and net inventory
//! - The full order log
//!
//! Decimal values are stored as text so they round-trip exactly.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use uuid::Uuid;

use crate::backtest::BacktestResults;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Database connection pool.
pub struct Database {
    pool: SqlitePool,
}

/// Stored run summary.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredRun {
    pub id: String,
    pub created_at: String,
    pub mode: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub initial_capital: String,
    pub final_equity: String,
    pub total_return: String,
    pub total_fees: String,
    pub trading_days: i64,
    pub ticks: i64,
    pub fills: i64,
    pub trims: i64,
    pub rollovers: i64,
    /// Engine configuration as JSON
    pub config: String,
}

impl StoredRun {
    /// Total return in percent.
    pub fn total_return_pct(&self) -> Result<Decimal> {
        let ret: Decimal = self
            .total_return
            .parse()
            .with_context(|| format!("Corrupt total_return for run {}", self.id))?;
        Ok(ret * dec!(100))
    }
}

/// Stored settled day.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredEquityRow {
    pub date: String,
    pub close: String,
    pub realized_pnl: String,
    pub equity: String,
    pub daily_return: String,
    pub net_inventory: i64,
    pub matched: i64,
    pub rolled: bool,
}

/// Stored order log entry.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredOrder {
    pub timestamp: String,
    pub ticker: String,
    pub price: String,
    pub side: String,
    pub status: String,
}

impl Database {
    /// Create a new database connection.
    pub async fn new(database_url: &str) -> Result<Self> {
        // Every connection to `:memory:` opens its own empty database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run all database migrations.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS backtest_runs (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                mode TEXT NOT NULL,
                start_date TEXT,
                end_date TEXT,
                initial_capital TEXT NOT NULL,
                final_equity TEXT NOT NULL,
                total_return TEXT NOT NULL,
                total_fees TEXT NOT NULL,
                trading_days INTEGER NOT NULL,
                ticks INTEGER NOT NULL,
                fills INTEGER NOT NULL,
                trims INTEGER NOT NULL,
                rollovers INTEGER NOT NULL,
                config TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_equity (
                run_id TEXT NOT NULL,
                day_index INTEGER NOT NULL,
                date TEXT NOT NULL,
                close TEXT NOT NULL,
                realized_pnl TEXT NOT NULL,
                equity TEXT NOT NULL,
                daily_return TEXT NOT NULL,
                net_inventory INTEGER NOT NULL,
                matched INTEGER NOT NULL,
                rolled INTEGER NOT NULL,
                PRIMARY KEY (run_id, day_index),
                FOREIGN KEY (run_id) REFERENCES backtest_runs(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS order_log (
                run_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                ticker TEXT NOT NULL,
                price TEXT NOT NULL,
                side TEXT NOT NULL,
                status TEXT NOT NULL,
                PRIMARY KEY (run_id, seq),
                FOREIGN KEY (run_id) REFERENCES backtest_runs(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_backtest_runs_created ON backtest_runs(created_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ==================== Runs ====================

    /// Save a finished run in one transaction. Returns the new run id.
    pub async fn save_run(&self, results: &BacktestResults) -> Result<String> {
        let run_id = Uuid::new_v4().to_string();
        let config = serde_json::to_string(&results.config).context("Failed to encode config")?;

        let mut tx = self.pool.begin().await.context("Failed to open transaction")?;

        sqlx::query(
            r#"
            INSERT INTO backtest_runs (
                id, mode, start_date, end_date, initial_capital, final_equity,
                total_return, total_fees, trading_days, ticks, fills, trims, rollovers, config
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run_id)
        .bind(results.config.inventory_mode.as_str())
        .bind(results.start_date.map(|d| d.to_string()))
        .bind(results.end_date.map(|d| d.to_string()))
        .bind(results.initial_capital.to_string())
        .bind(results.final_equity.to_string())
        .bind(results.total_return.to_string())
        .bind(results.total_fees.to_string())
        .bind(count(results.trading_days()))
        .bind(count(results.ticks_processed))
        .bind(count(results.fills.len()))
        .bind(count(results.trims.len()))
        .bind(count(results.rollovers.len()))
        .bind(config)
        .execute(&mut *tx)
        .await
        .context("Failed to insert run")?;

        for (idx, report) in results.reports.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO daily_equity (
                    run_id, day_index, date, close, realized_pnl, equity,
                    daily_return, net_inventory, matched, rolled
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&run_id)
            .bind(count(idx))
            .bind(report.date.to_string())
            .bind(report.close.to_string())
            .bind(report.realized_pnl.to_string())
            .bind(report.equity.to_string())
            .bind(report.daily_return.to_string())
            .bind(report.net_inventory)
            .bind(i64::from(report.matched))
            .bind(report.rolled)
            .execute(&mut *tx)
            .await
            .context("Failed to insert daily equity")?;
        }

        for (seq, entry) in results.order_log.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_log (run_id, seq, timestamp, ticker, price, side, status)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&run_id)
            .bind(count(seq))
            .bind(entry.timestamp.format(TIMESTAMP_FORMAT).to_string())
            .bind(&entry.ticker)
            .bind(entry.price.to_string())
            .bind(entry.side.as_str())
            .bind(entry.status.as_str())
            .execute(&mut *tx)
            .await
            .context("Failed to insert order log")?;
        }

        tx.commit().await.context("Failed to commit run")?;
        Ok(run_id)
    }

    /// Most recent runs first.
    pub async fn list_runs(&self, limit: i64) -> Result<Vec<StoredRun>> {
        sqlx::query_as::<_, StoredRun>(
            "SELECT * FROM backtest_runs ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch runs")
    }

    /// Get one run by id.
    pub async fn get_run(&self, run_id: &str) -> Result<Option<StoredRun>> {
        sqlx::query_as::<_, StoredRun>("SELECT * FROM backtest_runs WHERE id = ?")
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch run")
    }

    // ==================== Equity ====================

    /// Settled days of a run in date order.
    pub async fn get_equity(&self, run_id: &str) -> Result<Vec<StoredEquityRow>> {
        sqlx::query_as::<_, StoredEquityRow>(
            r#"
            SELECT date, close, realized_pnl, equity, daily_return, net_inventory, matched, rolled
            FROM daily_equity WHERE run_id = ? ORDER BY day_index
            "#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch daily equity")
    }

    // ==================== Orders ====================

    /// Order log of a run in emission order, optionally truncated.
    pub async fn get_order_log(&self, run_id: &str, limit: Option<i64>) -> Result<Vec<StoredOrder>> {
        // SQLite treats a negative LIMIT as unbounded
        sqlx::query_as::<_, StoredOrder>(
            r#"
            SELECT timestamp, ticker, price, side, status
            FROM order_log WHERE run_id = ? ORDER BY seq LIMIT ?
            "#,
        )
        .bind(run_id)
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch order log")
    }

    /// Number of order log entries stored for a run.
    pub async fn get_order_count(&self, run_id: &str) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM order_log WHERE run_id = ?")
            .bind(run_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::Backtester;
    use crate::models::{ExpiryCalendar, Tick};
    use crate::trading::EngineConfig;
    use chrono::NaiveDate;

    fn tick(d: u32, secs: u32, price: Decimal) -> Tick {
        let date = NaiveDate::from_ymd_opt(2024, 2, d).unwrap();
        Tick {
            timestamp: date.and_hms_opt(9, 0, secs).unwrap(),
            date,
            ticker: "VN30F2402".to_string(),
            back_ticker: None,
            front_price: Some(price),
            front_close: Some(dec!(1201.5)),
            back_price: None,
            back_close: None,
        }
    }

    fn results() -> BacktestResults {
        let ticks = vec![
            tick(5, 0, dec!(1200)),
            tick(5, 10, dec!(1198)),
            tick(6, 0, dec!(1203)),
            tick(6, 20, dec!(1205.1)),
        ];
        let config = EngineConfig {
            initial_capital: dec!(250000),
            ..Default::default()
        };
        Backtester::new(config, ExpiryCalendar::default())
            .unwrap()
            .run(&ticks)
            .unwrap()
    }

    #[tokio::test]
    async fn test_save_and_load_run() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let results = results();

        let run_id = db.save_run(&results).await.unwrap();
        let run = db.get_run(&run_id).await.unwrap().unwrap();

        assert_eq!(run.mode, "two_lane");
        assert_eq!(run.start_date.as_deref(), Some("2024-02-05"));
        assert_eq!(run.final_equity.parse::<Decimal>().unwrap(), results.final_equity);
        assert_eq!(run.trading_days, 2);
        assert_eq!(run.fills, i64::try_from(results.fills.len()).unwrap());

        let config: EngineConfig = serde_json::from_str(&run.config).unwrap();
        assert_eq!(config, results.config);
    }

    #[tokio::test]
    async fn test_equity_rows_round_trip_exactly() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let results = results();
        let run_id = db.save_run(&results).await.unwrap();

        let rows = db.get_equity(&run_id).await.unwrap();
        assert_eq!(rows.len(), results.reports.len());
        for (row, report) in rows.iter().zip(&results.reports) {
            assert_eq!(row.equity.parse::<Decimal>().unwrap(), report.equity);
            assert_eq!(row.daily_return.parse::<Decimal>().unwrap(), report.daily_return);
            assert_eq!(row.realized_pnl.parse::<Decimal>().unwrap(), report.realized_pnl);
            assert_eq!(row.net_inventory, report.net_inventory);
        }
    }

    #[tokio::test]
    async fn test_order_log_limit() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let results = results();
        let run_id = db.save_run(&results).await.unwrap();

        let all = db.get_order_log(&run_id, None).await.unwrap();
        assert_eq!(all.len(), results.order_log.len());
        assert_eq!(db.get_order_count(&run_id).await.unwrap(), i64::try_from(all.len()).unwrap());
        assert_eq!(all[0].status, "PLACED");
        assert_eq!(all[0].side, "LONG");

        let first_two = db.get_order_log(&run_id, Some(2)).await.unwrap();
        assert_eq!(first_two.len(), 2);
        assert_eq!(first_two[1].timestamp, all[1].timestamp);
        assert_eq!(first_two[1].price, all[1].price);
    }

    #[tokio::test]
    async fn test_list_runs_and_missing_run() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let first = db.save_run(&results()).await.unwrap();
        let second = db.save_run(&results()).await.unwrap();
        assert_ne!(first, second);

        let runs = db.list_runs(10).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(db.list_runs(1).await.unwrap().len(), 1);
        assert!(db.get_run("no-such-run").await.unwrap().is_none());
        assert!(runs[0].total_return_pct().is_ok());
    }
}
