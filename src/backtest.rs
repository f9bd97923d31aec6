//! Backtesting engine: replays aligned ticks through the market-making loop.
//!
//! Per tick, in order:
//! - rollover check (front month into back month ahead of an expiry)
//! - forced deleveraging at the current trade price
//! - fill matching against the standing quote
//! - quote refresh
//! - settlement, on the last tick of a trading date
//!
//! The loop is single-threaded and deterministic: the same ticks, calendar
//! and configuration always reproduce the same fills and equity curve.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::models::{
    EquitySeries, ExpiryCalendar, Fill, FillAction, OrderLogEntry, PositionState, PriceSeries,
    Session, Tick,
};
use crate::trading::{
    new_book, DailyReport, DailySettlement, EngineConfig, ForcedDeleveraging, ForcedTrim,
    Inventory, MatchingSimulator, PositionLedger, QuoteEngine, RiskSizer, RolloverEvent,
    RolloverHandler,
};

/// Backtest results summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BacktestResults {
    /// Configuration the run used
    pub config: EngineConfig,

    /// First and last trading dates
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,

    pub initial_capital: Decimal,
    pub final_equity: Decimal,

    /// Fractional return over the run
    pub total_return: Decimal,

    /// Fees charged on fills, trims and rolls
    pub total_fees: Decimal,

    pub ticks_processed: usize,

    /// Book at the end of the run
    pub final_state: PositionState,
    pub final_net_inventory: i64,

    /// Equity, returns, dates and net inventory per settled day
    pub equity: EquitySeries,

    pub reports: Vec<DailyReport>,
    pub order_log: Vec<OrderLogEntry>,
    pub fills: Vec<Fill>,
    pub trims: Vec<ForcedTrim>,
    pub rollovers: Vec<RolloverEvent>,
}

impl BacktestResults {
    pub fn trading_days(&self) -> usize {
        self.equity.trading_days()
    }

    pub fn unwinds(&self) -> usize {
        self.fills
            .iter()
            .filter(|f| f.action == FillAction::Unwind)
            .count()
    }

    /// Worst daily return and its date, if any day settled.
    pub fn worst_day(&self) -> Option<(NaiveDate, Decimal)> {
        self.daily_returns().min_by_key(|&(_, ret)| ret)
    }

    /// Best daily return and its date, if any day settled.
    pub fn best_day(&self) -> Option<(NaiveDate, Decimal)> {
        self.daily_returns().max_by_key(|&(_, ret)| ret)
    }

    /// Highest equity on the curve, the initial capital included.
    pub fn peak_equity(&self) -> Decimal {
        self.equity
            .equity()
            .iter()
            .copied()
            .max()
            .unwrap_or(self.initial_capital)
    }

    /// Largest absolute net inventory carried over a close.
    pub fn max_net_inventory(&self) -> i64 {
        self.equity
            .net_inventory()
            .iter()
            .map(|n| n.abs())
            .max()
            .unwrap_or(0)
    }

    fn daily_returns(&self) -> impl Iterator<Item = (NaiveDate, Decimal)> + '_ {
        self.equity
            .dates()
            .iter()
            .copied()
            .zip(self.equity.returns().iter().copied())
    }
}

impl std::fmt::Display for BacktestResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n{:=^60}", " BACKTEST RESULTS ")?;
        writeln!(f)?;
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => writeln!(f, "Period: {} to {} ({} days)", start, end, self.trading_days())?,
            _ => writeln!(f, "Period: no trading days")?,
        }
        writeln!(f, "Mode:   {}", self.config.inventory_mode)?;
        writeln!(f)?;
        writeln!(f, "--- Capital ---")?;
        writeln!(f, "Initial:     {:.2}", self.initial_capital)?;
        writeln!(f, "Final:       {:.2}", self.final_equity)?;
        writeln!(f, "Return:      {:.2}%", self.total_return * dec!(100))?;
        writeln!(f, "Peak:        {:.2}", self.peak_equity())?;
        writeln!(f, "Fees Paid:   {:.2}", self.total_fees)?;
        writeln!(f)?;
        writeln!(f, "--- Activity ---")?;
        writeln!(f, "Ticks:       {}", self.ticks_processed)?;
        writeln!(f, "Fills:       {} ({} unwinds)", self.fills.len(), self.unwinds())?;
        writeln!(f, "Orders:      {}", self.order_log.len())?;
        writeln!(f, "Trims:       {}", self.trims.len())?;
        writeln!(f, "Rollovers:   {}", self.rollovers.len())?;
        writeln!(f)?;
        writeln!(f, "--- Daily ---")?;
        if let Some((date, ret)) = self.best_day() {
            writeln!(f, "Best Day:    {} ({:.3}%)", date, ret * dec!(100))?;
        }
        if let Some((date, ret)) = self.worst_day() {
            writeln!(f, "Worst Day:   {} ({:.3}%)", date, ret * dec!(100))?;
        }
        writeln!(f, "Max Net:     {}", self.max_net_inventory())?;
        writeln!(f, "Final Book:  {} (net {})", self.final_state, self.final_net_inventory)?;
        writeln!(f, "{:=^60}", "")?;
        Ok(())
    }
}

/// Backtesting engine.
pub struct Backtester {
    config: EngineConfig,
    ledger: PositionLedger,
    quote_engine: QuoteEngine,
    matcher: MatchingSimulator,
    deleverager: ForcedDeleveraging,
    rollover: RolloverHandler,
    settlement: DailySettlement,
    equity: EquitySeries,
    session: Session,
    order_log: Vec<OrderLogEntry>,
    fills: Vec<Fill>,
    trims: Vec<ForcedTrim>,
    reports: Vec<DailyReport>,
}

impl Backtester {
    /// Create a backtester starting flat, with the book selected by the
    /// configured inventory mode.
    pub fn new(config: EngineConfig, calendar: ExpiryCalendar) -> EngineResult<Self> {
        let book = new_book(config.inventory_mode);
        Self::with_book(config, calendar, book)
    }

    /// Create a backtester carrying an existing book into the run.
    pub fn with_book(
        config: EngineConfig,
        calendar: ExpiryCalendar,
        book: Box<dyn Inventory>,
    ) -> EngineResult<Self> {
        config.validate()?;
        if book.mode() != config.inventory_mode {
            return Err(EngineError::config(
                "inventory_mode",
                format!("book is {} but config selects {}", book.mode(), config.inventory_mode),
            ));
        }

        Ok(Self {
            ledger: PositionLedger::new(book, &config),
            deleverager: ForcedDeleveraging::new(RiskSizer::new(&config)),
            quote_engine: QuoteEngine::new(&config),
            matcher: MatchingSimulator::new(),
            rollover: RolloverHandler::new(calendar),
            settlement: DailySettlement::new(),
            equity: EquitySeries::new(config.initial_capital),
            session: Session::default(),
            order_log: Vec::new(),
            fills: Vec::new(),
            trims: Vec::new(),
            reports: Vec::new(),
            config,
        })
    }

    /// Run the simulation over `ticks`, which must be non-decreasing by
    /// `(date, timestamp)`.
    pub fn run(mut self, ticks: &[Tick]) -> EngineResult<BacktestResults> {
        if let Some(pos) = ticks
            .windows(2)
            .position(|w| w[1].order_key() < w[0].order_key())
        {
            return Err(EngineError::UnorderedInput { index: pos + 1 });
        }

        let trading_dates = trading_dates(ticks);
        if let Some(&first) = trading_dates.first() {
            let stale = self.rollover.align_to(first);
            if !stale.is_empty() {
                warn!(count = stale.len(), first_date = %first, "Ignoring expiries before the first trading date");
            }
        }

        info!(
            ticks = ticks.len(),
            days = trading_dates.len(),
            expiries = self.rollover.calendar().pending().count(),
            mode = %self.config.inventory_mode,
            capital = %self.config.initial_capital,
            "Starting backtest"
        );

        let mut day_idx = 0;
        for (i, tick) in ticks.iter().enumerate() {
            if trading_dates[day_idx] != tick.date {
                day_idx += 1;
            }
            let next_date = trading_dates.get(day_idx + 1).copied();
            let end_of_day = ticks.get(i + 1).map_or(true, |next| next.date != tick.date);

            self.process_tick(tick, next_date, end_of_day)?;
        }

        Ok(self.finish(ticks.len(), &trading_dates))
    }

    fn process_tick(
        &mut self,
        tick: &Tick,
        next_date: Option<NaiveDate>,
        end_of_day: bool,
    ) -> EngineResult<()> {
        if self.rollover.is_due(tick.date, next_date) {
            let front = tick.price(PriceSeries::Front)?;
            let back = tick.price(PriceSeries::Back)?;
            self.rollover.roll(tick.date, front, back, &mut self.ledger)?;
            self.session.series = PriceSeries::Back;
            // Standing quotes were priced off the front month
            self.session.quotes = Default::default();

            // More than one expiry inside a gap: the next one rolls a day late
            if let (Some(next), Some(expiry)) = (next_date, self.rollover.calendar().peek()) {
                if next >= expiry {
                    warn!(date = %tick.date, %expiry, next_date = %next, "Expiry overtaken by a data gap, rolling on the next trading date");
                }
            }
        }

        let series = self.session.series;
        let price = tick.price(series)?;
        let ticker = tick.ticker_for(series);

        let (ceilings, trims) =
            self.deleverager
                .run(self.equity.last(), price, tick.timestamp, &mut self.ledger)?;
        debug_assert!(ceilings.is_solvent());
        self.trims.extend(trims);

        let (delta, fills) = self.matcher.match_tick(
            &self.session.quotes,
            price,
            tick.timestamp,
            ticker,
            ceilings,
            &mut self.ledger,
        )?;
        for fill in fills {
            if fill.action == FillAction::Unwind {
                self.session.unwound += 1;
            }
            self.order_log.push(OrderLogEntry::filled(&fill));
            self.fills.push(fill);
        }
        self.session.matched += delta.count();

        let placed = self.quote_engine.refresh(
            &mut self.session.quotes,
            price,
            tick.timestamp,
            delta,
            self.ledger.long_qty(),
            self.ledger.short_qty(),
        );
        if !placed.is_empty() {
            debug!(
                timestamp = %tick.timestamp,
                reference = %price,
                bid = ?self.session.quotes.bid,
                ask = ?self.session.quotes.ask,
                sides = placed.len(),
                "Quote refreshed"
            );
        }
        for (side, quote) in placed {
            self.order_log
                .push(OrderLogEntry::placed(tick.timestamp, ticker, quote, side));
        }

        if end_of_day {
            let close = tick.close(series)?;
            let report = self.settlement.settle(
                tick.date,
                close,
                &mut self.ledger,
                &mut self.equity,
                &mut self.session,
            )?;
            self.reports.push(report);
        }

        Ok(())
    }

    fn finish(self, ticks_processed: usize, trading_dates: &[NaiveDate]) -> BacktestResults {
        let final_equity = self.equity.last();
        let total_return = self.equity.total_return();

        info!(
            days = self.equity.trading_days(),
            fills = self.fills.len(),
            trims = self.trims.len(),
            rollovers = self.rollover.events().len(),
            final_equity = %final_equity,
            "Backtest complete"
        );

        BacktestResults {
            start_date: trading_dates.first().copied(),
            end_date: trading_dates.last().copied(),
            initial_capital: self.equity.initial(),
            final_equity,
            total_return,
            total_fees: self.ledger.lifetime_fees(),
            ticks_processed,
            final_state: self.ledger.state(),
            final_net_inventory: self.ledger.net_qty(),
            equity: self.equity,
            reports: self.reports,
            order_log: self.order_log,
            fills: self.fills,
            trims: self.trims,
            rollovers: self.rollover.into_events(),
            config: self.config,
        }
    }
}

/// Distinct trading dates in tick order.
fn trading_dates(ticks: &[Tick]) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = Vec::new();
    for tick in ticks {
        if dates.last() != Some(&tick.date) {
            dates.push(tick.date);
        }
    }
    dates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Lane, OrderStatus, Side};
    use crate::trading::{InventoryMode, NetBook, TwoLaneBook};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn tick(d: u32, secs: u32, price: Decimal, close: Decimal) -> Tick {
        Tick {
            timestamp: day(d).and_hms_opt(9, 0, 0).unwrap() + chrono::Duration::seconds(secs.into()),
            date: day(d),
            ticker: "VN30F2401".to_string(),
            back_ticker: Some("VN30F2402".to_string()),
            front_price: Some(price),
            front_close: Some(close),
            back_price: Some(price + Decimal::ONE),
            back_close: Some(close + Decimal::ONE),
        }
    }

    fn quiet_config() -> EngineConfig {
        EngineConfig {
            initial_capital: dec!(100000),
            tick_step: Decimal::ONE,
            quote_refresh_interval_secs: 86_400,
            fee_per_contract: dec!(1.5),
            contract_multiplier: 100,
            margin_fraction: dec!(0.1),
            ..Default::default()
        }
    }

    fn run(config: EngineConfig, ticks: &[Tick]) -> EngineResult<BacktestResults> {
        Backtester::new(config, ExpiryCalendar::default())?.run(ticks)
    }

    #[test]
    fn test_flat_day_with_one_forced_trim() {
        let cfg = EngineConfig {
            fee_per_contract: dec!(5),
            margin_fraction: Decimal::ONE,
            ..quiet_config()
        };
        // Room at 400 is 100000 / 40000 = 2 against a seeded 3 long
        let book = TwoLaneBook::from_lanes(Lane::new(3, dec!(400)), Lane::default());
        let ticks = vec![
            tick(2, 0, dec!(400), dec!(400)),
            tick(2, 5, dec!(400), dec!(400)),
        ];

        let results = Backtester::with_book(cfg, ExpiryCalendar::default(), Box::new(book))
            .unwrap()
            .run(&ticks)
            .unwrap();

        assert!(results.fills.is_empty());
        assert_eq!(results.trims.len(), 1);
        assert_eq!(results.final_equity, dec!(99995));
        assert_eq!(results.final_net_inventory, 2);
        assert_eq!(results.total_fees, dec!(5));
    }

    #[test]
    fn test_single_fill_day() {
        let ticks = vec![
            tick(2, 0, dec!(101), dec!(102)),
            tick(2, 5, dec!(100), dec!(102)),
        ];
        let results = run(quiet_config(), &ticks).unwrap();

        assert_eq!(results.fills.len(), 1);
        assert_eq!(results.fills[0].side, Side::Long);
        assert_eq!(results.fills[0].price, dec!(100));
        assert_eq!(results.reports[0].realized_pnl, dec!(198.5));
        assert_eq!(results.final_equity, dec!(100198.5));

        // Both sides placed, the bid filled, then only the bid re-quoted
        let log: Vec<_> = results
            .order_log
            .iter()
            .map(|e| (e.side, e.price, e.status))
            .collect();
        assert_eq!(
            log,
            vec![
                (Side::Long, dec!(100), OrderStatus::Placed),
                (Side::Short, dec!(102), OrderStatus::Placed),
                (Side::Long, dec!(100), OrderStatus::Filled),
                (Side::Long, dec!(98), OrderStatus::Placed),
            ]
        );
    }

    #[test]
    fn test_rollover_moves_basis_to_back_month() {
        let cfg = EngineConfig {
            fee_per_contract: dec!(2),
            tick_step: dec!(1.8),
            ..quiet_config()
        };
        let book = TwoLaneBook::from_lanes(Lane::new(1, dec!(101)), Lane::default());
        let calendar = ExpiryCalendar::new(vec![day(18)]).unwrap();

        // Front 100, back 101 on the roll day
        let ticks = vec![
            tick(17, 0, dec!(100), dec!(100)),
            tick(17, 5, dec!(100.5), dec!(100)),
            tick(18, 0, dec!(101.2), dec!(101)),
        ];

        let results = Backtester::with_book(cfg, calendar, Box::new(book))
            .unwrap()
            .run(&ticks)
            .unwrap();

        assert_eq!(results.rollovers.len(), 1);
        let roll = &results.rollovers[0];
        assert_eq!(roll.date, day(17));
        assert_eq!(roll.expiry, day(18));
        assert_eq!((roll.front_price, roll.back_price), (dec!(100), dec!(101)));
        // |100 - 101| * 100 plus one roll fee
        assert_eq!(roll.pnl, dec!(-100));
        assert_eq!(roll.fee, dec!(2));

        let first = &results.reports[0];
        assert!(first.rolled);
        // Marked at the back-month close (101), where the basis now sits
        assert_eq!(first.close, dec!(101));
        assert_eq!(first.mark_pnl, Decimal::ZERO);
        assert_eq!(first.realized_pnl, dec!(-102));
        assert!(!results.reports[1].rolled);

        // Log entries after the roll carry the back-month ticker
        assert!(results.order_log.iter().all(|e| e.timestamp.date() != day(17) || e.ticker == "VN30F2402"));
    }

    #[test]
    fn test_determinism() {
        let prices = [
            dec!(100), dec!(98.5), dec!(101), dec!(103), dec!(99), dec!(97), dec!(100.2),
        ];
        let mut ticks = Vec::new();
        for d in [16, 17, 18, 19] {
            for (i, p) in prices.iter().enumerate() {
                let secs = u32::try_from(i).unwrap() * 20;
                ticks.push(tick(d, secs, *p + Decimal::from(d), dec!(117)));
            }
        }
        let cfg = EngineConfig {
            quote_refresh_interval_secs: 30,
            ..quiet_config()
        };
        let calendar = || ExpiryCalendar::new(vec![day(18)]).unwrap();

        let first = Backtester::new(cfg.clone(), calendar()).unwrap().run(&ticks).unwrap();
        let second = Backtester::new(cfg, calendar()).unwrap().run(&ticks).unwrap();

        assert_eq!(first, second);
        assert!(!first.fills.is_empty());
        assert_eq!(first.rollovers.len(), 1);
    }

    #[test]
    fn test_equity_series_invariants() {
        let mut ticks = Vec::new();
        for d in 2..7 {
            ticks.push(tick(d, 0, dec!(100), dec!(100)));
            ticks.push(tick(d, 20, dec!(98), dec!(100)));
            ticks.push(tick(d, 40, dec!(103), dec!(100)));
        }
        let results = run(quiet_config(), &ticks).unwrap();

        let equity = results.equity.equity();
        assert_eq!(equity.len(), 5 + 1);
        for (t, r) in results.equity.returns().iter().enumerate() {
            assert_eq!(*r, equity[t + 1] / equity[t] - Decimal::ONE);
        }
        assert_eq!(results.reports.len(), 5);
        assert_eq!(results.equity.dates().first(), Some(&day(2)));
    }

    #[test]
    fn test_one_roll_per_calendar_entry() {
        let mut ticks = Vec::new();
        for d in 15..=26 {
            ticks.push(tick(d, 0, dec!(100), dec!(100)));
            ticks.push(tick(d, 30, dec!(100), dec!(100)));
        }
        // The first entry predates the data and is ignored; the last is
        // never reached because the final day cannot roll
        let calendar = ExpiryCalendar::new(vec![day(10), day(18), day(25), day(26), day(27)]).unwrap();

        let results = Backtester::new(quiet_config(), calendar).unwrap().run(&ticks).unwrap();
        let rolls: Vec<_> = results.rollovers.iter().map(|r| (r.date, r.expiry)).collect();
        assert_eq!(
            rolls,
            vec![(day(17), day(18)), (day(24), day(25)), (day(25), day(26))]
        );
    }

    #[test]
    fn test_gap_over_two_expiries_rolls_on_consecutive_days() {
        let mut ticks = Vec::new();
        for d in [15, 16, 29, 30] {
            ticks.push(tick(d, 0, dec!(100), dec!(100)));
            ticks.push(tick(d, 30, dec!(100), dec!(100)));
        }
        let calendar = ExpiryCalendar::new(vec![day(18), day(25)]).unwrap();

        let results = Backtester::new(quiet_config(), calendar).unwrap().run(&ticks).unwrap();
        let rolls: Vec<_> = results.rollovers.iter().map(|r| (r.date, r.expiry)).collect();

        // Still one roll per entry, never two on one date
        assert_eq!(rolls, vec![(day(16), day(18)), (day(29), day(25))]);
        let rolled: Vec<_> = results.reports.iter().map(|r| r.rolled).collect();
        assert_eq!(rolled, vec![false, true, true, false]);
    }

    #[test]
    fn test_ceilings_non_negative_after_every_forced_trim() {
        let cfg = EngineConfig {
            tick_step: dec!(5),
            ..quiet_config()
        };
        // 30 long at 300 with 10% margin leaves 3 contracts of headroom
        let seeded = || TwoLaneBook::from_lanes(Lane::new(30, dec!(300)), Lane::default());

        let mut ticks = Vec::new();
        let days: [(u32, [i64; 3]); 4] = [
            (2, [300, 296, 292]),
            (3, [285, 281, 277]),
            (4, [270, 266, 262]),
            (5, [255, 251, 247]),
        ];
        for (d, prices) in days {
            let close = Decimal::from(prices[2]);
            for (i, p) in prices.into_iter().enumerate() {
                ticks.push(tick(d, u32::try_from(i).unwrap() * 10, Decimal::from(p), close));
            }
        }

        let results = Backtester::with_book(cfg.clone(), ExpiryCalendar::default(), Box::new(seeded()))
            .unwrap()
            .run(&ticks)
            .unwrap();

        assert!(results.fills.is_empty());
        assert_eq!(results.trims.len(), 5 + 17 + 6);
        assert_eq!(results.final_net_inventory, 2);

        // Replay the margin calls on their own and check solvency after each tick's trims
        let sizer = RiskSizer::new(&cfg);
        let deleverager = ForcedDeleveraging::new(sizer.clone());
        let mut ledger = PositionLedger::new(Box::new(seeded()), &cfg);
        let mut equity = EquitySeries::new(cfg.initial_capital);
        let mut session = Session::default();
        let mut trims = Vec::new();

        for (i, t) in ticks.iter().enumerate() {
            let price = t.front_price.unwrap();
            let (ceilings, trimmed) = deleverager
                .run(equity.last(), price, t.timestamp, &mut ledger)
                .unwrap();
            let after = sizer.ceilings(equity.last(), &ledger, price, t.timestamp).unwrap();

            assert_eq!(ceilings, after);
            assert!(after.long >= 0 && after.short >= 0, "{} left {:?}", t.timestamp, after);
            trims.extend(trimmed);

            if ticks.get(i + 1).map_or(true, |next| next.date != t.date) {
                DailySettlement::new()
                    .settle(t.date, t.front_close.unwrap(), &mut ledger, &mut equity, &mut session)
                    .unwrap();
            }
        }

        assert_eq!(trims, results.trims);
        assert_eq!(equity, results.equity);
        let mut trim_days: Vec<_> = trims.iter().map(|t| t.timestamp.date()).collect();
        trim_days.dedup();
        assert_eq!(trim_days, vec![day(3), day(4), day(5)]);
    }

    #[test]
    fn test_missing_price_is_data_gap() {
        let mut gap = tick(2, 5, dec!(100), dec!(100));
        gap.front_price = None;
        let ticks = vec![tick(2, 0, dec!(100), dec!(100)), gap];

        assert!(matches!(
            run(quiet_config(), &ticks),
            Err(EngineError::DataGap { field: "front_price", .. })
        ));
    }

    #[test]
    fn test_missing_close_is_data_gap() {
        let mut last = tick(2, 5, dec!(100), dec!(100));
        last.front_close = None;
        // Close is only required on the day's last tick
        let mut first = tick(2, 0, dec!(100), dec!(100));
        first.front_close = None;

        assert!(matches!(
            run(quiet_config(), &[first, last]),
            Err(EngineError::DataGap { field: "front_close", .. })
        ));
    }

    #[test]
    fn test_unordered_input_rejected() {
        let ticks = vec![
            tick(3, 0, dec!(100), dec!(100)),
            tick(2, 0, dec!(100), dec!(100)),
        ];
        assert_eq!(
            run(quiet_config(), &ticks).unwrap_err(),
            EngineError::UnorderedInput { index: 1 }
        );
    }

    #[test]
    fn test_empty_input() {
        let results = run(quiet_config(), &[]).unwrap();
        assert_eq!(results.equity.equity(), &[dec!(100000)]);
        assert_eq!(results.start_date, None);
        assert!(results.to_string().contains("no trading days"));
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let cfg = EngineConfig {
            tick_step: Decimal::ZERO,
            ..quiet_config()
        };
        assert!(matches!(
            Backtester::new(cfg, ExpiryCalendar::default()),
            Err(EngineError::InvalidConfig { field: "tick_step", .. })
        ));
    }

    #[test]
    fn test_book_must_match_mode() {
        let result = Backtester::with_book(
            quiet_config(),
            ExpiryCalendar::default(),
            Box::new(NetBook::default()),
        );
        assert!(matches!(result, Err(EngineError::InvalidConfig { field: "inventory_mode", .. })));
    }

    #[test]
    fn test_modes_agree_from_flat_start() {
        let mut ticks = Vec::new();
        for d in 2..5 {
            for (i, p) in [dec!(100), dec!(98), dec!(97), dec!(101), dec!(103), dec!(99)]
                .into_iter()
                .enumerate()
            {
                ticks.push(tick(d, u32::try_from(i).unwrap() * 10, p, dec!(100)));
            }
        }
        let net_cfg = EngineConfig {
            inventory_mode: InventoryMode::Net,
            ..quiet_config()
        };

        let two = run(quiet_config(), &ticks).unwrap();
        let net = run(net_cfg, &ticks).unwrap();

        assert_eq!(two.equity.equity(), net.equity.equity());
        assert_eq!(two.fills, net.fills);
    }

    #[test]
    fn test_both_lanes_unwind_before_growing() {
        let book = TwoLaneBook::from_lanes(Lane::new(1, dec!(100)), Lane::new(1, dec!(100)));
        let ticks = vec![
            tick(2, 0, dec!(100), dec!(100)),
            // Bid at 98 crosses a print at 97: the short lane is reduced,
            // not the long lane grown
            tick(2, 5, dec!(97), dec!(100)),
        ];

        let results = Backtester::with_book(quiet_config(), ExpiryCalendar::default(), Box::new(book))
            .unwrap()
            .run(&ticks)
            .unwrap();

        assert_eq!(results.fills.len(), 1);
        assert_eq!(results.fills[0].action, FillAction::Unwind);
        assert_eq!(results.final_state, PositionState::LongOnly);
        assert_eq!(results.final_net_inventory, 1);
    }
}
