//! End-of-day mark-to-market settlement.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::models::{EquitySeries, Session, Side};
use super::ledger::PositionLedger;

/// One settled trading day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    /// Official close the book was marked to
    pub close: Decimal,
    /// Currency P&L of marking open exposure to `close`
    pub mark_pnl: Decimal,
    /// `mark_pnl` less the day's accumulated losses and fees
    pub realized_pnl: Decimal,
    pub equity: Decimal,
    pub daily_return: Decimal,
    pub net_inventory: i64,
    /// Contracts matched during the day
    pub matched: u32,
    /// Whether the day traded on the back month after a roll
    pub rolled: bool,
}

/// Folds the day's results into the equity curve and clears intraday state.
#[derive(Debug, Clone, Copy, Default)]
pub struct DailySettlement;

impl DailySettlement {
    pub fn new() -> Self {
        Self
    }

    /// Settle `date` at `close`.
    ///
    /// `realized_pnl = mark_pnl - losses` and the new equity is the prior
    /// equity plus `realized_pnl`. The loss accumulator and the session are
    /// reset; the position carries over with its basis moved to `close`.
    pub fn settle(
        &self,
        date: NaiveDate,
        close: Decimal,
        ledger: &mut PositionLedger,
        equity: &mut EquitySeries,
        session: &mut Session,
    ) -> EngineResult<DailyReport> {
        let prior = equity.last();
        if prior.is_zero() {
            return Err(EngineError::InsufficientCapital {
                date,
                reason: "prior equity is zero, daily return undefined".to_string(),
            });
        }

        let losses = ledger.accumulator();
        debug!(
            %date,
            long = ledger.long_qty(),
            long_avg = %ledger.lane(Side::Long).avg_price,
            short = ledger.short_qty(),
            short_avg = %ledger.lane(Side::Short).avg_price,
            "Marking book to close"
        );
        let mark_pnl = ledger.mark_to_close(close);
        let realized_pnl = mark_pnl - losses.total;
        let new_equity = prior + realized_pnl;
        let net_inventory = ledger.net_qty();

        let daily_return = equity
            .append(date, new_equity, net_inventory)
            .ok_or_else(|| EngineError::InsufficientCapital {
                date,
                reason: "daily return undefined".to_string(),
            })?;

        info!(
            %date,
            %close,
            %mark_pnl,
            losses = %losses.total,
            fees = %losses.fees,
            %realized_pnl,
            equity = %new_equity,
            net_inventory,
            matched = session.matched,
            unwound = session.unwound,
            "Realized equity"
        );

        let report = DailyReport {
            date,
            close,
            mark_pnl,
            realized_pnl,
            equity: new_equity,
            daily_return,
            net_inventory,
            matched: session.matched,
            rolled: session.rolled(),
        };

        ledger.reset_losses();
        session.reset();
        Ok(report)
    }
}
