//! Daily equity curve.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Append-only, day-indexed account equity.
///
/// `equity[0]` is the initial capital; every settled trading day appends
/// exactly one value, its date, its return and the closing net inventory, so
/// `equity.len() == dates.len() + 1` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquitySeries {
    equity: Vec<Decimal>,
    returns: Vec<Decimal>,
    dates: Vec<NaiveDate>,
    net_inventory: Vec<i64>,
}

impl EquitySeries {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            equity: vec![initial_capital],
            returns: Vec::new(),
            dates: Vec::new(),
            net_inventory: Vec::new(),
        }
    }

    /// Most recent settled equity.
    pub fn last(&self) -> Decimal {
        // Seeded at construction, never empty
        self.equity[self.equity.len() - 1]
    }

    pub fn initial(&self) -> Decimal {
        self.equity[0]
    }

    /// Append one settled day. Returns that day's return, or `None` (and
    /// appends nothing) when the prior equity is zero and the return is
    /// undefined.
    pub fn append(&mut self, date: NaiveDate, equity: Decimal, net_inventory: i64) -> Option<Decimal> {
        let prior = self.last();
        let ret = equity.checked_div(prior)? - Decimal::ONE;

        self.equity.push(equity);
        self.returns.push(ret);
        self.dates.push(date);
        self.net_inventory.push(net_inventory);
        Some(ret)
    }

    pub fn equity(&self) -> &[Decimal] {
        &self.equity
    }

    pub fn returns(&self) -> &[Decimal] {
        &self.returns
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn net_inventory(&self) -> &[i64] {
        &self.net_inventory
    }

    pub fn trading_days(&self) -> usize {
        self.dates.len()
    }

    pub fn total_return(&self) -> Decimal {
        (self.last() - self.initial())
            .checked_div(self.initial())
            .unwrap_or(Decimal::ZERO)
    }
}
