//! Per-trading-day state cleared at settlement.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{PriceSeries, Side};

/// Standing two-sided quote. Absent until the first quote of a trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuoteState {
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    /// Timestamp of the last full (both-sided) refresh
    pub last_refresh: Option<NaiveDateTime>,
}

impl QuoteState {
    /// Both sides quoted.
    pub fn is_live(&self) -> bool {
        self.bid.is_some() && self.ask.is_some()
    }

    pub fn get(&self, side: Side) -> Option<Decimal> {
        match side {
            Side::Long => self.bid,
            Side::Short => self.ask,
        }
    }

    pub fn set(&mut self, side: Side, price: Decimal) {
        match side {
            Side::Long => self.bid = Some(price),
            Side::Short => self.ask = Some(price),
        }
    }
}

/// Everything the simulator forgets at a day boundary, except the loss
/// accumulator which lives with the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub quotes: QuoteState,
    /// Series the day trades on; switches to `Back` once the roll fires
    pub series: PriceSeries,
    /// Contracts unwound today (the original "total matched" counter)
    pub unwound: u32,
    /// Contracts matched today, opens and unwinds
    pub matched: u32,
}

impl Session {
    pub fn rolled(&self) -> bool {
        self.series == PriceSeries::Back
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
