//! Order and fill records emitted by the simulator.

use std::fmt;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of a quote, and the lane a contract lands in when that quote fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Bid side; grows the long lane
    Long,
    /// Ask side; grows the short lane
    Short,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// +1 for long, -1 for short.
    pub fn sign(&self) -> i64 {
        match self {
            Side::Long => 1,
            Side::Short => -1,
        }
    }

    /// Per-unit P&L of closing one contract of this lane, opened at `avg`, at `exit`.
    pub fn unit_pnl(&self, avg: Decimal, exit: Decimal) -> Decimal {
        match self {
            Side::Long => exit - avg,
            Side::Short => avg - exit,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status column of the order log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Placed,
    Filled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "PLACED",
            OrderStatus::Filled => "FILLED",
        }
    }
}

/// What a matched contract did to the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FillAction {
    /// Grew the lane on the quote's own side
    Open,
    /// Closed one contract of the opposite lane
    Unwind,
}

/// Append-only audit record of a quote placement or fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLogEntry {
    pub timestamp: NaiveDateTime,
    pub ticker: String,
    pub price: Decimal,
    pub side: Side,
    pub status: OrderStatus,
}

impl OrderLogEntry {
    pub fn placed(timestamp: NaiveDateTime, ticker: &str, price: Decimal, side: Side) -> Self {
        Self {
            timestamp,
            ticker: ticker.to_string(),
            price,
            side,
            status: OrderStatus::Placed,
        }
    }

    pub fn filled(fill: &Fill) -> Self {
        Self {
            timestamp: fill.timestamp,
            ticker: fill.ticker.clone(),
            price: fill.price,
            side: fill.side,
            status: OrderStatus::Filled,
        }
    }
}

/// A matched contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    pub timestamp: NaiveDateTime,
    pub ticker: String,
    /// Trade price the quote was matched at
    pub price: Decimal,
    /// Quote side that filled
    pub side: Side,
    pub action: FillAction,
}
