//! Position lanes and the position state machine.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Side;

/// One side of a position: a contract count and its average entry price.
///
/// The average is only meaningful while `qty > 0`; it is reset to zero when
/// the lane empties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Lane {
    pub qty: u32,
    pub avg_price: Decimal,
}

impl Lane {
    pub fn new(qty: u32, avg_price: Decimal) -> Self {
        if qty == 0 {
            return Self::default();
        }
        Self { qty, avg_price }
    }

    pub fn is_empty(&self) -> bool {
        self.qty == 0
    }

    /// Add one contract (averaging in).
    pub fn add_one(&mut self, price: Decimal) {
        let qty = Decimal::from(self.qty);
        self.avg_price = (self.avg_price * qty + price) / (qty + Decimal::ONE);
        self.qty += 1;
    }

    /// Remove one contract at `price`, returning its per-unit P&L.
    ///
    /// Caller guarantees the lane is non-empty.
    pub fn remove_one(&mut self, side: Side, price: Decimal) -> Decimal {
        let pnl = side.unit_pnl(self.avg_price, price);
        self.qty -= 1;
        if self.qty == 0 {
            self.avg_price = Decimal::ZERO;
        }
        pnl
    }

    /// Whole-lane P&L at `price` without changing the lane, in price points.
    pub fn pnl_at(&self, side: Side, price: Decimal) -> Decimal {
        Decimal::from(self.qty) * side.unit_pnl(self.avg_price, price)
    }

    /// Move the cost basis to `price` (mark-to-market or roll re-open).
    pub fn rebase(&mut self, price: Decimal) {
        if self.qty > 0 {
            self.avg_price = price;
        }
    }
}

/// Occupancy of the book, the states of the per-tick state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    NoPosition,
    LongOnly,
    ShortOnly,
    /// Two-lane book with both lanes open
    BothLanes,
}

impl PositionState {
    pub fn from_quantities(long_qty: u32, short_qty: u32) -> Self {
        match (long_qty > 0, short_qty > 0) {
            (false, false) => PositionState::NoPosition,
            (true, false) => PositionState::LongOnly,
            (false, true) => PositionState::ShortOnly,
            (true, true) => PositionState::BothLanes,
        }
    }

    /// State after one contract is added to (`grow`) or removed from a lane.
    ///
    /// `remaining` is the lane's quantity after the change. Removing from an
    /// empty lane, or leaving the book without the changed lane, yields `None`.
    pub fn transition(self, lane: Side, grow: bool, remaining: u32) -> Option<Self> {
        use PositionState::*;

        let (long_open, short_open) = match self {
            NoPosition => (false, false),
            LongOnly => (true, false),
            ShortOnly => (false, true),
            BothLanes => (true, true),
        };
        let lane_open = match lane {
            Side::Long => long_open,
            Side::Short => short_open,
        };
        if !grow && !lane_open {
            return None;
        }
        if grow && remaining == 0 {
            return None;
        }
        let open_after = remaining > 0;
        let (long_after, short_after) = match lane {
            Side::Long => (open_after, short_open),
            Side::Short => (long_open, open_after),
        };
        Some(Self::from_quantities(long_after as u32, short_after as u32))
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PositionState::NoPosition => "no-position",
            PositionState::LongOnly => "long-only",
            PositionState::ShortOnly => "short-only",
            PositionState::BothLanes => "both-lanes",
        };
        f.write_str(s)
    }
}
