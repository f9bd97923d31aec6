//! Position ledger: the book plus the intraday loss accumulator.
//!
//! Every contract that changes hands goes through here, so fees and realized
//! P&L are always booked in currency with the configured multiplier.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineResult;
use crate::models::{Lane, PositionState, Side};
use super::inventory::{Ceilings, Inventory};
use super::EngineConfig;

/// Realized losses and fees since the last settlement.
///
/// Positive `total` is a loss. Realized profits are booked as negative
/// losses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LossAccumulator {
    pub total: Decimal,
    /// Fee portion of `total`
    pub fees: Decimal,
}

impl LossAccumulator {
    pub fn book_pnl(&mut self, pnl: Decimal) {
        self.total -= pnl;
    }

    pub fn charge_fee(&mut self, fee: Decimal) {
        self.total += fee;
        self.fees += fee;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Outcome of synthetically rolling the book into the next contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollOutcome {
    pub contracts: u32,
    /// Currency P&L of closing at the front price
    pub pnl: Decimal,
    pub fee: Decimal,
}

pub struct PositionLedger {
    book: Box<dyn Inventory>,
    losses: LossAccumulator,
    multiplier: Decimal,
    fee_per_contract: Decimal,
    /// Fees charged over the ledger's lifetime
    lifetime_fees: Decimal,
}

impl PositionLedger {
    pub fn new(book: Box<dyn Inventory>, config: &EngineConfig) -> Self {
        Self {
            book,
            losses: LossAccumulator::default(),
            multiplier: config.multiplier(),
            fee_per_contract: config.fee_per_contract,
            lifetime_fees: Decimal::ZERO,
        }
    }

    pub fn state(&self) -> PositionState {
        self.book.state()
    }

    pub fn long_qty(&self) -> u32 {
        self.book.long_qty()
    }

    pub fn short_qty(&self) -> u32 {
        self.book.short_qty()
    }

    pub fn net_qty(&self) -> i64 {
        self.book.net_qty()
    }

    pub fn gross_qty(&self) -> u32 {
        self.book.gross_qty()
    }

    pub fn lane(&self, side: Side) -> Lane {
        self.book.lane(side)
    }

    pub fn ceilings(&self, room: i64) -> Ceilings {
        self.book.ceilings(room)
    }

    /// Loss accumulated since the last settlement.
    pub fn losses(&self) -> Decimal {
        self.losses.total
    }

    pub fn accumulator(&self) -> LossAccumulator {
        self.losses
    }

    pub fn lifetime_fees(&self) -> Decimal {
        self.lifetime_fees
    }

    /// Grow `side` by one contract at `price`, charging one fee.
    pub fn add_fill(&mut self, side: Side, price: Decimal) -> EngineResult<()> {
        let before = self.state();
        self.book.grow(side, price)?;
        self.charge_fees(1);
        self.log_transition(before, side, true);
        Ok(())
    }

    /// Remove one contract from the `lane` side at `price`, realizing its P&L
    /// and charging one fee. Returns the currency P&L before the fee.
    pub fn reduce_lane(&mut self, lane: Side, price: Decimal) -> EngineResult<Decimal> {
        let before = self.state();
        let pnl = self.book.shrink(lane, price)? * self.multiplier;
        self.losses.book_pnl(pnl);
        self.charge_fees(1);
        self.log_transition(before, lane, false);
        Ok(pnl)
    }

    /// Close all exposure at `front` and re-open the same size at `back`,
    /// booking the realized P&L and one fee per contract.
    pub fn roll(&mut self, front: Decimal, back: Decimal) -> RollOutcome {
        let contracts = self.gross_qty();
        let pnl = self.book.rebase_all(front, back) * self.multiplier;
        self.losses.book_pnl(pnl);
        let fee = self.charge_fees(contracts);
        RollOutcome {
            contracts,
            pnl,
            fee,
        }
    }

    /// Mark open exposure to `close`, moving cost bases to the close.
    ///
    /// Returns the currency mark P&L; the accumulator is left for the caller
    /// to fold in and reset.
    pub fn mark_to_close(&mut self, close: Decimal) -> Decimal {
        self.book.rebase_all(close, close) * self.multiplier
    }

    pub fn reset_losses(&mut self) {
        self.losses.reset();
    }

    fn charge_fees(&mut self, contracts: u32) -> Decimal {
        let fee = self.fee_per_contract * Decimal::from(contracts);
        if contracts > 0 {
            self.losses.charge_fee(fee);
            self.lifetime_fees += fee;
        }
        fee
    }

    fn log_transition(&self, before: PositionState, lane: Side, grow: bool) {
        let remaining = self.lane(lane).qty;
        let after = self.state();
        debug_assert_eq!(before.transition(lane, grow, remaining), Some(after));
        if before != after {
            debug!(from = %before, to = %after, lane = %lane, "Position state changed");
        }
    }
}

impl std::fmt::Debug for PositionLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionLedger")
            .field("book", &self.book)
            .field("losses", &self.losses)
            .finish()
    }
}
