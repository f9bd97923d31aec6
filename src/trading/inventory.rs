//! Position books: the two interchangeable inventory representations.
//!
//! Both books expose the same capability ([`Inventory`]) so the quote, match
//! and settlement protocol is written once. They differ in how standing
//! exposure consumes risk room:
//! - [`TwoLaneBook`]: each lane's ceiling is `room + opposite - own`, so
//!   exposure held on both lanes partially offsets.
//! - [`NetBook`]: one ceiling, `room - |net|`, shared by both sides.
//!
//! Book methods work in price points; the ledger applies the contract
//! multiplier and fees.

use std::fmt;

use rust_decimal::Decimal;

use crate::error::{EngineError, EngineResult};
use crate::models::{Lane, PositionState, Side};
use super::InventoryMode;

/// Signed per-side contract allowance.
///
/// Values may be negative before forced deleveraging runs; matching treats
/// anything `<= 0` as exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ceilings {
    pub long: i64,
    pub short: i64,
}

impl Ceilings {
    pub fn get(&self, side: Side) -> i64 {
        match side {
            Side::Long => self.long,
            Side::Short => self.short,
        }
    }

    /// Room to grow `side` by at least one contract.
    pub fn allows(&self, side: Side) -> bool {
        self.get(side) > 0
    }

    pub fn is_solvent(&self) -> bool {
        self.long >= 0 && self.short >= 0
    }
}

/// Capability shared by the position books.
pub trait Inventory: fmt::Debug + Send + Sync {
    fn mode(&self) -> InventoryMode;

    /// Contracts held long.
    fn long_qty(&self) -> u32;

    /// Contracts held short.
    fn short_qty(&self) -> u32;

    /// Lane view for `side`.
    fn lane(&self, side: Side) -> Lane;

    /// Per-side ceilings for a gross room of `room` contracts.
    fn ceilings(&self, room: i64) -> Ceilings;

    /// Grow `side` by one contract at `price`. Only valid while the
    /// opposite lane is empty.
    fn grow(&mut self, side: Side, price: Decimal) -> EngineResult<()>;

    /// Remove one contract from the `side` lane at `price`, returning the
    /// per-unit P&L in price points.
    fn shrink(&mut self, side: Side, price: Decimal) -> EngineResult<Decimal>;

    /// Close every open lane at `exit` and re-open it at `reopen`, returning
    /// the realized P&L in price points (sum over lanes of qty * unit P&L).
    fn rebase_all(&mut self, exit: Decimal, reopen: Decimal) -> Decimal;

    fn net_qty(&self) -> i64 {
        i64::from(self.long_qty()) - i64::from(self.short_qty())
    }

    fn gross_qty(&self) -> u32 {
        self.long_qty() + self.short_qty()
    }

    fn state(&self) -> PositionState {
        PositionState::from_quantities(self.long_qty(), self.short_qty())
    }
}

/// Build the book selected by `mode`, starting flat.
pub fn new_book(mode: InventoryMode) -> Box<dyn Inventory> {
    match mode {
        InventoryMode::TwoLane => Box::new(TwoLaneBook::default()),
        InventoryMode::Net => Box::new(NetBook::default()),
    }
}

/// Independent long and short lanes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TwoLaneBook {
    long: Lane,
    short: Lane,
}

impl TwoLaneBook {
    /// Book seeded with existing lanes; both may be open.
    #[cfg(test)]
    pub fn from_lanes(long: Lane, short: Lane) -> Self {
        Self { long, short }
    }

    fn lane_mut(&mut self, side: Side) -> &mut Lane {
        match side {
            Side::Long => &mut self.long,
            Side::Short => &mut self.short,
        }
    }
}

impl Inventory for TwoLaneBook {
    fn mode(&self) -> InventoryMode {
        InventoryMode::TwoLane
    }

    fn long_qty(&self) -> u32 {
        self.long.qty
    }

    fn short_qty(&self) -> u32 {
        self.short.qty
    }

    fn lane(&self, side: Side) -> Lane {
        match side {
            Side::Long => self.long,
            Side::Short => self.short,
        }
    }

    fn ceilings(&self, room: i64) -> Ceilings {
        let long = i64::from(self.long.qty);
        let short = i64::from(self.short.qty);
        Ceilings {
            long: room + short - long,
            short: room + long - short,
        }
    }

    fn grow(&mut self, side: Side, price: Decimal) -> EngineResult<()> {
        if !self.lane(side.opposite()).is_empty() {
            return Err(EngineError::InvalidTransition(format!(
                "cannot grow {side} while the {} lane is open",
                side.opposite()
            )));
        }
        self.lane_mut(side).add_one(price);
        Ok(())
    }

    fn shrink(&mut self, side: Side, price: Decimal) -> EngineResult<Decimal> {
        let lane = self.lane_mut(side);
        if lane.is_empty() {
            return Err(EngineError::InvalidTransition(format!(
                "cannot reduce empty {side} lane"
            )));
        }
        Ok(lane.remove_one(side, price))
    }

    fn rebase_all(&mut self, exit: Decimal, reopen: Decimal) -> Decimal {
        let mut pnl = Decimal::ZERO;
        for side in [Side::Long, Side::Short] {
            let lane = self.lane_mut(side);
            if !lane.is_empty() {
                pnl += lane.pnl_at(side, exit);
                lane.rebase(reopen);
            }
        }
        pnl
    }
}

/// One signed net quantity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetBook {
    net: i64,
    avg_price: Decimal,
}

impl NetBook {
    /// Book seeded with a signed quantity (positive long, negative short).
    #[cfg(test)]
    pub fn from_net(net: i64, avg_price: Decimal) -> Self {
        let avg_price = if net == 0 { Decimal::ZERO } else { avg_price };
        Self { net, avg_price }
    }

    fn held_side(&self) -> Option<Side> {
        match self.net {
            0 => None,
            n if n > 0 => Some(Side::Long),
            _ => Some(Side::Short),
        }
    }
}

impl Inventory for NetBook {
    fn mode(&self) -> InventoryMode {
        InventoryMode::Net
    }

    fn long_qty(&self) -> u32 {
        u32::try_from(self.net.max(0)).unwrap_or(u32::MAX)
    }

    fn short_qty(&self) -> u32 {
        u32::try_from((-self.net).max(0)).unwrap_or(u32::MAX)
    }

    fn lane(&self, side: Side) -> Lane {
        if self.held_side() == Some(side) {
            Lane::new(self.long_qty().max(self.short_qty()), self.avg_price)
        } else {
            Lane::default()
        }
    }

    fn ceilings(&self, room: i64) -> Ceilings {
        let ceiling = room - self.net.abs();
        Ceilings {
            long: ceiling,
            short: ceiling,
        }
    }

    fn grow(&mut self, side: Side, price: Decimal) -> EngineResult<()> {
        if self.held_side() == Some(side.opposite()) {
            return Err(EngineError::InvalidTransition(format!(
                "cannot grow {side} while net position is {}",
                self.net
            )));
        }
        let mut lane = self.lane(side);
        lane.add_one(price);
        self.avg_price = lane.avg_price;
        self.net += side.sign();
        Ok(())
    }

    fn shrink(&mut self, side: Side, price: Decimal) -> EngineResult<Decimal> {
        if self.held_side() != Some(side) {
            return Err(EngineError::InvalidTransition(format!(
                "cannot reduce {side} while net position is {}",
                self.net
            )));
        }
        let mut lane = self.lane(side);
        let pnl = lane.remove_one(side, price);
        self.avg_price = lane.avg_price;
        self.net -= side.sign();
        Ok(pnl)
    }

    fn rebase_all(&mut self, exit: Decimal, reopen: Decimal) -> Decimal {
        let Some(side) = self.held_side() else {
            return Decimal::ZERO;
        };
        let mut lane = self.lane(side);
        let pnl = lane.pnl_at(side, exit);
        lane.rebase(reopen);
        self.avg_price = lane.avg_price;
        pnl
    }
}
