//! Risk-based position sizing: capital to contract ceilings.

use chrono::NaiveDateTime;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{EngineError, EngineResult};
use super::inventory::Ceilings;
use super::ledger::PositionLedger;
use super::EngineConfig;

/// Calculator for the number of contracts the account can carry.
#[derive(Debug, Clone)]
pub struct RiskSizer {
    multiplier: Decimal,
    margin_fraction: Decimal,
}

impl RiskSizer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            multiplier: config.multiplier(),
            margin_fraction: config.margin_fraction,
        }
    }

    /// Gross contracts affordable at `price`, net of the intraday loss.
    ///
    /// `floor((equity - losses) / (price * multiplier * margin_fraction))`,
    /// floored at zero.
    pub fn max_room(
        &self,
        equity: Decimal,
        losses: Decimal,
        price: Decimal,
        at: NaiveDateTime,
    ) -> EngineResult<i64> {
        let per_contract = price * self.multiplier * self.margin_fraction;
        if per_contract <= Decimal::ZERO {
            return Err(EngineError::InvalidPrice { timestamp: at, price });
        }

        let risk_capital = equity - losses;
        if risk_capital <= Decimal::ZERO {
            return Ok(0);
        }

        // Overflowing i64 means "more room than any book will use"
        Ok((risk_capital / per_contract)
            .floor()
            .to_i64()
            .unwrap_or(i64::MAX))
    }

    /// Per-side ceilings for the ledger's current book.
    pub fn ceilings(
        &self,
        equity: Decimal,
        ledger: &PositionLedger,
        price: Decimal,
        at: NaiveDateTime,
    ) -> EngineResult<Ceilings> {
        let room = self.max_room(equity, ledger.losses(), price, at)?;
        Ok(ledger.ceilings(room))
    }
}
