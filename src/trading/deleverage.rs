//! Forced deleveraging: the simulated margin call.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EngineError, EngineResult};
use crate::models::Side;
use super::inventory::Ceilings;
use super::ledger::PositionLedger;
use super::position_sizer::RiskSizer;

/// One contract closed because the account could no longer carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForcedTrim {
    pub timestamp: NaiveDateTime,
    /// Lane the contract was removed from
    pub side: Side,
    pub price: Decimal,
    /// Currency P&L realized by the trim, before its fee
    pub pnl: Decimal,
}

/// Trims the book one contract at a time until both ceilings are `>= 0`.
#[derive(Debug, Clone)]
pub struct ForcedDeleveraging {
    sizer: RiskSizer,
}

impl ForcedDeleveraging {
    pub fn new(sizer: RiskSizer) -> Self {
        Self { sizer }
    }

    /// Restore solvency at `price`.
    ///
    /// Ceilings are recomputed after every trim because each trim moves the
    /// loss accumulator. The short lane is trimmed first while its ceiling is
    /// negative, then the long lane. Every trim removes one contract of gross
    /// exposure, so more than `gross + 1` iterations, or a negative ceiling
    /// with nothing left to trim, means fees alone outrun the risk room.
    pub fn run(
        &self,
        equity: Decimal,
        price: Decimal,
        timestamp: NaiveDateTime,
        ledger: &mut PositionLedger,
    ) -> EngineResult<(Ceilings, Vec<ForcedTrim>)> {
        let bound = ledger.gross_qty() as usize + 1;
        let mut trims = Vec::new();

        loop {
            let ceilings = self.sizer.ceilings(equity, ledger, price, timestamp)?;
            if ceilings.is_solvent() {
                return Ok((ceilings, trims));
            }

            if trims.len() >= bound {
                return Err(EngineError::InsufficientCapital {
                    date: timestamp.date(),
                    reason: format!("deleveraging did not converge after {} trims", trims.len()),
                });
            }

            let side = [Side::Short, Side::Long]
                .into_iter()
                .find(|&s| ceilings.get(s) < 0 && !ledger.lane(s).is_empty())
                .ok_or_else(|| EngineError::InsufficientCapital {
                    date: timestamp.date(),
                    reason: format!(
                        "ceilings long={} short={} with no exposure left to trim",
                        ceilings.long, ceilings.short
                    ),
                })?;

            let pnl = ledger.reduce_lane(side, price)?;
            warn!(
                %timestamp,
                lane = %side,
                %price,
                %pnl,
                remaining = ledger.lane(side).qty,
                "Forced trim: risk room exhausted"
            );
            trims.push(ForcedTrim {
                timestamp,
                side,
                price,
                pnl,
            });
        }
    }
}
