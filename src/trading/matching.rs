//! Fill matching against the last traded price.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::EngineResult;
use crate::models::{Fill, FillAction, QuoteState, Side};
use super::inventory::Ceilings;
use super::ledger::PositionLedger;

/// Which quote side(s) filled on a tick, and what each fill did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FillDelta {
    pub bid: Option<FillAction>,
    pub ask: Option<FillAction>,
}

impl FillDelta {
    fn set(&mut self, side: Side, action: FillAction) {
        match side {
            Side::Long => self.bid = Some(action),
            Side::Short => self.ask = Some(action),
        }
    }

    pub fn count(&self) -> u32 {
        u32::from(self.bid.is_some()) + u32::from(self.ask.is_some())
    }
}

/// Matches the standing quote against one trade print.
///
/// A quote is crossed when `bid >= p` (or `ask <= p`). A crossed side first
/// unwinds one contract of the opposite lane if that lane is open; otherwise
/// it grows its own lane when the side's ceiling allows. Both sides are
/// evaluated on every tick, bid first, against ceilings computed once before
/// matching.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchingSimulator;

impl MatchingSimulator {
    pub fn new() -> Self {
        Self
    }

    pub fn match_tick(
        &self,
        quotes: &QuoteState,
        price: Decimal,
        timestamp: NaiveDateTime,
        ticker: &str,
        ceilings: Ceilings,
        ledger: &mut PositionLedger,
    ) -> EngineResult<(FillDelta, Vec<Fill>)> {
        let mut delta = FillDelta::default();
        let mut fills = Vec::new();

        if !quotes.is_live() {
            return Ok((delta, fills));
        }

        for side in [Side::Long, Side::Short] {
            if !Self::crossed(quotes, side, price) {
                continue;
            }

            let action = if !ledger.lane(side.opposite()).is_empty() {
                let pnl = ledger.reduce_lane(side.opposite(), price)?;
                debug!(%side, %price, %pnl, "Unwound one contract");
                FillAction::Unwind
            } else if ceilings.allows(side) {
                ledger.add_fill(side, price)?;
                debug!(%side, %price, qty = ledger.lane(side).qty, "Opened one contract");
                FillAction::Open
            } else {
                debug!(%side, %price, ceiling = ceilings.get(side), "Quote crossed but ceiling exhausted");
                continue;
            };

            delta.set(side, action);
            fills.push(Fill {
                timestamp,
                ticker: ticker.to_string(),
                price,
                side,
                action,
            });
        }

        Ok((delta, fills))
    }

    fn crossed(quotes: &QuoteState, side: Side, price: Decimal) -> bool {
        match (side, quotes.get(side)) {
            (Side::Long, Some(bid)) => bid >= price,
            (Side::Short, Some(ask)) => ask <= price,
            (_, None) => false,
        }
    }
}
