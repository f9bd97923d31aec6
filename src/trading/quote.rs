//! Inventory-skewed two-sided quoting.

use chrono::{Duration, NaiveDateTime};
use rust_decimal::Decimal;

use crate::models::{QuoteState, Side};
use super::matching::FillDelta;
use super::EngineConfig;

/// Derives bid/ask from a reference price and the current inventory.
///
/// `bid = ref - step * (long_qty + 1) * skew`
/// `ask = ref + step * (short_qty + 1) * skew`
///
/// The side inventory is piling up on is pushed further away, so the book
/// leans toward flattening.
#[derive(Debug, Clone)]
pub struct QuoteEngine {
    step: Decimal,
    skew: Decimal,
    refresh_interval: Duration,
}

impl QuoteEngine {
    pub fn new(config: &EngineConfig) -> Self {
        let secs = i64::try_from(config.quote_refresh_interval_secs).unwrap_or(i64::MAX);
        Self {
            step: config.tick_step,
            skew: config.quote_skew,
            refresh_interval: Duration::try_seconds(secs).unwrap_or(Duration::MAX),
        }
    }

    /// Quote for one side given the lane quantity on that side.
    pub fn quote(&self, side: Side, reference: Decimal, lane_qty: u32) -> Decimal {
        let offset = self.step * Decimal::from(u64::from(lane_qty) + 1) * self.skew;
        match side {
            Side::Long => reference - offset,
            Side::Short => reference + offset,
        }
    }

    /// Both sides at once: `(bid, ask)`.
    pub fn compute(&self, reference: Decimal, long_qty: u32, short_qty: u32) -> (Decimal, Decimal) {
        (
            self.quote(Side::Long, reference, long_qty),
            self.quote(Side::Short, reference, short_qty),
        )
    }

    /// Whether the standing quote is missing or older than the refresh interval.
    pub fn needs_full_refresh(&self, state: &QuoteState, now: NaiveDateTime) -> bool {
        match state.last_refresh {
            _ if !state.is_live() => true,
            None => true,
            // An interval past the calendar range never elapses
            Some(last) => last
                .checked_add_signed(self.refresh_interval)
                .is_some_and(|due| now > due),
        }
    }

    /// Apply the refresh policy after this tick's matching.
    ///
    /// - no quote yet, or interval elapsed: re-quote both sides and restart the clock
    /// - exactly one side filled: re-quote only that side
    /// - both sides filled: re-quote both, clock untouched
    ///
    /// Returns the sides (and prices) placed, in bid-then-ask order.
    pub fn refresh(
        &self,
        state: &mut QuoteState,
        reference: Decimal,
        now: NaiveDateTime,
        delta: FillDelta,
        long_qty: u32,
        short_qty: u32,
    ) -> Vec<(Side, Decimal)> {
        let sides: &[Side] = if self.needs_full_refresh(state, now) {
            state.last_refresh = Some(now);
            &[Side::Long, Side::Short]
        } else {
            match (delta.bid.is_some(), delta.ask.is_some()) {
                (true, true) => &[Side::Long, Side::Short],
                (true, false) => &[Side::Long],
                (false, true) => &[Side::Short],
                (false, false) => &[],
            }
        };

        let (bid, ask) = self.compute(reference, long_qty, short_qty);
        sides
            .iter()
            .map(|&side| {
                let price = match side {
                    Side::Long => bid,
                    Side::Short => ask,
                };
                state.set(side, price);
                (side, price)
            })
            .collect()
    }
}
