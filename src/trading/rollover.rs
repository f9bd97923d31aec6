//! Contract rollover from the expiring front month into the back month.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::models::ExpiryCalendar;
use super::ledger::PositionLedger;

/// Record of one synthetic roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverEvent {
    /// Trading date the roll fired on
    pub date: NaiveDate,
    /// Calendar entry the roll consumed
    pub expiry: NaiveDate,
    pub front_price: Decimal,
    pub back_price: Decimal,
    pub contracts: u32,
    /// Currency P&L of closing at the front price
    pub pnl: Decimal,
    pub fee: Decimal,
}

/// Consumes the expiry calendar, one roll per entry.
#[derive(Debug, Clone)]
pub struct RolloverHandler {
    calendar: ExpiryCalendar,
    last_roll: Option<NaiveDate>,
    events: Vec<RolloverEvent>,
}

impl RolloverHandler {
    pub fn new(calendar: ExpiryCalendar) -> Self {
        Self {
            calendar,
            last_roll: None,
            events: Vec::new(),
        }
    }

    pub fn calendar(&self) -> &ExpiryCalendar {
        &self.calendar
    }

    /// Drop expiries that fall before the first trading date.
    pub fn align_to(&mut self, first_date: NaiveDate) -> Vec<NaiveDate> {
        self.calendar.discard_before(first_date)
    }

    /// Whether a tick on `date` should roll, given the following trading date.
    ///
    /// The last trading date has no successor and never rolls; a date that
    /// already rolled is not re-evaluated.
    pub fn is_due(&self, date: NaiveDate, next_date: Option<NaiveDate>) -> bool {
        if self.last_roll == Some(date) {
            return false;
        }
        next_date.is_some_and(|next| self.calendar.is_due(next))
    }

    /// Close the book at `front` and re-open it at `back`, consuming the next
    /// calendar entry.
    pub fn roll(
        &mut self,
        date: NaiveDate,
        front: Decimal,
        back: Decimal,
        ledger: &mut PositionLedger,
    ) -> EngineResult<RolloverEvent> {
        if self.last_roll == Some(date) {
            return Err(EngineError::RolloverInvariant(format!(
                "second roll requested on {date}"
            )));
        }
        let expiry = self.calendar.consume().ok_or_else(|| {
            EngineError::RolloverInvariant(format!("roll on {date} with no pending expiry"))
        })?;

        let outcome = ledger.roll(front, back);
        self.last_roll = Some(date);

        info!(
            %date,
            %expiry,
            front = %front,
            back = %back,
            contracts = outcome.contracts,
            pnl = %outcome.pnl,
            fee = %outcome.fee,
            "Rolled into back month"
        );

        let event = RolloverEvent {
            date,
            expiry,
            front_price: front,
            back_price: back,
            contracts: outcome.contracts,
            pnl: outcome.pnl,
            fee: outcome.fee,
        };
        self.events.push(event.clone());
        Ok(event)
    }

    pub fn events(&self) -> &[RolloverEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<RolloverEvent> {
        self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Lane, Side};
    use crate::trading::inventory::TwoLaneBook;
    use crate::trading::EngineConfig;
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn config() -> EngineConfig {
        EngineConfig {
            fee_per_contract: dec!(2),
            contract_multiplier: 100,
            ..Default::default()
        }
    }

    fn handler() -> RolloverHandler {
        RolloverHandler::new(ExpiryCalendar::new(vec![date(18), date(25)]).unwrap())
    }

    #[test]
    fn test_due_when_next_date_reaches_expiry() {
        let h = handler();
        assert!(!h.is_due(date(16), Some(date(17))));
        assert!(h.is_due(date(17), Some(date(18))));
        // Gap over the expiry still counts
        assert!(h.is_due(date(17), Some(date(19))));
        // Last trading date never rolls
        assert!(!h.is_due(date(17), None));
    }

    #[test]
    fn test_roll_moves_basis_and_books_loss() {
        let cfg = config();
        let book = TwoLaneBook::from_lanes(Lane::new(1, dec!(101)), Lane::default());
        let mut ledger = PositionLedger::new(Box::new(book), &cfg);
        let mut h = handler();

        let event = h.roll(date(17), dec!(100), dec!(101), &mut ledger).unwrap();

        assert_eq!(event.expiry, date(18));
        assert_eq!(event.contracts, 1);
        assert_eq!(event.pnl, dec!(-100));
        assert_eq!(event.fee, dec!(2));
        assert_eq!(ledger.lane(Side::Long).avg_price, dec!(101));
        assert_eq!(ledger.losses(), dec!(102));
    }

    #[test]
    fn test_second_roll_same_date_is_fatal() {
        let cfg = config();
        let mut ledger = PositionLedger::new(Box::new(TwoLaneBook::default()), &cfg);
        let mut h = handler();

        h.roll(date(17), dec!(100), dec!(101), &mut ledger).unwrap();
        assert!(!h.is_due(date(17), Some(date(25))));
        assert!(matches!(
            h.roll(date(17), dec!(100), dec!(101), &mut ledger),
            Err(EngineError::RolloverInvariant(_))
        ));
        assert_eq!(h.events().len(), 1);
    }

    #[test]
    fn test_roll_without_pending_expiry_is_fatal() {
        let cfg = config();
        let mut ledger = PositionLedger::new(Box::new(TwoLaneBook::default()), &cfg);
        let mut h = RolloverHandler::new(ExpiryCalendar::default());

        assert!(!h.is_due(date(17), Some(date(18))));
        assert!(matches!(
            h.roll(date(17), dec!(100), dec!(101), &mut ledger),
            Err(EngineError::RolloverInvariant(_))
        ));
    }

    #[test]
    fn test_rolls_consume_calendar_in_order() {
        let cfg = config();
        let mut ledger = PositionLedger::new(Box::new(TwoLaneBook::default()), &cfg);
        let mut h = handler();

        h.roll(date(17), dec!(100), dec!(101), &mut ledger).unwrap();
        h.roll(date(24), dec!(100), dec!(101), &mut ledger).unwrap();

        let expiries: Vec<_> = h.events().iter().map(|e| e.expiry).collect();
        assert_eq!(expiries, vec![date(18), date(25)]);
        assert_eq!(h.calendar().consumed(), &[date(18), date(25)]);
    }
}
