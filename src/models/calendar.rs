//! Contract expiry calendar.

use std::collections::VecDeque;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Ordered expiry dates, consumed front to back, each at most once.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExpiryCalendar {
    pending: VecDeque<NaiveDate>,
    consumed: Vec<NaiveDate>,
}

impl ExpiryCalendar {
    /// Build a calendar from an ascending list of dates.
    ///
    /// A repeated date would roll the book twice for one expiry, so it is
    /// rejected along with out-of-order dates.
    pub fn new(dates: Vec<NaiveDate>) -> EngineResult<Self> {
        if let Some(w) = dates.windows(2).find(|w| w[1] < w[0]) {
            return Err(EngineError::InvalidCalendar(format!(
                "{} listed after {}",
                w[1], w[0]
            )));
        }
        if let Some(w) = dates.windows(2).find(|w| w[1] == w[0]) {
            return Err(EngineError::InvalidCalendar(format!("{} listed twice", w[0])));
        }
        Ok(Self {
            pending: dates.into(),
            consumed: Vec::new(),
        })
    }

    /// Monthly expiries on the third Thursday of every month from `start`'s
    /// month through `end`'s month, skipping those before `start`.
    pub fn third_thursdays(start: NaiveDate, end: NaiveDate) -> Self {
        let mut dates = Vec::new();
        let (mut year, mut month) = (start.year(), start.month());

        while (year, month) <= (end.year(), end.month()) {
            if let Some(expiry) = NaiveDate::from_weekday_of_month_opt(year, month, Weekday::Thu, 3) {
                if expiry >= start {
                    dates.push(expiry);
                }
            }
            if month == 12 {
                year += 1;
                month = 1;
            } else {
                month += 1;
            }
        }

        Self {
            pending: dates.into(),
            consumed: Vec::new(),
        }
    }

    /// Next unconsumed expiry.
    pub fn peek(&self) -> Option<NaiveDate> {
        self.pending.front().copied()
    }

    /// Whether `next_trading_date` reaches or passes the next expiry.
    pub fn is_due(&self, next_trading_date: NaiveDate) -> bool {
        self.peek().is_some_and(|expiry| next_trading_date >= expiry)
    }

    /// Consume the next expiry.
    pub fn consume(&mut self) -> Option<NaiveDate> {
        let expiry = self.pending.pop_front()?;
        self.consumed.push(expiry);
        Some(expiry)
    }

    /// Drop pending expiries strictly before `date`, returning them.
    ///
    /// These can never be reached by a run starting on `date`.
    pub fn discard_before(&mut self, date: NaiveDate) -> Vec<NaiveDate> {
        let mut dropped = Vec::new();
        while let Some(&expiry) = self.pending.front() {
            if expiry >= date {
                break;
            }
            dropped.push(expiry);
            self.pending.pop_front();
        }
        dropped
    }

    pub fn pending(&self) -> impl Iterator<Item = &NaiveDate> {
        self.pending.iter()
    }

    #[cfg(test)]
    pub fn consumed(&self) -> &[NaiveDate] {
        &self.consumed
    }

    pub fn len(&self) -> usize {
        self.pending.len() + self.consumed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
