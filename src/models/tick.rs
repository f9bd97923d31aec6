//! Tick model: one last-traded price for the front and back month contracts.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Which contract's price series the session is trading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSeries {
    /// Front month, until the day's roll fires
    #[default]
    Front,
    /// Back month, for the rest of a roll day
    Back,
}

/// Aligned market data record handed over by the ingestion side.
///
/// Prices are optional so that a gap in the input surfaces as
/// [`EngineError::DataGap`] at the step that needs the value, instead of
/// failing the whole file at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    /// Exchange timestamp of the trade
    pub timestamp: NaiveDateTime,

    /// Trading date the tick belongs to
    pub date: NaiveDate,

    /// Front-month ticker symbol
    pub ticker: String,

    /// Back-month ticker symbol, used in logs after a roll
    #[serde(default)]
    pub back_ticker: Option<String>,

    /// Last traded price of the front month
    #[serde(default)]
    pub front_price: Option<Decimal>,

    /// Official close of the front month for `date`
    #[serde(default)]
    pub front_close: Option<Decimal>,

    /// Last traded price of the back month
    #[serde(default)]
    pub back_price: Option<Decimal>,

    /// Official close of the back month for `date`
    #[serde(default)]
    pub back_close: Option<Decimal>,
}

impl Tick {
    /// Last traded price on the given series.
    pub fn price(&self, series: PriceSeries) -> EngineResult<Decimal> {
        let (value, field) = match series {
            PriceSeries::Front => (self.front_price, "front_price"),
            PriceSeries::Back => (self.back_price, "back_price"),
        };
        let price = self.require(value, field)?;
        if price <= Decimal::ZERO {
            return Err(EngineError::InvalidPrice {
                timestamp: self.timestamp,
                price,
            });
        }
        Ok(price)
    }

    /// Official close on the given series.
    pub fn close(&self, series: PriceSeries) -> EngineResult<Decimal> {
        match series {
            PriceSeries::Front => self.require(self.front_close, "front_close"),
            PriceSeries::Back => self.require(self.back_close, "back_close"),
        }
    }

    /// Ticker to stamp on log entries while trading `series`.
    pub fn ticker_for(&self, series: PriceSeries) -> &str {
        match (series, &self.back_ticker) {
            (PriceSeries::Back, Some(back)) => back,
            _ => &self.ticker,
        }
    }

    /// Sort key the input must be non-decreasing in.
    pub fn order_key(&self) -> (NaiveDate, NaiveDateTime) {
        (self.date, self.timestamp)
    }

    fn require(&self, value: Option<Decimal>, field: &'static str) -> EngineResult<Decimal> {
        value.ok_or(EngineError::DataGap {
            timestamp: self.timestamp,
            field,
        })
    }
}
