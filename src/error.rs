//! Engine error type.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use thiserror::Error;

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid config `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
    #[error("tick at {timestamp} is missing `{field}`")]
    DataGap {
        timestamp: NaiveDateTime,
        field: &'static str,
    },
    #[error("tick at {timestamp} has non-positive price {price}")]
    InvalidPrice {
        timestamp: NaiveDateTime,
        price: Decimal,
    },
    #[error("tick #{index} is out of (date, timestamp) order")]
    UnorderedInput { index: usize },
    #[error("invalid expiry calendar: {0}")]
    InvalidCalendar(String),
    #[error("insufficient capital on {date}: {reason}")]
    InsufficientCapital { date: NaiveDate, reason: String },
    #[error("rollover invariant violated: {0}")]
    RolloverInvariant(String),
    #[error("invalid position transition: {0}")]
    InvalidTransition(String),
}

impl EngineError {
    pub fn config(field: &'static str, reason: impl Into<String>) -> Self {
        EngineError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}
