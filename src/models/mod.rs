//! Data models for ticks, positions, quotes, logs and the equity curve.

mod calendar;
mod equity;
mod order;
mod position;
mod session;
mod tick;

pub use calendar::ExpiryCalendar;
pub use equity::EquitySeries;
pub use order::{Fill, FillAction, OrderLogEntry, Side};
#[cfg(test)]
pub use order::OrderStatus;
pub use position::{Lane, PositionState};
pub use session::{QuoteState, Session};
pub use tick::{PriceSeries, Tick};
