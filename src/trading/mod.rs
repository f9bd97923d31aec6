//! Trading logic: sizing, quoting, matching and the accounting around them.

mod config;
mod deleverage;
mod inventory;
mod ledger;
mod matching;
mod position_sizer;
mod quote;
mod rollover;
mod settlement;

pub use config::{EngineConfig, InventoryMode};
pub use deleverage::{ForcedDeleveraging, ForcedTrim};
pub use inventory::{new_book, Inventory};
pub use ledger::PositionLedger;
pub use matching::MatchingSimulator;
pub use position_sizer::RiskSizer;
pub use quote::QuoteEngine;
pub use rollover::{RolloverEvent, RolloverHandler};
pub use settlement::{DailyReport, DailySettlement};

#[cfg(test)]
pub use inventory::{NetBook, TwoLaneBook};
