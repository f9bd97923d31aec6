//! Engine configuration.

use std::{env, fmt, fs, path::Path, str::FromStr};

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Which position representation the engine runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryMode {
    /// Independent long and short lanes, each with its own cost basis
    #[default]
    TwoLane,
    /// One signed net quantity with one cost basis
    Net,
}

impl InventoryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryMode::TwoLane => "two_lane",
            InventoryMode::Net => "net",
        }
    }
}

impl FromStr for InventoryMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "two_lane" | "twolane" | "lanes" => Ok(Self::TwoLane),
            "net" | "single" | "single_lane" => Ok(Self::Net),
            other => Err(EngineError::config(
                "inventory_mode",
                format!("unknown mode `{other}` (expected two_lane or net)"),
            )),
        }
    }
}

impl fmt::Display for InventoryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for quoting, sizing and accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Starting account equity
    pub initial_capital: Decimal,

    /// Quote distance unit, in price points
    pub tick_step: Decimal,

    /// Minimum seconds between full two-sided quote refreshes
    pub quote_refresh_interval_secs: u64,

    /// Fee charged per contract transferred (fill, forced trim, roll)
    pub fee_per_contract: Decimal,

    /// Currency value of one price point per contract
    pub contract_multiplier: u32,

    /// Fraction of notional required as risk capital, in (0, 1]
    pub margin_fraction: Decimal,

    /// Multiplier on the inventory-dependent quote offset
    pub quote_skew: Decimal,

    /// Position representation
    pub inventory_mode: InventoryMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_capital: dec!(500000),
            tick_step: dec!(1.8),
            quote_refresh_interval_secs: 15,
            fee_per_contract: dec!(40),     // 0.4 points at multiplier 100
            contract_multiplier: 100,
            margin_fraction: dec!(0.25),
            quote_skew: dec!(1),
            inventory_mode: InventoryMode::TwoLane,
        }
    }
}

impl EngineConfig {
    /// Load from an optional TOML file, then apply `MMSIM_*` env overrides.
    ///
    /// The file may hold the fields at top level or under an `[engine]` table.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let raw: toml::Value =
            toml::from_str(&data).with_context(|| "Failed to parse TOML config")?;

        let table = match raw.get("engine") {
            Some(nested) => nested.clone(),
            None => raw,
        };
        table
            .try_into()
            .with_context(|| "Invalid engine config structure")
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        override_parsed("MMSIM_INITIAL_CAPITAL", &mut self.initial_capital)?;
        override_parsed("MMSIM_TICK_STEP", &mut self.tick_step)?;
        override_parsed(
            "MMSIM_QUOTE_REFRESH_INTERVAL_SECS",
            &mut self.quote_refresh_interval_secs,
        )?;
        override_parsed("MMSIM_FEE_PER_CONTRACT", &mut self.fee_per_contract)?;
        override_parsed("MMSIM_CONTRACT_MULTIPLIER", &mut self.contract_multiplier)?;
        override_parsed("MMSIM_MARGIN_FRACTION", &mut self.margin_fraction)?;
        override_parsed("MMSIM_QUOTE_SKEW", &mut self.quote_skew)?;
        override_parsed("MMSIM_INVENTORY_MODE", &mut self.inventory_mode)?;
        Ok(())
    }

    /// Check every field; the engine refuses to start on the first violation.
    pub fn validate(&self) -> EngineResult<()> {
        if self.initial_capital <= Decimal::ZERO {
            return Err(EngineError::config("initial_capital", "must be positive"));
        }
        if self.tick_step <= Decimal::ZERO {
            return Err(EngineError::config("tick_step", "must be positive"));
        }
        if self.fee_per_contract < Decimal::ZERO {
            return Err(EngineError::config("fee_per_contract", "must be non-negative"));
        }
        if self.contract_multiplier == 0 {
            return Err(EngineError::config("contract_multiplier", "must be positive"));
        }
        if self.margin_fraction <= Decimal::ZERO || self.margin_fraction > Decimal::ONE {
            return Err(EngineError::config("margin_fraction", "must be within (0, 1]"));
        }
        if self.quote_skew <= Decimal::ZERO {
            return Err(EngineError::config("quote_skew", "must be positive"));
        }
        Ok(())
    }

    pub fn multiplier(&self) -> Decimal {
        Decimal::from(self.contract_multiplier)
    }
}

fn override_parsed<T>(key: &str, field: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    if let Ok(value) = env::var(key) {
        *field = value
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key}={value}: {e}"))?;
    }
    Ok(())
}
