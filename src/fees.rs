//! Fee Calculation for Reward Issuance
//! Mission: Exact transaction cost for every granted share, down to the last paisa

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fixed fee rates charged on the notional cost of a reward
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    /// Brokerage (0.02% of cost)
    pub brokerage_rate: Decimal,

    /// Securities transaction tax (0.1% of cost)
    pub stt_rate: Decimal,

    /// GST, charged on brokerage only (18%)
    pub gst_rate: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            brokerage_rate: dec!(0.0002),
            stt_rate: dec!(0.001),
            gst_rate: dec!(0.18),
        }
    }
}

/// Cost split for one reward. Full precision; round only for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeBreakdown {
    pub cost: Decimal,
    pub brokerage: Decimal,
    pub stt: Decimal,
    pub gst: Decimal,
    pub total_fees: Decimal,
    pub total_cash_outflow: Decimal,
}

impl FeeSchedule {
    /// Load a schedule from a TOML file. Missing keys keep their default rate.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fee schedule at {}", path.display()))?;
        let schedule: FeeSchedule =
            toml::from_str(&content).context("Failed to parse fee schedule")?;
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, rate) in [
            ("brokerage_rate", self.brokerage_rate),
            ("stt_rate", self.stt_rate),
            ("gst_rate", self.gst_rate),
        ] {
            if rate < Decimal::ZERO {
                anyhow::bail!("{} must not be negative (got {})", name, rate);
            }
        }
        Ok(())
    }

    /// Apply the schedule to `quantity` shares bought at `price`.
    /// `None` when the amounts overflow the decimal range.
    pub fn apply(&self, price: Decimal, quantity: Decimal) -> Option<FeeBreakdown> {
        let cost = price.checked_mul(quantity)?;
        let brokerage = cost.checked_mul(self.brokerage_rate)?;
        let stt = cost.checked_mul(self.stt_rate)?;
        let gst = brokerage.checked_mul(self.gst_rate)?;
        let total_fees = brokerage.checked_add(stt)?.checked_add(gst)?;

        Some(FeeBreakdown {
            cost,
            brokerage,
            stt,
            gst,
            total_fees,
            total_cash_outflow: cost.checked_add(total_fees)?,
        })
    }
}

/// Render a decimal with exactly four fractional digits.
pub fn format_inr(value: Decimal) -> String {
    format!("{:.4}", value.round_dp(4))
}
