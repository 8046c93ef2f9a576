//! Health factor evaluation
//!
//! A loan's health factor is the ratio of current collateral value to total
//! owed. The display band cutoffs here are cosmetic UI classifications; the
//! liquidation decision uses the policy threshold snapshotted on the loan,
//! which need not coincide with the Danger cutoff.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::ledger::model::Loan;

/// Display cutoff for the Healthy band
pub const HEALTHY_MIN: Decimal = dec!(1.5);

/// Display cutoff for the Warning band; below this is Danger
pub const WARNING_MIN: Decimal = dec!(1.2);

/// UI risk classification of a loan's health factor
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    /// Health factor >= 1.5
    Healthy,
    /// Health factor in [1.2, 1.5)
    Warning,
    /// Health factor < 1.2
    Danger,
}

impl RiskBand {
    /// Classify a health factor; `None` means nothing is owed, which is as
    /// healthy as a position gets.
    pub fn from_health_factor(health_factor: Option<Decimal>) -> Self {
        match health_factor {
            None => RiskBand::Healthy,
            Some(hf) if hf >= HEALTHY_MIN => RiskBand::Healthy,
            Some(hf) if hf >= WARNING_MIN => RiskBand::Warning,
            Some(_) => RiskBand::Danger,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RiskBand::Healthy => "Comfortably collateralized",
            RiskBand::Warning => "Collateral cushion is thinning",
            RiskBand::Danger => "At or near liquidation territory",
        }
    }
}

/// Result of evaluating a loan against a collateral valuation at an instant
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub total_owed: Decimal,

    /// `None` when total owed is zero or below: the ratio is unbounded
    pub health_factor: Option<Decimal>,

    pub risk_band: RiskBand,

    /// Whether the health factor is below the loan's snapshotted
    /// liquidation threshold
    pub liquidation_eligible: bool,
}

/// Collateral value over total owed; `None` (unbounded) when nothing is owed
pub fn health_factor(collateral_value: Decimal, total_owed: Decimal) -> Option<Decimal> {
    if total_owed <= Decimal::ZERO {
        return None;
    }
    Some(collateral_value / total_owed)
}

/// Evaluate a loan's position. Pure and deterministic: identical
/// `(loan, collateral_value, now)` inputs always yield an identical report.
pub fn evaluate(loan: &Loan, collateral_value: Decimal, now: DateTime<Utc>) -> HealthReport {
    let total_owed = loan.total_owed(now);
    let health_factor = health_factor(collateral_value, total_owed);
    let risk_band = RiskBand::from_health_factor(health_factor);

    let liquidation_eligible = match health_factor {
        Some(hf) => hf < loan.liquidation_threshold,
        None => false,
    };

    HealthReport {
        total_owed,
        health_factor,
        risk_band,
        liquidation_eligible,
    }
}
