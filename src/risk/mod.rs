//! Risk engine for RelicVault lending
//!
//! Pure policy and arithmetic: per-collection risk parameters, interest
//! accrual, and health factor evaluation. Nothing in here touches the
//! database or the clock; `now` and the collateral value are always inputs.

pub mod health;
pub mod interest;
pub mod params;

pub use health::{evaluate, HealthReport, RiskBand};
pub use interest::{accrued_interest, outstanding_principal, total_owed, SECONDS_PER_YEAR};
pub use params::{RiskParameterBook, RiskParameters};
