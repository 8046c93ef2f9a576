//! Per-collection risk parameters
//!
//! Every collection the platform accepts as collateral carries a lending
//! policy: how much can be borrowed against it, when it becomes liquidation
//! eligible, and what rate new loans accrue at. The book is loaded once at
//! startup; parameter edits only apply to loans originated afterwards because
//! each loan snapshots its rate and threshold at origination.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::{LendingError, LendingResult};

/// Basis points in one whole unit (100%)
pub const BPS_SCALE: Decimal = dec!(10_000);

/// Lending policy for one collateral collection
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RiskParameters {
    pub collection_id: String,

    /// Maximum loan-to-value at origination, in basis points (5000 = 50%)
    pub max_ltv_bps: i32,

    /// Health factor below which a loan becomes liquidation eligible.
    /// Policy-owned; distinct from the cosmetic risk band cutoffs.
    pub liquidation_threshold: Decimal,

    /// Interest rate snapshotted into new loans, in basis points APR
    pub base_interest_rate_bps: i32,
}

impl RiskParameters {
    /// Max LTV as a fraction of collateral value
    pub fn max_ltv(&self) -> Decimal {
        Decimal::from(self.max_ltv_bps) / BPS_SCALE
    }

    /// Maximum principal that may be borrowed against `collateral_value`
    pub fn max_borrow(&self, collateral_value: Decimal) -> Decimal {
        collateral_value * self.max_ltv()
    }
}

/// In-memory lookup table of risk parameters, keyed by collection id.
///
/// Pure and immutable once constructed. Loans never mutate it.
#[derive(Debug, Clone)]
pub struct RiskParameterBook {
    params: HashMap<String, RiskParameters>,
}

impl RiskParameterBook {
    pub fn new(entries: Vec<RiskParameters>) -> Self {
        let params = entries
            .into_iter()
            .map(|p| (p.collection_id.clone(), p))
            .collect();
        Self { params }
    }

    /// Load all configured collections from the database
    pub async fn load(db_pool: &PgPool) -> LendingResult<Self> {
        let entries = sqlx::query_as::<_, RiskParameters>(
            "SELECT collection_id, max_ltv_bps, liquidation_threshold, base_interest_rate_bps \
             FROM risk_parameters",
        )
        .fetch_all(db_pool)
        .await?;

        tracing::info!(collections = entries.len(), "Loaded risk parameter book");
        Ok(Self::new(entries))
    }

    /// Look up the policy for a collection
    pub fn lookup(&self, collection_id: &str) -> LendingResult<&RiskParameters> {
        self.params
            .get(collection_id)
            .ok_or_else(|| LendingError::UnknownCollateralClass(collection_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard_params() -> RiskParameters {
        RiskParameters {
            collection_id: "meridian-masks".to_string(),
            max_ltv_bps: 5000,
            liquidation_threshold: dec!(1.2),
            base_interest_rate_bps: 850,
        }
    }

    #[test]
    fn test_max_ltv_fraction() {
        assert_eq!(standard_params().max_ltv(), dec!(0.5));
    }

    #[test]
    fn test_max_borrow() {
        // 45.2 collateral at 50% max LTV caps borrowing at 22.6
        let params = standard_params();
        assert_eq!(params.max_borrow(dec!(45.2)), dec!(22.600));
    }

    #[test]
    fn test_lookup_known_collection() {
        let book = RiskParameterBook::new(vec![standard_params()]);
        let params = book.lookup("meridian-masks").unwrap();
        assert_eq!(params.base_interest_rate_bps, 850);
    }

    #[test]
    fn test_lookup_unknown_collection_fails() {
        let book = RiskParameterBook::new(vec![standard_params()]);
        let err = book.lookup("unlisted-collection").unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_COLLATERAL_CLASS");
    }
}
