//! Loan records and pure transition arithmetic

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LendingError, LendingResult};
use crate::models::CollateralAsset;
use crate::risk;
use crate::risk::params::RiskParameters;

/// Loan status enum
///
/// `Active` is the only mutable state; `Completed` and `Liquidated` are
/// terminal and absorbing.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "loan_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Completed,
    Liquidated,
}

/// Loan model
///
/// Interest rate and liquidation threshold are snapshotted from the risk
/// parameter book at origination; later policy edits never touch open loans.
/// Accrued interest and health factor are derived on read and never stored.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Loan {
    pub id: Uuid,
    pub asset_id: String,
    pub collection_id: String,
    /// Collateral valuation at origination, the LTV denominator
    pub collateral_value: Decimal,
    pub valued_at: DateTime<Utc>,
    pub borrower_id: Uuid,
    pub principal: Decimal,
    pub borrow_token: String,
    pub interest_rate_bps: i32,
    pub liquidation_threshold: Decimal,
    pub cumulative_repaid: Decimal,
    pub status: LoanStatus,
    pub originated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }

    /// Principal still outstanding after repayments
    pub fn outstanding_principal(&self) -> Decimal {
        risk::outstanding_principal(self.principal, self.cumulative_repaid)
    }

    /// Interest accrued from origination to `now`
    pub fn accrued_interest(&self, now: DateTime<Utc>) -> Decimal {
        risk::accrued_interest(
            self.principal,
            self.cumulative_repaid,
            self.interest_rate_bps,
            self.originated_at,
            now,
        )
    }

    /// Outstanding principal plus accrued interest, never negative
    pub fn total_owed(&self, now: DateTime<Utc>) -> Decimal {
        risk::total_owed(
            self.principal,
            self.cumulative_repaid,
            self.interest_rate_bps,
            self.originated_at,
            now,
        )
    }

    pub fn days_active(&self, now: DateTime<Utc>) -> i64 {
        let end = self.closed_at.unwrap_or(now);
        (end - self.originated_at).num_days().max(0)
    }

    pub fn collateral_asset(&self) -> Option<CollateralAsset> {
        CollateralAsset::parse(&self.asset_id)
    }
}

/// Repayment audit record, append-only.
///
/// `amount` is what was applied to the loan; anything tendered beyond the
/// total owed is reported back in `excess`, never silently kept. The sum of
/// `amount` over a loan's records always equals its `cumulative_repaid`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RepaymentRecord {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub request_id: Uuid,
    pub amount: Decimal,
    pub excess: Decimal,
    pub settlement_tx_hash: String,
    pub resulting_total_owed: Decimal,
    pub resulting_health_factor: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

/// Request to open a loan.
///
/// `settlement_tx_hash` references the confirmed custody transfer; the
/// settlement layer calls in only after its own transaction confirms.
#[derive(Debug, Deserialize)]
pub struct OpenLoanRequest {
    pub collection_id: String,
    pub token_id: String,
    pub borrower_id: Uuid,
    pub principal: Decimal,
    pub borrow_token: String,
    pub settlement_tx_hash: String,
}

/// Request to repay against a loan.
///
/// `request_id` is the caller's idempotency key: retrying the same request
/// returns the original outcome without applying the amount twice.
#[derive(Debug, Deserialize)]
pub struct RepayRequest {
    pub amount: Decimal,
    pub request_id: Uuid,
    pub settlement_tx_hash: String,
}

/// Query for listing loans
#[derive(Debug, Default, Deserialize)]
pub struct ListLoansQuery {
    pub borrower_id: Option<Uuid>,
    pub status: Option<LoanStatus>,
    pub page: Option<i32>,
    pub limit: Option<i32>,
}

/// Validate a requested principal against the collection policy.
///
/// Enforced at origination only: later collateral price drops are expected
/// and are exactly what produces liquidation risk.
pub fn validate_open_principal(
    params: &RiskParameters,
    collateral_value: Decimal,
    principal: Decimal,
) -> LendingResult<()> {
    if principal <= Decimal::ZERO {
        return Err(LendingError::InvalidAmount(principal));
    }
    let max_borrow = params.max_borrow(collateral_value);
    if principal > max_borrow {
        return Err(LendingError::ExceedsMaxLtv {
            requested: principal,
            max_borrow,
        });
    }
    Ok(())
}

/// Planned effect of applying a repayment to a loan at an instant.
///
/// Pure: computing a plan never mutates anything, so the same arithmetic
/// backs both `preview_repayment` and the committed `repay` path.
#[derive(Debug, Clone, Serialize)]
pub struct RepaymentPlan {
    /// Amount applied to the loan, capped at total owed
    pub applied: Decimal,
    /// Refundable overage tendered beyond total owed
    pub excess: Decimal,
    pub new_cumulative_repaid: Decimal,
    pub resulting_total_owed: Decimal,
    pub resulting_health_factor: Option<Decimal>,
    /// Whether this repayment settles the loan and releases the collateral
    pub releases: bool,
}

impl RepaymentPlan {
    pub fn compute(
        loan: &Loan,
        amount: Decimal,
        collateral_value: Decimal,
        now: DateTime<Utc>,
    ) -> LendingResult<Self> {
        if !loan.is_active() {
            return Err(LendingError::LoanNotActive(loan.id));
        }
        if amount <= Decimal::ZERO {
            return Err(LendingError::InvalidAmount(amount));
        }

        let owed = loan.total_owed(now);
        let applied = amount.min(owed);
        let excess = amount - applied;
        let new_cumulative_repaid = loan.cumulative_repaid + applied;

        // Re-derive rather than subtract, so the recorded value matches what
        // any later read would recompute from the stored fields.
        let resulting_total_owed = risk::total_owed(
            loan.principal,
            new_cumulative_repaid,
            loan.interest_rate_bps,
            loan.originated_at,
            now,
        );
        let releases = resulting_total_owed <= Decimal::ZERO;
        let resulting_health_factor =
            risk::health::health_factor(collateral_value, resulting_total_owed);

        Ok(Self {
            applied,
            excess,
            new_cumulative_repaid,
            resulting_total_owed,
            resulting_health_factor,
            releases,
        })
    }

    pub fn preview(&self) -> RepaymentPreview {
        RepaymentPreview {
            new_total_owed: self.resulting_total_owed,
            new_health_factor: self.resulting_health_factor,
            will_release: self.releases,
        }
    }
}

/// Pure preview of a repayment, no mutation
#[derive(Debug, Clone, Serialize)]
pub struct RepaymentPreview {
    pub new_total_owed: Decimal,
    pub new_health_factor: Option<Decimal>,
    pub will_release: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn origination() -> DateTime<Utc> {
        "2026-03-01T00:00:00Z".parse().unwrap()
    }

    pub(crate) fn test_loan(principal: Decimal, collateral_value: Decimal) -> Loan {
        Loan {
            id: Uuid::new_v4(),
            asset_id: "meridian-masks:742".to_string(),
            collection_id: "meridian-masks".to_string(),
            collateral_value,
            valued_at: origination(),
            borrower_id: Uuid::new_v4(),
            principal,
            borrow_token: "USDC".to_string(),
            interest_rate_bps: 850,
            liquidation_threshold: dec!(1.2),
            cumulative_repaid: Decimal::ZERO,
            status: LoanStatus::Active,
            originated_at: origination(),
            closed_at: None,
            created_at: origination(),
            updated_at: origination(),
        }
    }

    #[test]
    fn test_validate_open_principal_at_limit() {
        let params = RiskParameters {
            collection_id: "meridian-masks".to_string(),
            max_ltv_bps: 5000,
            liquidation_threshold: dec!(1.2),
            base_interest_rate_bps: 850,
        };

        // Exactly at the limit passes, one epsilon over fails
        assert!(validate_open_principal(&params, dec!(45.2), dec!(22.6)).is_ok());
        let err = validate_open_principal(&params, dec!(45.2), dec!(22.6000001)).unwrap_err();
        assert_eq!(err.error_code(), "EXCEEDS_MAX_LTV");
    }

    #[test]
    fn test_validate_open_principal_rejects_non_positive() {
        let params = RiskParameters {
            collection_id: "meridian-masks".to_string(),
            max_ltv_bps: 5000,
            liquidation_threshold: dec!(1.2),
            base_interest_rate_bps: 850,
        };

        assert!(validate_open_principal(&params, dec!(45.2), Decimal::ZERO).is_err());
        assert!(validate_open_principal(&params, dec!(45.2), dec!(-5)).is_err());
    }

    #[test]
    fn test_partial_repayment_plan() {
        // 5.0 against 18.0 owed: 13.0 remains, health factor improves, stays open
        let loan = test_loan(dec!(18.0), dec!(28.7));
        let plan = RepaymentPlan::compute(&loan, dec!(5.0), dec!(28.7), origination()).unwrap();

        assert_eq!(plan.applied, dec!(5.0));
        assert_eq!(plan.excess, Decimal::ZERO);
        assert_eq!(plan.resulting_total_owed, dec!(13.0));
        assert_eq!(plan.resulting_health_factor.unwrap().round_dp(3), dec!(2.208));
        assert!(!plan.releases);
    }

    #[test]
    fn test_full_repayment_plan_releases() {
        let loan = test_loan(dec!(18.0), dec!(28.7));
        let now = origination() + Duration::days(10);
        let owed = loan.total_owed(now);

        let plan = RepaymentPlan::compute(&loan, owed, dec!(28.7), now).unwrap();
        assert_eq!(plan.applied, owed);
        assert_eq!(plan.excess, Decimal::ZERO);
        assert_eq!(plan.resulting_total_owed, Decimal::ZERO);
        assert_eq!(plan.resulting_health_factor, None);
        assert!(plan.releases);
    }

    #[test]
    fn test_over_repayment_reports_excess() {
        let loan = test_loan(dec!(18.0), dec!(28.7));
        let plan = RepaymentPlan::compute(&loan, dec!(20.0), dec!(28.7), origination()).unwrap();

        assert_eq!(plan.applied, dec!(18.0));
        assert_eq!(plan.excess, dec!(2.0));
        assert_eq!(plan.resulting_total_owed, Decimal::ZERO);
        assert!(plan.releases);
    }

    #[test]
    fn test_plan_rejects_inactive_loan() {
        let mut loan = test_loan(dec!(18.0), dec!(28.7));
        loan.status = LoanStatus::Completed;

        let err = RepaymentPlan::compute(&loan, dec!(5.0), dec!(28.7), origination()).unwrap_err();
        assert_eq!(err.error_code(), "LOAN_NOT_ACTIVE");
    }

    #[test]
    fn test_plan_rejects_non_positive_amount() {
        let loan = test_loan(dec!(18.0), dec!(28.7));
        let err =
            RepaymentPlan::compute(&loan, Decimal::ZERO, dec!(28.7), origination()).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_AMOUNT");
    }

    #[test]
    fn test_days_active_stops_at_close() {
        let mut loan = test_loan(dec!(18.0), dec!(28.7));
        let now = origination() + Duration::days(40);

        assert_eq!(loan.days_active(now), 40);

        loan.closed_at = Some(origination() + Duration::days(12));
        assert_eq!(loan.days_active(now), 12);
    }
}
