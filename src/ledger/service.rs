//! Loan ledger persistence - the single writer for loan state
//!
//! Every mutating call runs in a transaction and takes a `FOR UPDATE` row
//! lock on the loan, so a repayment and a liquidation racing on the same
//! loan serialize instead of corrupting `cumulative_repaid` or `status`.
//! Reads never lock and never block writers on other loans.
//!
//! All validation happens before the first write of a transaction: a request
//! either fails with no visible effect or commits completely. Loan creation
//! and the collateral pledge flag commit atomically, so a loan is never
//! observable as active with a free asset.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{LendingError, LendingResult};
use crate::ledger::model::{
    ListLoansQuery, Loan, LoanStatus, RepayRequest, RepaymentPlan, RepaymentPreview,
    RepaymentRecord,
};
use crate::models::{CollateralAsset, PaginatedResponse, Valuation};
use crate::risk;
use crate::risk::params::RiskParameters;

/// Outcome of a committed (or idempotently replayed) repayment
#[derive(Debug, Serialize)]
pub struct RepaymentOutcome {
    pub loan: Loan,
    pub record: RepaymentRecord,
    /// Whether this repayment completed the loan and released the collateral
    pub released: bool,
    /// True when the request id had already been applied and the stored
    /// outcome was returned instead of applying the amount again
    pub retried: bool,
}

/// Loan ledger backed by Postgres
#[derive(Clone)]
pub struct LoanLedger {
    db_pool: PgPool,
}

impl LoanLedger {
    /// Create a new ledger over a connection pool
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Open a loan against a pledged asset.
    ///
    /// Validates the principal against the collection policy, then inserts
    /// the active loan and the pledge row in one transaction. The pledge
    /// check locks any existing row so two concurrent opens on the same
    /// asset serialize and the loser fails cleanly.
    #[allow(clippy::too_many_arguments)]
    pub async fn open_loan(
        &self,
        asset: &CollateralAsset,
        params: &RiskParameters,
        valuation: &Valuation,
        principal: Decimal,
        borrow_token: &str,
        borrower_id: Uuid,
        now: DateTime<Utc>,
    ) -> LendingResult<Loan> {
        crate::ledger::model::validate_open_principal(params, valuation.value, principal)?;

        let asset_id = asset.asset_id();
        let mut tx = self.db_pool.begin().await?;

        let existing = sqlx::query_scalar::<_, String>(
            "SELECT asset_id FROM collateral_pledges WHERE asset_id = $1 FOR UPDATE",
        )
        .bind(&asset_id)
        .fetch_optional(&mut *tx)
        .await?;

        if existing.is_some() {
            return Err(LendingError::CollateralAlreadyPledged(asset_id));
        }

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (
                id, asset_id, collection_id, collateral_value, valued_at,
                borrower_id, principal, borrow_token, interest_rate_bps,
                liquidation_threshold, cumulative_repaid, status,
                originated_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&asset_id)
        .bind(&asset.collection_id)
        .bind(valuation.value)
        .bind(valuation.observed_at)
        .bind(borrower_id)
        .bind(principal)
        .bind(borrow_token)
        .bind(params.base_interest_rate_bps)
        .bind(params.liquidation_threshold)
        .bind(Decimal::ZERO)
        .bind(LoanStatus::Active)
        .bind(now)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO collateral_pledges (asset_id, loan_id, pledged_at) VALUES ($1, $2, $3)",
        )
        .bind(&asset_id)
        .bind(loan.id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            loan_id = %loan.id,
            asset_id = %asset_id,
            principal = %principal,
            rate_bps = params.base_interest_rate_bps,
            "Loan opened"
        );

        Ok(loan)
    }

    /// Get a loan by id
    pub async fn get_loan(&self, id: Uuid) -> LendingResult<Loan> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(LendingError::LoanNotFound(id))?;

        Ok(loan)
    }

    /// Whether an asset currently backs an active loan
    pub async fn is_pledged(&self, asset_id: &str) -> LendingResult<bool> {
        let row = sqlx::query_scalar::<_, String>(
            "SELECT asset_id FROM collateral_pledges WHERE asset_id = $1",
        )
        .bind(asset_id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(row.is_some())
    }

    /// List loans with filters and pagination
    pub async fn list_loans(&self, query: &ListLoansQuery) -> LendingResult<PaginatedResponse<Loan>> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * limit;

        let mut query_builder = sqlx::QueryBuilder::new("SELECT * FROM loans WHERE 1=1");
        let mut count_builder = sqlx::QueryBuilder::new("SELECT COUNT(*) FROM loans WHERE 1=1");

        if let Some(borrower_id) = query.borrower_id {
            query_builder.push(" AND borrower_id = ");
            query_builder.push_bind(borrower_id);
            count_builder.push(" AND borrower_id = ");
            count_builder.push_bind(borrower_id);
        }

        if let Some(status) = query.status {
            query_builder.push(" AND status = ");
            query_builder.push_bind(status);
            count_builder.push(" AND status = ");
            count_builder.push_bind(status);
        }

        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.db_pool)
            .await?;

        query_builder.push(" ORDER BY originated_at DESC LIMIT ");
        query_builder.push_bind(limit);
        query_builder.push(" OFFSET ");
        query_builder.push_bind(offset);

        let loans = query_builder
            .build_query_as::<Loan>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(PaginatedResponse {
            data: loans,
            total,
            page,
            limit,
        })
    }

    /// Append-only repayment history for a loan
    pub async fn repayment_history(&self, loan_id: Uuid) -> LendingResult<Vec<RepaymentRecord>> {
        let records = sqlx::query_as::<_, RepaymentRecord>(
            "SELECT * FROM repayments WHERE loan_id = $1 ORDER BY created_at ASC",
        )
        .bind(loan_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(records)
    }

    /// Pure repayment preview over a snapshot; no locks, no mutation
    pub async fn preview_repayment(
        &self,
        loan_id: Uuid,
        amount: Decimal,
        collateral_value: Decimal,
        now: DateTime<Utc>,
    ) -> LendingResult<RepaymentPreview> {
        let loan = self.get_loan(loan_id).await?;
        let plan = RepaymentPlan::compute(&loan, amount, collateral_value, now)?;
        Ok(plan.preview())
    }

    /// Apply a repayment to an active loan.
    ///
    /// Amounts beyond the total owed are applied up to the owed balance and
    /// the overage comes back as refundable excess on the record. A repeated
    /// `request_id` replays the stored outcome instead of double-applying.
    pub async fn repay(
        &self,
        loan_id: Uuid,
        request: &RepayRequest,
        collateral_value: Decimal,
        now: DateTime<Utc>,
    ) -> LendingResult<RepaymentOutcome> {
        let mut tx = self.db_pool.begin().await?;

        let replay = sqlx::query_as::<_, RepaymentRecord>(
            "SELECT * FROM repayments WHERE request_id = $1 AND loan_id = $2",
        )
        .bind(request.request_id)
        .bind(loan_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(record) = replay {
            let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
                .bind(loan_id)
                .fetch_one(&mut *tx)
                .await?;
            let released = record.resulting_total_owed <= Decimal::ZERO;

            tracing::debug!(
                loan_id = %loan_id,
                request_id = %request.request_id,
                "Replaying already-applied repayment"
            );

            return Ok(RepaymentOutcome {
                loan,
                record,
                released,
                retried: true,
            });
        }

        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(loan_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(LendingError::LoanNotFound(loan_id))?;

        let plan = RepaymentPlan::compute(&loan, request.amount, collateral_value, now)?;

        let new_status = if plan.releases {
            LoanStatus::Completed
        } else {
            LoanStatus::Active
        };
        let closed_at = if plan.releases { Some(now) } else { None };

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET cumulative_repaid = $1, status = $2, closed_at = $3, updated_at = $4
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(plan.new_cumulative_repaid)
        .bind(new_status)
        .bind(closed_at)
        .bind(now)
        .bind(loan_id)
        .fetch_one(&mut *tx)
        .await?;

        if plan.releases {
            sqlx::query("DELETE FROM collateral_pledges WHERE loan_id = $1")
                .bind(loan_id)
                .execute(&mut *tx)
                .await?;
        }

        let record = sqlx::query_as::<_, RepaymentRecord>(
            r#"
            INSERT INTO repayments (
                id, loan_id, request_id, amount, excess, settlement_tx_hash,
                resulting_total_owed, resulting_health_factor, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(loan_id)
        .bind(request.request_id)
        .bind(plan.applied)
        .bind(plan.excess)
        .bind(&request.settlement_tx_hash)
        .bind(plan.resulting_total_owed)
        .bind(plan.resulting_health_factor)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            loan_id = %loan_id,
            applied = %plan.applied,
            excess = %plan.excess,
            released = plan.releases,
            "Repayment applied"
        );

        Ok(RepaymentOutcome {
            loan,
            record,
            released: plan.releases,
            retried: false,
        })
    }

    /// Liquidate an underwater loan.
    ///
    /// Eligibility is checked under the row lock against the supplied
    /// valuation; an ineligible loan fails with no effect. On success the
    /// loan is terminal and the pledge is released toward the liquidator.
    pub async fn liquidate(
        &self,
        loan_id: Uuid,
        collateral_value: Decimal,
        now: DateTime<Utc>,
    ) -> LendingResult<Loan> {
        let mut tx = self.db_pool.begin().await?;

        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(loan_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(LendingError::LoanNotFound(loan_id))?;

        if !loan.is_active() {
            return Err(LendingError::LoanNotActive(loan_id));
        }

        let report = risk::evaluate(&loan, collateral_value, now);
        if !report.liquidation_eligible {
            return Err(LendingError::NotEligible {
                loan_id,
                health_factor: report.health_factor.unwrap_or(Decimal::MAX),
                threshold: loan.liquidation_threshold,
            });
        }

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET status = $1, closed_at = $2, updated_at = $2
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(LoanStatus::Liquidated)
        .bind(now)
        .bind(loan_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM collateral_pledges WHERE loan_id = $1")
            .bind(loan_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::warn!(
            loan_id = %loan_id,
            collateral_value = %collateral_value,
            total_owed = %report.total_owed,
            "Loan liquidated"
        );

        Ok(loan)
    }
}
