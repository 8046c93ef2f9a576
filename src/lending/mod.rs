//! Lending service facade
//!
//! Orchestrates the borrow/repay/liquidate flows across the valuation
//! provider, the risk engine, the loan ledger and the settlement seam.
//! Quotes are guidance only: `open_loan` always re-validates against a fresh
//! valuation, so a stale quote can never be exploited. Listings recompute
//! accrual and health factor at call time rather than trusting anything
//! cached.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LendingResult;
use crate::ledger::model::{
    ListLoansQuery, Loan, LoanStatus, OpenLoanRequest, RepayRequest, RepaymentPreview,
    RepaymentRecord,
};
use crate::ledger::service::{LoanLedger, RepaymentOutcome};
use crate::models::{CollateralAsset, PaginatedResponse};
use crate::risk::{self, HealthReport, RiskBand, RiskParameterBook};
use crate::settlement::{SettlementInstruction, SettlementLayer};
use crate::valuation::ValuationProvider;

/// Decimal places for derived figures in UI-facing summaries. The engine
/// itself keeps full precision; rounding happens only here.
const SUMMARY_DP: u32 = 4;

/// Request for a max-borrow quote
#[derive(Debug, Deserialize)]
pub struct BorrowQuoteRequest {
    pub collection_id: String,
    pub token_id: String,
}

/// Max-borrow guidance for an asset at its current valuation
#[derive(Debug, Serialize)]
pub struct BorrowQuote {
    pub asset_id: String,
    pub collection_id: String,
    pub collateral_value: Decimal,
    pub valued_at: DateTime<Utc>,
    pub max_ltv_bps: i32,
    pub max_borrow: Decimal,
}

/// Request for a pure repayment preview
#[derive(Debug, Deserialize)]
pub struct PreviewRepaymentRequest {
    pub amount: Decimal,
}

/// Request to liquidate an underwater loan
#[derive(Debug, Deserialize)]
pub struct LiquidateRequest {
    /// Party receiving the seized collateral
    pub liquidator: String,
}

/// A freshly opened loan with its initial position
#[derive(Debug, Serialize)]
pub struct LoanOpened {
    pub loan: Loan,
    pub health: HealthReport,
    /// Principal transfer the settlement layer must now perform
    pub disbursement: SettlementInstruction,
}

/// Committed repayment plus any follow-up settlement work
#[derive(Debug, Serialize)]
pub struct RepaymentResult {
    pub loan: Loan,
    pub record: RepaymentRecord,
    pub released: bool,
    pub retried: bool,
    /// Present when the repayment completed the loan: the collateral must
    /// now be returned to the borrower
    pub collateral_release: Option<SettlementInstruction>,
}

/// Committed liquidation plus the seizure the settlement layer must perform
#[derive(Debug, Serialize)]
pub struct LiquidationResult {
    pub loan: Loan,
    pub seizure: SettlementInstruction,
}

/// UI-facing loan summary, derived figures recomputed at call time
#[derive(Debug, Serialize)]
pub struct LoanSummary {
    pub loan_id: Uuid,
    pub asset_id: String,
    pub collection_id: String,
    pub borrower_id: Uuid,
    pub status: LoanStatus,
    pub principal: Decimal,
    pub cumulative_repaid: Decimal,
    pub accrued_interest: Decimal,
    pub total_owed: Decimal,
    pub collateral_value: Decimal,
    pub health_factor: Option<Decimal>,
    pub risk_band: RiskBand,
    pub liquidation_eligible: bool,
    pub days_active: i64,
    pub originated_at: DateTime<Utc>,
}

impl LoanSummary {
    /// Build a summary from a loan and a current collateral valuation
    pub fn build(loan: &Loan, collateral_value: Decimal, now: DateTime<Utc>) -> Self {
        let report = risk::evaluate(loan, collateral_value, now);

        Self {
            loan_id: loan.id,
            asset_id: loan.asset_id.clone(),
            collection_id: loan.collection_id.clone(),
            borrower_id: loan.borrower_id,
            status: loan.status,
            principal: loan.principal,
            cumulative_repaid: loan.cumulative_repaid,
            accrued_interest: loan.accrued_interest(now).round_dp(SUMMARY_DP),
            total_owed: report.total_owed.round_dp(SUMMARY_DP),
            collateral_value,
            health_factor: report.health_factor.map(|hf| hf.round_dp(SUMMARY_DP)),
            risk_band: report.risk_band,
            liquidation_eligible: report.liquidation_eligible,
            days_active: loan.days_active(now),
            originated_at: loan.originated_at,
        }
    }
}

/// Orchestration facade over the lending engine
pub struct LendingService<V, S> {
    ledger: LoanLedger,
    params: Arc<RiskParameterBook>,
    valuation: Arc<V>,
    settlement: Arc<S>,
    max_valuation_age_seconds: i64,
}

impl<V, S> LendingService<V, S>
where
    V: ValuationProvider,
    S: SettlementLayer,
{
    pub fn new(
        ledger: LoanLedger,
        params: Arc<RiskParameterBook>,
        valuation: Arc<V>,
        settlement: Arc<S>,
        max_valuation_age_seconds: i64,
    ) -> Self {
        Self {
            ledger,
            params,
            valuation,
            settlement,
            max_valuation_age_seconds,
        }
    }

    /// Max-borrow guidance for an asset: current value times the collection's
    /// max LTV. Advisory only; origination re-validates independently.
    pub async fn quote_max_borrow(&self, request: &BorrowQuoteRequest) -> LendingResult<BorrowQuote> {
        let params = self.params.lookup(&request.collection_id)?;
        let asset = CollateralAsset::new(&request.collection_id, &request.token_id);
        let valuation = self.valuation.current_value(&asset.asset_id()).await?;

        Ok(BorrowQuote {
            asset_id: valuation.asset_id.clone(),
            collection_id: request.collection_id.clone(),
            collateral_value: valuation.value,
            valued_at: valuation.observed_at,
            max_ltv_bps: params.max_ltv_bps,
            max_borrow: params.max_borrow(valuation.value),
        })
    }

    /// Open a loan once the settlement layer confirms the collateral custody
    /// transfer. Fails closed: settlement verification, valuation freshness
    /// and ledger validation all run before anything is written.
    pub async fn open_loan(
        &self,
        request: OpenLoanRequest,
        now: DateTime<Utc>,
    ) -> LendingResult<LoanOpened> {
        let params = self.params.lookup(&request.collection_id)?;
        let asset = CollateralAsset::new(&request.collection_id, &request.token_id);

        self.settlement
            .verify_confirmation(&request.settlement_tx_hash)
            .await?;

        let valuation = self.valuation.current_value(&asset.asset_id()).await?;
        valuation.ensure_fresh(now, self.max_valuation_age_seconds)?;

        let loan = self
            .ledger
            .open_loan(
                &asset,
                params,
                &valuation,
                request.principal,
                &request.borrow_token,
                request.borrower_id,
                now,
            )
            .await?;

        let health = risk::evaluate(&loan, valuation.value, now);
        let disbursement = SettlementInstruction::disburse_principal(&loan);

        Ok(LoanOpened {
            loan,
            health,
            disbursement,
        })
    }

    /// Loan summary with live accrual and health factor
    pub async fn get_loan_summary(
        &self,
        loan_id: Uuid,
        now: DateTime<Utc>,
    ) -> LendingResult<LoanSummary> {
        let loan = self.ledger.get_loan(loan_id).await?;
        let valuation = self.valuation.current_value(&loan.asset_id).await?;

        Ok(LoanSummary::build(&loan, valuation.value, now))
    }

    /// List loans, recomputing every derived figure at call time
    pub async fn list_loans(
        &self,
        query: &ListLoansQuery,
        now: DateTime<Utc>,
    ) -> LendingResult<PaginatedResponse<LoanSummary>> {
        let loans = self.ledger.list_loans(query).await?;

        let mut summaries = Vec::with_capacity(loans.data.len());
        for loan in &loans.data {
            let valuation = self.valuation.current_value(&loan.asset_id).await?;
            summaries.push(LoanSummary::build(loan, valuation.value, now));
        }

        Ok(PaginatedResponse {
            data: summaries,
            total: loans.total,
            page: loans.page,
            limit: loans.limit,
        })
    }

    /// Pure repayment preview; mutates nothing
    pub async fn preview_repayment(
        &self,
        loan_id: Uuid,
        request: &PreviewRepaymentRequest,
        now: DateTime<Utc>,
    ) -> LendingResult<RepaymentPreview> {
        let loan = self.ledger.get_loan(loan_id).await?;
        let valuation = self.valuation.current_value(&loan.asset_id).await?;

        self.ledger
            .preview_repayment(loan_id, request.amount, valuation.value, now)
            .await
    }

    /// Apply a repayment after its settlement transaction confirms.
    /// Safe to retry: the request id makes replays return the original
    /// outcome instead of double-applying.
    pub async fn repay(
        &self,
        loan_id: Uuid,
        request: RepayRequest,
        now: DateTime<Utc>,
    ) -> LendingResult<RepaymentResult> {
        self.settlement
            .verify_confirmation(&request.settlement_tx_hash)
            .await?;

        let loan = self.ledger.get_loan(loan_id).await?;
        let valuation = self.valuation.current_value(&loan.asset_id).await?;

        let RepaymentOutcome {
            loan,
            record,
            released,
            retried,
        } = self
            .ledger
            .repay(loan_id, &request, valuation.value, now)
            .await?;

        let collateral_release = released.then(|| SettlementInstruction::release_collateral(&loan));

        Ok(RepaymentResult {
            loan,
            record,
            released,
            retried,
            collateral_release,
        })
    }

    /// Liquidate a loan whose health factor fell below its threshold.
    /// Requires a fresh valuation; eligibility is decided under the loan's
    /// row lock so it cannot race a concurrent repayment.
    pub async fn liquidate(
        &self,
        loan_id: Uuid,
        request: &LiquidateRequest,
        now: DateTime<Utc>,
    ) -> LendingResult<LiquidationResult> {
        let loan = self.ledger.get_loan(loan_id).await?;
        let valuation = self.valuation.current_value(&loan.asset_id).await?;
        valuation.ensure_fresh(now, self.max_valuation_age_seconds)?;

        let loan = self.ledger.liquidate(loan_id, valuation.value, now).await?;
        let seizure = SettlementInstruction::seize_collateral(&loan, &request.liquidator);

        Ok(LiquidationResult { loan, seizure })
    }

    /// Repayment audit trail for a loan
    pub async fn repayment_history(&self, loan_id: Uuid) -> LendingResult<Vec<RepaymentRecord>> {
        self.ledger.get_loan(loan_id).await?;
        self.ledger.repayment_history(loan_id).await
    }
}
