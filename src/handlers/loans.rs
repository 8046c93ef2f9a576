//! Loan lifecycle handlers
//!
//! Thin layer over the lending service: extract, call, wrap. The clock is
//! sampled here so the engine below stays pure in `now`.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::error::LendingError;
use crate::ledger::model::{ListLoansQuery, OpenLoanRequest, RepayRequest, RepaymentRecord, RepaymentPreview};
use crate::lending::{
    BorrowQuote, BorrowQuoteRequest, LiquidateRequest, LiquidationResult, LoanOpened, LoanSummary,
    PreviewRepaymentRequest, RepaymentResult,
};
use crate::models::{ApiResponse, PaginatedResponse};
use crate::state::AppLendingService;

pub async fn quote_max_borrow(
    State(service): State<Arc<AppLendingService>>,
    Json(request): Json<BorrowQuoteRequest>,
) -> Result<Json<ApiResponse<BorrowQuote>>, LendingError> {
    let quote = service.quote_max_borrow(&request).await?;

    Ok(Json(ApiResponse::ok(quote)))
}

pub async fn open_loan(
    State(service): State<Arc<AppLendingService>>,
    Json(request): Json<OpenLoanRequest>,
) -> Result<Json<ApiResponse<LoanOpened>>, LendingError> {
    let opened = service.open_loan(request, Utc::now()).await?;

    Ok(Json(ApiResponse::ok(opened)))
}

pub async fn list_loans(
    State(service): State<Arc<AppLendingService>>,
    Query(query): Query<ListLoansQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<LoanSummary>>>, LendingError> {
    let loans = service.list_loans(&query, Utc::now()).await?;

    Ok(Json(ApiResponse::ok(loans)))
}

pub async fn get_loan(
    State(service): State<Arc<AppLendingService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<LoanSummary>>, LendingError> {
    let summary = service.get_loan_summary(id, Utc::now()).await?;

    Ok(Json(ApiResponse::ok(summary)))
}

pub async fn preview_repayment(
    State(service): State<Arc<AppLendingService>>,
    Path(id): Path<Uuid>,
    Json(request): Json<PreviewRepaymentRequest>,
) -> Result<Json<ApiResponse<RepaymentPreview>>, LendingError> {
    let preview = service.preview_repayment(id, &request, Utc::now()).await?;

    Ok(Json(ApiResponse::ok(preview)))
}

pub async fn repay_loan(
    State(service): State<Arc<AppLendingService>>,
    Path(id): Path<Uuid>,
    Json(request): Json<RepayRequest>,
) -> Result<Json<ApiResponse<RepaymentResult>>, LendingError> {
    let result = service.repay(id, request, Utc::now()).await?;

    Ok(Json(ApiResponse::ok(result)))
}

pub async fn list_repayments(
    State(service): State<Arc<AppLendingService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<RepaymentRecord>>>, LendingError> {
    let records = service.repayment_history(id).await?;

    Ok(Json(ApiResponse::ok(records)))
}

pub async fn liquidate_loan(
    State(service): State<Arc<AppLendingService>>,
    Path(id): Path<Uuid>,
    Json(request): Json<LiquidateRequest>,
) -> Result<Json<ApiResponse<LiquidationResult>>, LendingError> {
    let result = service.liquidate(id, &request, Utc::now()).await?;

    Ok(Json(ApiResponse::ok(result)))
}
