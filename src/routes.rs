//! Route definitions for the RelicVault API

use axum::{routing::get, routing::post, Router};

use crate::handlers::*;
use crate::state::AppState;

// Loan lifecycle routes
pub fn loan_routes() -> Router<AppState> {
    Router::new()
        .route("/api/loans/quote", post(quote_max_borrow))
        .route("/api/loans", post(open_loan))
        .route("/api/loans", get(list_loans))
        .route("/api/loans/:id", get(get_loan))
        .route("/api/loans/:id/preview-repayment", post(preview_repayment))
        .route("/api/loans/:id/repayments", post(repay_loan))
        .route("/api/loans/:id/repayments", get(list_repayments))
        .route("/api/loans/:id/liquidate", post(liquidate_loan))
}

// Risk parameter routes
pub fn risk_param_routes() -> Router<AppState> {
    Router::new().route("/api/collections/:id/risk-parameters", get(get_collection_params))
}
