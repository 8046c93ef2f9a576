//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::ledger::LoanLedger;
use crate::lending::LendingService;
use crate::risk::RiskParameterBook;
use crate::settlement::HttpSettlementLayer;
use crate::valuation::HttpValuationProvider;

/// The lending service as wired in production
pub type AppLendingService = LendingService<HttpValuationProvider, HttpSettlementLayer>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub ledger: LoanLedger,
    pub lending: Arc<AppLendingService>,
    pub params: Arc<RiskParameterBook>,
}

impl AppState {
    pub fn new(
        db_pool: PgPool,
        ledger: LoanLedger,
        lending: Arc<AppLendingService>,
        params: Arc<RiskParameterBook>,
    ) -> Self {
        Self {
            db_pool,
            ledger,
            lending,
            params,
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.db_pool.clone()
    }
}

impl FromRef<AppState> for LoanLedger {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ledger.clone()
    }
}

impl FromRef<AppState> for Arc<AppLendingService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.lending.clone()
    }
}

impl FromRef<AppState> for Arc<RiskParameterBook> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.params.clone()
    }
}
