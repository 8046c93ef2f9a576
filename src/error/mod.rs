//! Centralized error handling for RelicVault
//!
//! One error type covers both the lending domain (validation and state-machine
//! failures the engine raises before any mutation) and the HTTP layer, with
//! proper status code mapping and JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Lending engine error type with HTTP status code mapping
#[derive(Error, Debug)]
pub enum LendingError {
    #[error("Unknown collateral class: {0}")]
    UnknownCollateralClass(String),

    #[error("Collateral {0} is already pledged to another loan")]
    CollateralAlreadyPledged(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    #[error("Requested principal {requested} exceeds max LTV borrow limit {max_borrow}")]
    ExceedsMaxLtv {
        requested: Decimal,
        max_borrow: Decimal,
    },

    #[error("Loan {0} is not active")]
    LoanNotActive(Uuid),

    #[error("Loan {loan_id} is not eligible for liquidation: health factor {health_factor} >= threshold {threshold}")]
    NotEligible {
        loan_id: Uuid,
        health_factor: Decimal,
        threshold: Decimal,
    },

    #[error("Valuation for {asset_id} is stale: {age_seconds}s old, max {max_age_seconds}s")]
    StaleValuation {
        asset_id: String,
        age_seconds: i64,
        max_age_seconds: i64,
    },

    #[error("Settlement failed: {0}")]
    SettlementFailed(String),

    #[error("Loan not found: {0}")]
    LoanNotFound(Uuid),

    #[error("Valuation provider error: {0}")]
    ValuationUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

/// Error details in the response
#[derive(Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl LendingError {
    /// Get the error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            LendingError::UnknownCollateralClass(_) => "UNKNOWN_COLLATERAL_CLASS",
            LendingError::CollateralAlreadyPledged(_) => "COLLATERAL_ALREADY_PLEDGED",
            LendingError::InvalidAmount(_) => "INVALID_AMOUNT",
            LendingError::ExceedsMaxLtv { .. } => "EXCEEDS_MAX_LTV",
            LendingError::LoanNotActive(_) => "LOAN_NOT_ACTIVE",
            LendingError::NotEligible { .. } => "NOT_ELIGIBLE",
            LendingError::StaleValuation { .. } => "STALE_VALUATION",
            LendingError::SettlementFailed(_) => "SETTLEMENT_FAILED",
            LendingError::LoanNotFound(_) => "LOAN_NOT_FOUND",
            LendingError::ValuationUnavailable(_) => "VALUATION_UNAVAILABLE",
            LendingError::DatabaseError(_) => "DATABASE_ERROR",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            LendingError::UnknownCollateralClass(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LendingError::CollateralAlreadyPledged(_) => StatusCode::CONFLICT,
            LendingError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
            LendingError::ExceedsMaxLtv { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            LendingError::LoanNotActive(_) => StatusCode::CONFLICT,
            LendingError::NotEligible { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            LendingError::StaleValuation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            LendingError::SettlementFailed(_) => StatusCode::BAD_GATEWAY,
            LendingError::LoanNotFound(_) => StatusCode::NOT_FOUND,
            LendingError::ValuationUnavailable(_) => StatusCode::BAD_GATEWAY,
            LendingError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LendingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        match &self {
            LendingError::DatabaseError(_)
            | LendingError::SettlementFailed(_)
            | LendingError::ValuationUnavailable(_) => {
                tracing::error!(error = %message, code = %error_code, "Server error occurred");
            }
            _ => {
                tracing::debug!(error = %message, code = %error_code, "Request rejected");
            }
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code: error_code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

// Convenience conversions from common error types

impl From<sqlx::Error> for LendingError {
    fn from(err: sqlx::Error) -> Self {
        LendingError::DatabaseError(err.to_string())
    }
}

impl From<reqwest::Error> for LendingError {
    fn from(err: reqwest::Error) -> Self {
        LendingError::ValuationUnavailable(err.to_string())
    }
}

/// Result type alias using LendingError
pub type LendingResult<T> = Result<T, LendingError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            LendingError::UnknownCollateralClass("relics".to_string()).error_code(),
            "UNKNOWN_COLLATERAL_CLASS"
        );
        assert_eq!(
            LendingError::CollateralAlreadyPledged("relics:42".to_string()).error_code(),
            "COLLATERAL_ALREADY_PLEDGED"
        );
        assert_eq!(
            LendingError::InvalidAmount(dec!(-1)).error_code(),
            "INVALID_AMOUNT"
        );
        assert_eq!(
            LendingError::SettlementFailed("reverted".to_string()).error_code(),
            "SETTLEMENT_FAILED"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            LendingError::LoanNotFound(Uuid::nil()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            LendingError::CollateralAlreadyPledged("relics:42".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            LendingError::ExceedsMaxLtv {
                requested: dec!(30),
                max_borrow: dec!(22.6),
            }
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            LendingError::SettlementFailed("reverted".to_string()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            LendingError::DatabaseError("boom".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_not_active_message_carries_loan_id() {
        let id = Uuid::new_v4();
        let err = LendingError::LoanNotActive(id);
        assert!(err.to_string().contains(&id.to_string()));
    }
}
