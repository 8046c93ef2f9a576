//! Risk parameter handlers
//!
//! Read-only view of the lending policy book so the UI can render borrow
//! terms per collection without hardcoding them.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::LendingError;
use crate::models::ApiResponse;
use crate::risk::{RiskParameterBook, RiskParameters};

pub async fn get_collection_params(
    State(book): State<Arc<RiskParameterBook>>,
    Path(collection_id): Path<String>,
) -> Result<Json<ApiResponse<RiskParameters>>, LendingError> {
    let params = book.lookup(&collection_id)?;

    Ok(Json(ApiResponse::ok(params.clone())))
}
