//! Hold API Handlers

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use validator::Validate;

use crate::models::{CreateHoldRequest, HoldReceipt};
use crate::services::holds::HoldError;
use crate::utils::response::{AppError, Envelope};
use crate::AppState;

/// Reserve stock
/// POST /holds
pub async fn create_hold(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateHoldRequest>,
) -> Result<(StatusCode, Json<Envelope<HoldReceipt>>), AppError> {
    req.validate()
        .map_err(|e| AppError::from_validation_errors(&e))?;

    let receipt = state.holds.create_hold(req.product_id, req.qty).await?;
    Ok((StatusCode::CREATED, Json(Envelope::new(receipt))))
}

impl From<HoldError> for AppError {
    fn from(err: HoldError) -> Self {
        match err {
            HoldError::UnknownProduct => AppError::validation("product_id", "product does not exist"),
            HoldError::InsufficientStock { .. } => AppError::validation("qty", "insufficient stock"),
            HoldError::NonPositiveQty => {
                AppError::validation("qty", "qty must be a positive integer")
            }
            HoldError::Storage(e) => {
                tracing::error!("Hold creation failed: {}", e);
                AppError::internal("storage failure")
            }
        }
    }
}
