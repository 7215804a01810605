//! Payment Webhook Handler
//!
//! The engine prepares (and seals) the exact response body and status code;
//! this handler only validates the payload shape and relays the outcome.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::models::{PaymentStatus, WebhookRequest};
use crate::services::webhooks::WebhookError;
use crate::utils::response::AppError;
use crate::AppState;

/// Receive a payment result
/// POST /payments/webhook
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WebhookRequest>,
) -> Result<Response, AppError> {
    req.validate()
        .map_err(|e| AppError::from_validation_errors(&e))?;

    // Closed status set: reject unknown tokens before any idempotency work.
    let status: PaymentStatus = req.data.status.parse().map_err(|_| {
        AppError::validation("data.status", "status must be one of: paid, failed")
    })?;

    let outcome = state
        .webhooks
        .handle_webhook(&req.idempotency_key, req.data.hold_id, status)
        .await?;

    let code = StatusCode::from_u16(outcome.status_code as u16)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Ok((code, Json(outcome.body)).into_response())
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::ConflictingResult => {
                AppError::conflict("conflicting payment result already recorded for this hold")
            }
            WebhookError::Storage(e) => {
                tracing::error!("Webhook processing failed: {}", e);
                AppError::internal("storage failure")
            }
        }
    }
}
