//! Order API Handlers

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::models::{CreateOrderRequest, Order};
use crate::services::orders::OrderError;
use crate::utils::response::{AppError, Envelope};
use crate::AppState;

/// Create the order for a pending hold
/// POST /orders
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Envelope<Order>>), AppError> {
    let order = state.orders.create_order(req.hold_id).await?;
    Ok((StatusCode::CREATED, Json(Envelope::new(order))))
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidHold => AppError::validation("hold_id", "hold invalid or expired"),
            OrderError::Storage(e) => {
                tracing::error!("Order creation failed: {}", e);
                AppError::internal("storage failure")
            }
        }
    }
}
