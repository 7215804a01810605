//! Product API Handlers
//!
//! The read path goes through the Redis cache first and falls back to the
//! store; the internal create endpoint exists for seeding and load tests.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::models::{CreateProductRequest, Product, ProductResponse};
use crate::store::Store;
use crate::utils::response::{AppError, Envelope};
use crate::AppState;

/// Get product details
/// GET /products/:id
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<ProductResponse>>, AppError> {
    if let Some(product) = state.product_cache.get_product(id).await {
        return Ok(Json(Envelope::new(product.into())));
    }

    let product = state.store.get_product(id).await.map_err(|e| {
        tracing::error!("Failed to load product {}: {}", id, e);
        AppError::internal("storage failure")
    })?;
    let product = product.ok_or_else(|| AppError::not_found("product not found"))?;

    state.product_cache.set_product(&product).await;
    Ok(Json(Envelope::new(product.into())))
}

/// Create a product (internal seeding endpoint)
/// POST /internal/products
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Envelope<ProductResponse>>), AppError> {
    req.validate()
        .map_err(|e| AppError::from_validation_errors(&e))?;
    if req.price < Decimal::ZERO {
        return Err(AppError::validation("price", "price must not be negative"));
    }

    let now = state.clock.now();
    let product = Product {
        id: Uuid::new_v4(),
        name: req.name,
        total_stock: req.total_stock,
        price: req
            .price
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        created_at: now,
        updated_at: now,
    };
    state.store.insert_product(&product).await.map_err(|e| {
        tracing::error!("Failed to create product: {}", e);
        AppError::internal("storage failure")
    })?;

    tracing::info!(
        "Product {} created: {} ({} in stock at {})",
        product.id,
        product.name,
        product.total_stock,
        product.price
    );
    Ok((StatusCode::CREATED, Json(Envelope::new(product.into()))))
}
