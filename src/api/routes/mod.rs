use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers;
use crate::AppState;

pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/products/:id", get(handlers::product::get_product))
        .route("/holds", post(handlers::hold::create_hold))
        .route("/orders", post(handlers::order::create_order))
        .route("/payments/webhook", post(handlers::webhook::payment_webhook))
        // Internal endpoints (seeding / load tests), not part of the public surface
        .route("/internal/products", post(handlers::product::create_product))
}
