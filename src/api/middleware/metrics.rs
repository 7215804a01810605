//! HTTP Metrics Middleware
//!
//! Records request count and duration per method, matched route, and status.

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::metrics;

pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();

    // Use the matched route template so path parameters do not explode label
    // cardinality.
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    metrics::record_http_request(&method, &path, response.status().as_u16(), duration);

    response
}
