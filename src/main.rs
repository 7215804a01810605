use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::State, middleware as axum_middleware, routing::get, Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod cache;
mod clock;
mod config;
mod db;
mod metrics;
mod models;
mod services;
mod store;
mod utils;

use crate::cache::{Invalidator, ProductCache};
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::db::Database;
use crate::services::holds::HoldService;
use crate::services::orders::OrderService;
use crate::services::reconciliation::{ReconciliationQueue, ReconciliationService};
use crate::services::sweeper::SweeperService;
use crate::services::webhooks::WebhookService;
use crate::store::postgres::PgStore;

pub struct AppState {
    pub config: AppConfig,
    pub store: PgStore,
    pub clock: Arc<dyn Clock>,
    pub product_cache: Arc<ProductCache>,
    pub holds: HoldService<PgStore>,
    pub orders: OrderService<PgStore>,
    pub webhooks: WebhookService<PgStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flash_checkout_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    tracing::info!("Starting Flash Checkout Backend v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.environment);

    // Initialize database
    let db = Database::connect(&config).await?;
    tracing::info!("Database connected");
    db.init_schema().await?;

    // Initialize product cache (Redis)
    let product_cache = Arc::new(
        ProductCache::connect(&config.redis_url, config.product_cache_ttl_secs).await,
    );
    if product_cache.is_available() {
        tracing::info!("Product cache initialized with Redis at {}", config.redis_url);
    } else {
        tracing::warn!("Product cache running without Redis (graceful degradation)");
    }

    let store = PgStore::new(db.pool.clone());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let invalidator: Arc<dyn Invalidator> = product_cache.clone();

    // `expire-holds`: run a single expiration pass and exit.
    if std::env::args().nth(1).as_deref() == Some("expire-holds") {
        let sweeper = SweeperService::new(store, invalidator, clock);
        match sweeper.run_once().await {
            Ok(swept) => {
                tracing::info!("Expiration pass complete: {} holds expired", swept);
                return Ok(());
            }
            Err(e) => {
                tracing::error!("Expiration pass failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    // Install Prometheus recorder
    let prometheus = metrics::init_metrics();
    tracing::info!("Prometheus recorder installed");

    // Start reconciliation worker; the order engine enqueues after commit
    let (reconciliation_queue, reconciliation_rx) = ReconciliationQueue::new();
    ReconciliationService::new(store.clone(), invalidator.clone()).spawn(reconciliation_rx);
    tracing::info!("Reconciliation worker spawned");

    // Build engines
    let holds = HoldService::new(
        store.clone(),
        invalidator.clone(),
        clock.clone(),
        config.hold_ttl(),
    );
    let orders = OrderService::new(store.clone(), clock.clone(), reconciliation_queue);
    let webhooks = WebhookService::new(store.clone(), invalidator.clone(), clock.clone());

    // Start expiration sweeper
    let sweeper = Arc::new(SweeperService::new(
        store.clone(),
        invalidator,
        clock.clone(),
    ));
    sweeper.start(config.sweep_interval());
    tracing::info!(
        "Expiration sweeper started (every {}s, hold TTL {}s)",
        config.sweep_interval_secs,
        config.hold_ttl_secs
    );

    // Build application state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        clock,
        product_cache,
        holds,
        orders,
        webhooks,
    });

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(move || async move { prometheus.render() }))
        .nest("/api", api::routes::create_router())
        .layer(axum_middleware::from_fn(
            api::middleware::metrics::metrics_middleware,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Liveness probe. The cache is checked with a real round trip but does not
/// fail the probe: the service degrades to direct store reads without Redis.
async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let cache = if state.product_cache.ping().await {
        "up"
    } else {
        "down"
    };
    Json(json!({ "status": "ok", "cache": cache }))
}
