use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod error;
mod metrics;
mod models;
mod services;
mod store;
mod websocket;
mod workers;

use crate::config::AppConfig;
use crate::services::engine::OrderEngine;
use crate::services::{EventBus, SettlementScheduler};
use crate::store::PgStore;

pub struct AppState {
    pub config: AppConfig,
    pub engine: Arc<OrderEngine<PgStore>>,
    pub event_bus: Arc<EventBus>,
    pub settlement: Arc<SettlementScheduler<PgStore>>,
    pub metrics_handle: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "omc_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    tracing::info!("starting order management core v{}", env!("CARGO_PKG_VERSION"));

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&config.database_url)
        .await?;
    tracing::info!("database connected");

    let metrics_handle = metrics::init_metrics();

    let store = PgStore::new(pool.clone());
    let event_bus = Arc::new(EventBus::new());
    let settlement = SettlementScheduler::new(store.clone(), event_bus.clone(), config.settlement_delay_secs);

    let recovered = settlement.recover().await?;
    tracing::info!(recovered, "settlement scheduler recovery complete");

    let (work_tx, work_rx) = workers::pool::work_channel();

    let engine = Arc::new(OrderEngine::new(
        store,
        event_bus.clone(),
        settlement.clone(),
        work_tx,
        config.workflow_max_retries,
        std::time::Duration::from_millis(config.workflow_retry_backoff_ms),
    ));

    workers::pool::spawn_worker_pool(engine.clone(), work_rx, config.workflow_worker_count);
    tracing::info!(workers = config.workflow_worker_count, "workflow worker pool started");

    let state = Arc::new(AppState {
        config: config.clone(),
        engine,
        event_bus,
        settlement,
        metrics_handle,
    });

    let app = Router::new()
        .route("/health", get(api::handlers::health::health_check))
        .route("/metrics", get(api::handlers::metrics::render_metrics))
        .nest("/api/v1", api::routes::create_router(state.clone()))
        .nest("/ws", websocket::routes::create_router(state.clone()))
        // route_layer, not layer: it must run after this router's own route
        // matching has populated MatchedPath, or every request falls back to
        // the raw URI (unbounded label cardinality from order ids).
        .route_layer(axum::middleware::from_fn(api::middleware::metrics_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
