//! EduShield Backend Server
//!
//! Risk-detection and alerting engine for the EduShield school platform.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     EDUSHIELD SERVER                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌──────────────┐  ┌───────────────────────┐ │
//! │  │  API      │  │  Detection   │  │  Notification         │ │
//! │  │  Boundary │  │  Pipeline    │  │  Dispatcher           │ │
//! │  │  (Axum)   │  │  + Sweeps    │  │  (SMS / Email)        │ │
//! │  └─────┬─────┘  └──────┬───────┘  └───────────┬───────────┘ │
//! │        └───────────────┼──────────────────────┘              │
//! │                        ▼                                     │
//! │                 ┌─────────────┐                              │
//! │                 │ PostgreSQL  │                              │
//! │                 └─────────────┘                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod db;
mod models;
mod detection;
mod notify;
mod handlers;
mod middleware;
mod error;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use detection::config::RiskThresholds;
use detection::sweep::SweepRegistry;
use notify::Notifier;

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "edushield_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();
    let thresholds = RiskThresholds::load(config.risk_config_path.as_deref())
        .expect("Failed to load detection thresholds");

    tracing::info!("EduShield Server starting...");
    tracing::info!("Database: {}", config.database_url.split('@').last().unwrap_or("***"));

    // Initialize database pool
    let pool = db::create_pool(&config.database_url).await
        .expect("Failed to create database pool");

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await
        .expect("Failed to run migrations");

    // Build application state
    let notifier = Arc::new(Notifier::from_config(&config));
    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
        thresholds: Arc::new(thresholds),
        notifier: notifier.clone(),
        sweeps: Arc::new(SweepRegistry::new()),
    };

    // Background pending-message sweep
    notify::start_retry_loop(notifier, pool, config.retry_sweep_interval_secs);

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub config: config::Config,
    pub thresholds: Arc<RiskThresholds>,
    pub notifier: Arc<Notifier>,
    pub sweeps: Arc<SweepRegistry>,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))

        // Detection
        .route("/api/v1/detection/students/:id", post(handlers::detection::detect_student))
        .route("/api/v1/detection/students/:id/socioeconomic", post(handlers::detection::detect_student_socioeconomic))
        .route("/api/v1/detection/schools/:id", post(handlers::detection::detect_school))
        .route("/api/v1/detection/sweeps/:id", get(handlers::detection::sweep_status))
        .route("/api/v1/students/:id/risk-level/recompute", post(handlers::detection::recompute_risk_level))

        // Risk flags
        .route("/api/v1/flags", get(handlers::flags::list))
        .route("/api/v1/flags", post(handlers::flags::create))
        .route("/api/v1/flags/:id", get(handlers::flags::get))
        .route("/api/v1/flags/:id", delete(handlers::flags::delete))
        .route("/api/v1/flags/:id/resolve", put(handlers::flags::resolve))

        // Alerts & messages
        .route("/api/v1/alerts", post(handlers::alerts::send))
        .route("/api/v1/messages", get(handlers::alerts::list))
        .route("/api/v1/messages/:id", get(handlers::alerts::get))
        .route("/api/v1/messages/:id/retry", post(handlers::alerts::retry))
        .route("/api/v1/messages/process-pending", post(handlers::alerts::process_pending))

        // Reports
        .route("/api/v1/reports/risk-summary", get(handlers::reports::risk_summary))

        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
