//! Manufacturing Predictor API
//!
//! Predicts machine downtime from operating parameters.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  MANUFACTURING PREDICTOR                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌──────────────────────────────────────┐  │
//! │  │  API      │   │  MachineLearningModel                │  │
//! │  │  (Axum)   │──▶│  ┌──────────────┐  ┌──────────────┐  │  │
//! │  │           │   │  │ DatasetStore │─▶│ Scaler +     │  │  │
//! │  │ /upload   │   │  │ (latest CSV) │  │ Logistic Reg │  │  │
//! │  │ /train    │   │  └──────────────┘  └──────────────┘  │  │
//! │  │ /predict  │   └──────────────────────────────────────┘  │
//! │  └───────────┘                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod models;
mod handlers;
mod error;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use models::MachineLearningModel;

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "downtime_predictor=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Manufacturing Predictor starting ({})...", config.environment);

    // Build application state
    let model = MachineLearningModel::new(config.training_options());
    tracing::info!("Training options: {:?}", model.options());

    let state = AppState {
        model: Arc::new(model),
        config: config.clone(),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from((config.host, config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<MachineLearningModel>,
    pub config: config::Config,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/", get(handlers::index::root))
        .route("/health", get(handlers::health::check))
        .route("/model", get(handlers::model::status))
        .route("/upload", post(handlers::data::upload))
        .route("/train", post(handlers::model::train))
        .route("/predict", post(handlers::model::predict))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes));

    Router::new()
        .merge(api_routes)
        .fallback(not_found)
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

async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}
