//! Defect Inference Server
//!
//! HTTP front for the two defect models used on the production floor.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    DEFECT INFERENCE                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌──────────────────┐  ┌──────────────────┐ │
//! │  │  API      │  │  Model Registry  │  │  Prediction      │ │
//! │  │  (Axum)   │─▶│  image / tabular │  │  History (JWT)   │ │
//! │  └─────┬─────┘  │  (ONNX Runtime)  │  └────────┬─────────┘ │
//! │        │        └──────────────────┘           │           │
//! │        └─────────────────┬─────────────────────┘           │
//! │                          ▼                                  │
//! │                   ┌─────────────┐                          │
//! │                   │ PostgreSQL  │ (optional)               │
//! │                   └─────────────┘                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod inference;
pub mod middleware;
pub mod models;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
    middleware as axum_middleware,
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};

pub use error::{AppError, AppResult};

use config::Config;
use inference::ModelRegistry;
use models::{CreatePrediction, Prediction};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub pool: Option<sqlx::PgPool>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config, registry: ModelRegistry, pool: Option<sqlx::PgPool>) -> Self {
        Self {
            registry: Arc::new(registry),
            pool,
            config,
        }
    }

    /// Persist a prediction in the background, if history is enabled.
    /// Failures are logged and never reach the caller.
    pub fn record_prediction(&self, data: CreatePrediction) {
        let Some(pool) = self.pool.clone() else {
            return;
        };

        tokio::spawn(async move {
            if let Err(e) = Prediction::create(&pool, data).await {
                tracing::warn!("Failed to record prediction: {}", e);
            }
        });
    }
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::check))
        .route("/models", get(handlers::models::status))
        .route("/predict", post(handlers::tabular::predict))
        .route("/image/predict", post(handlers::image::predict));

    // History routes (user JWT auth)
    let history_routes = Router::new()
        .route("/api/v1/predictions", get(handlers::predictions::list))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_user_auth
        ));

    Router::new()
        .merge(public_routes)
        .merge(history_routes)
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
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
