//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use crate::inference::LoadedModels;

#[derive(Serialize)]
pub struct RootResponse {
    message: &'static str,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    message: &'static str,
    version: &'static str,
    timestamp: i64,
    models: LoadedModels,
}

/// Liveness banner
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Defect detection API is running",
    })
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        message: "Defect prediction API is running",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
        models: state.registry.loaded(),
    })
}
