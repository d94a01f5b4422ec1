//! Loaded model status

use axum::{extract::State, Json};

use crate::AppState;
use crate::inference::RegistryStatus;

pub async fn status(State(state): State<AppState>) -> Json<RegistryStatus> {
    Json(state.registry.status())
}
