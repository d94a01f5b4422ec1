//! Prediction history handlers

use axum::{extract::{rejection::QueryRejection, Query, State}, Json};
use validator::Validate;

use crate::{AppState, AppResult, AppError};
use crate::middleware::auth::{require_role, UserContext, HISTORY_ROLES};
use crate::models::{Prediction, PredictionFilter};

/// List recent predictions
pub async fn list(
    State(state): State<AppState>,
    user: UserContext,
    query: Result<Query<PredictionFilter>, QueryRejection>,
) -> AppResult<Json<Vec<Prediction>>> {
    require_role(&user, &HISTORY_ROLES)?;

    let Query(filter) = query
        .map_err(|e| AppError::ValidationError(format!("Invalid query: {}", e.body_text())))?;

    filter.validate()
        .map_err(|e| AppError::ValidationError(format!("Invalid query: {}", e)))?;

    let pool = state.pool.as_ref().ok_or(AppError::DatabaseUnavailable)?;
    let predictions = Prediction::list(pool, &filter).await?;

    Ok(Json(predictions))
}
