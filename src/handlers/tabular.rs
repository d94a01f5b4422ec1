//! Batch defect count handler

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::{AppState, AppResult, AppError};
use crate::inference::{BatchRecord, ModelKind};
use crate::models::CreatePrediction;

#[derive(Debug, Serialize)]
pub struct TabularPredictionResponse {
    pub status: &'static str,
    pub predicted_defects: i64,
}

/// Predict the defect count of one production batch
pub async fn predict(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> AppResult<Json<TabularPredictionResponse>> {
    let model = state.registry.tabular().ok_or(AppError::ModelUnavailable("tabular"))?;

    let body = body.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(state.config.max_upload_bytes)
        } else {
            tracing::debug!("Failed to read request body: {}", e);
            AppError::ValidationError("No input data provided".to_string())
        }
    })?;

    // Unparseable bodies are treated like empty ones
    let input: Value = serde_json::from_slice(&body)
        .map_err(|_| AppError::ValidationError("No input data provided".to_string()))?;

    let record = BatchRecord::from_json(&input, model.encoders())?;

    let predicted_defects = tokio::task::spawn_blocking({
        let model = model.clone();
        move || model.predict(&record)
    })
    .await??;

    tracing::info!(predicted_defects, "Batch defect count predicted");

    state.record_prediction(CreatePrediction {
        kind: ModelKind::Tabular,
        label: None,
        confidence: None,
        predicted_defects: Some(predicted_defects),
        filename: None,
        input: Some(input),
        model_sha256: model.metadata().sha256.clone(),
    });

    Ok(Json(TabularPredictionResponse {
        status: "success",
        predicted_defects,
    }))
}
