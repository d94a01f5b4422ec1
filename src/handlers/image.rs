//! Image classification handler

use std::path::{Path, PathBuf};

use axum::{
    body::Bytes,
    extract::{multipart::{MultipartError, MultipartRejection}, Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{AppState, AppResult, AppError};
use crate::inference::ModelKind;
use crate::models::CreatePrediction;

/// Multipart field carrying the upload
pub const IMAGE_FIELD: &str = "image";

#[derive(Debug, Serialize)]
pub struct ImagePredictionResponse {
    pub prediction: String,
    pub confidence: f32,
    pub filename: String,
}

struct Upload {
    filename: String,
    bytes: Bytes,
}

/// Classify an uploaded surface image
pub async fn predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<ImagePredictionResponse>> {
    let model = state.registry.image().ok_or(AppError::ModelUnavailable("image"))?;

    let mut multipart = multipart.map_err(|e| {
        tracing::debug!("Rejected non-multipart upload: {}", e);
        AppError::ValidationError("No image file found in request".to_string())
    })?;

    let upload = read_image_field(&mut multipart, state.config.max_upload_bytes).await?;

    if let Some(dir) = &state.config.upload_dir {
        if let Err(e) = store_upload(dir, &upload.filename, &upload.bytes).await {
            tracing::warn!("Failed to store upload {}: {}", upload.filename, e);
        }
    }

    let bytes = upload.bytes.clone();
    let classification = tokio::task::spawn_blocking({
        let model = model.clone();
        move || model.classify_bytes(&bytes)
    })
    .await??;

    tracing::info!(
        filename = %upload.filename,
        label = %classification.label,
        confidence = classification.confidence,
        "Image classified"
    );

    state.record_prediction(CreatePrediction {
        kind: ModelKind::Image,
        label: Some(classification.label.clone()),
        confidence: Some(classification.confidence),
        predicted_defects: None,
        filename: Some(sanitize_filename(&upload.filename)),
        input: None,
        model_sha256: model.metadata().sha256.clone(),
    });

    Ok(Json(ImagePredictionResponse {
        prediction: classification.label,
        confidence: classification.confidence,
        filename: upload.filename,
    }))
}

/// Find the `image` file part. Parts without a filename are form fields, not files.
async fn read_image_field(multipart: &mut Multipart, limit: usize) -> AppResult<Upload> {
    while let Some(field) = multipart.next_field().await.map_err(|e| upload_error(e, limit))? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };

        if filename.is_empty() {
            return Err(AppError::ValidationError("No file selected".to_string()));
        }

        let bytes = field.bytes().await.map_err(|e| upload_error(e, limit))?;
        return Ok(Upload { filename, bytes });
    }

    Err(AppError::ValidationError("No image file found in request".to_string()))
}

fn upload_error(err: MultipartError, limit: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(limit)
    } else {
        tracing::debug!("Multipart read failed: {}", err);
        AppError::ValidationError("Malformed multipart body".to_string())
    }
}

async fn store_upload(dir: &Path, filename: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    let path = dir.join(format!("{}-{}", Uuid::new_v4(), sanitize_filename(filename)));
    tokio::fs::write(&path, bytes).await?;
    tracing::debug!("Stored upload at {}", path.display());
    Ok(path)
}

/// Last path component of a client filename, restricted to a safe charset
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
