//! Prediction history model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::inference::ModelKind;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Prediction {
    pub id: Uuid,
    pub kind: String,
    pub label: Option<String>,
    pub confidence: Option<f32>,
    pub predicted_defects: Option<i64>,
    pub filename: Option<String>,
    pub input: Option<serde_json::Value>,
    pub model_sha256: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreatePrediction {
    pub kind: ModelKind,
    pub label: Option<String>,
    pub confidence: Option<f32>,
    pub predicted_defects: Option<i64>,
    pub filename: Option<String>,
    pub input: Option<serde_json::Value>,
    pub model_sha256: String,
}

#[derive(Debug, Deserialize, Default, Validate)]
pub struct PredictionFilter {
    #[validate(custom(function = "validate_kind"))]
    pub kind: Option<String>,
    #[validate(range(min = 1, max = 500))]
    pub limit: Option<i64>,
    #[validate(range(min = 0))]
    pub offset: Option<i64>,
}

fn validate_kind(kind: &str) -> Result<(), ValidationError> {
    match kind {
        "image" | "tabular" => Ok(()),
        _ => Err(ValidationError::new("unknown_kind")),
    }
}

impl Prediction {
    pub async fn create(pool: &PgPool, data: CreatePrediction) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Prediction>(
            r#"
            INSERT INTO predictions (id, kind, label, confidence, predicted_defects, filename, input, model_sha256)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(data.kind.as_str())
        .bind(&data.label)
        .bind(data.confidence)
        .bind(data.predicted_defects)
        .bind(&data.filename)
        .bind(&data.input)
        .bind(&data.model_sha256)
        .fetch_one(pool)
        .await
    }

    /// Newest first
    pub async fn list(pool: &PgPool, filter: &PredictionFilter) -> Result<Vec<Self>, sqlx::Error> {
        let limit = filter.limit.unwrap_or(50);
        let offset = filter.offset.unwrap_or(0);

        sqlx::query_as::<_, Prediction>(
            r#"
            SELECT * FROM predictions
            WHERE ($1::text IS NULL OR kind = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        )
        .bind(&filter.kind)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }
}
