//! HTTP handlers

pub mod health;
pub mod image;
pub mod models;
pub mod predictions;
pub mod tabular;

use crate::AppError;

/// Fallback for unknown routes
pub async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}
