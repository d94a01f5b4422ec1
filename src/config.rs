//! Configuration module

use std::env;
use std::path::PathBuf;

/// Default request body cap (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// ONNX image classifier. `None` disables `/image/predict`.
    pub image_model_path: Option<PathBuf>,

    /// JSON array of class names, in logit order
    pub image_labels_path: Option<PathBuf>,

    /// ONNX batch regressor. `None` disables `/predict`.
    pub tabular_model_path: Option<PathBuf>,

    /// JSON map of column -> fitted classes
    pub label_encoders_path: Option<PathBuf>,

    /// Prediction history database. `None` disables persistence.
    pub database_url: Option<String>,

    /// JWT secret key, shared with the backend that issues tokens
    pub jwt_secret: String,

    /// Request body cap in bytes
    pub max_upload_bytes: usize,

    /// Where accepted uploads are kept, if anywhere
    pub upload_dir: Option<PathBuf>,

    /// Environment (development, production)
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            image_model_path: None,
            image_labels_path: None,
            tabular_model_path: None,
            label_encoders_path: None,
            database_url: None,
            jwt_secret: "defect-inference-dev-secret-change-in-production".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            upload_dir: None,
            environment: "development".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            host: env::var("HOST").unwrap_or(defaults.host),

            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),

            image_model_path: path_var("IMAGE_MODEL_PATH"),
            image_labels_path: path_var("IMAGE_LABELS_PATH"),
            tabular_model_path: path_var("TABULAR_MODEL_PATH"),
            label_encoders_path: path_var("LABEL_ENCODERS_PATH"),

            database_url: env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),

            jwt_secret: env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),

            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|b| b.parse().ok())
                .unwrap_or(defaults.max_upload_bytes),

            upload_dir: path_var("UPLOAD_DIR"),

            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }
}

fn path_var(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
