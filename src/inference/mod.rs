//! Inference Module - ONNX model loading and prediction
//!
//! Two model families are served:
//! - `image`: surface defect classifier over a 224x224 RGB tensor
//! - `tabular`: defect count regressor over one production batch record
//!
//! Models are loaded once at startup and are read-only afterwards. The
//! traits below are the seam between request handling and the runtime,
//! so handlers never touch `ort` directly.

pub mod artifact;
pub mod vision;
pub mod onnx;
pub mod registry;
pub mod tabular;

use ndarray::Array4;
use serde::{Deserialize, Serialize};

pub use artifact::{Artifact, ModelKind, ModelMetadata};
pub use vision::{Classification, OnnxImageClassifier};
pub use registry::{ImageModel, ModelRegistry, RegistryStatus, TabularModel};
pub use tabular::{BatchRecord, LabelEncoders, OnnxDefectRegressor};

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Model not found: {0}")]
    ArtifactNotFound(String),

    #[error("Failed to read artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to load model: {0}")]
    Load(String),

    #[error("Invalid model configuration: {0}")]
    Config(String),

    /// Caller supplied bad input; the message is safe to show to clients
    #[error("{0}")]
    InvalidInput(String),

    #[error("Inference failed: {0}")]
    Runtime(String),
}

// ============================================================================
// INFERENCE ENGINE TRAITS
// ============================================================================

/// Image classifier over a preprocessed NCHW tensor
pub trait ImageClassifier: Send + Sync {
    /// Class names in logit order
    fn labels(&self) -> &[String];

    fn classify(&self, input: Array4<f32>) -> Result<Classification, InferenceError>;
}

/// Regressor over one encoded batch record
pub trait DefectRegressor: Send + Sync {
    /// Raw model output for a single row of features
    fn predict(&self, features: &[f32]) -> Result<f32, InferenceError>;
}

/// Loaded flags, as reported by the health endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadedModels {
    pub image: bool,
    pub tabular: bool,
}
