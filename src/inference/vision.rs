//! Surface defect image classifier
//!
//! Preprocessing matches the training pipeline: RGB, 224x224 bilinear
//! resize, scale to [0, 1], then per-channel ImageNet normalization.

use std::path::Path;

use image::imageops::{self, FilterType};
use ndarray::Array4;
use serde::{Deserialize, Serialize};

use super::artifact::Artifact;
use super::onnx::OnnxSession;
use super::{ImageClassifier, InferenceError};

/// Network input edge length
pub const INPUT_SIZE: u32 = 224;

/// ImageNet channel statistics
pub const CHANNEL_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const CHANNEL_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Classes of the steel surface defect dataset, in logit order
pub const DEFAULT_CLASS_NAMES: [&str; 6] = [
    "crazing",
    "inclusion",
    "patches",
    "pitted_surface",
    "rolled-in_scale",
    "scratches",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Classification {
    pub label: String,
    pub class_index: usize,
    /// Softmax probability of the winning class, as a percentage (2 dp)
    pub confidence: f32,
}

pub fn default_labels() -> Vec<String> {
    DEFAULT_CLASS_NAMES.iter().map(|s| s.to_string()).collect()
}

/// Load class names from a JSON array file
pub fn load_labels(path: &Path) -> Result<Vec<String>, InferenceError> {
    let raw = std::fs::read_to_string(path)?;
    let labels: Vec<String> = serde_json::from_str(&raw)
        .map_err(|e| InferenceError::Config(format!("{}: {}", path.display(), e)))?;

    if labels.is_empty() {
        return Err(InferenceError::Config(format!("{}: no class labels", path.display())));
    }

    Ok(labels)
}

/// Decode an uploaded image into a `[1, 3, 224, 224]` input tensor
pub fn preprocess(bytes: &[u8]) -> Result<Array4<f32>, InferenceError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| {
        tracing::debug!("Image decode failed: {}", e);
        InferenceError::InvalidInput("Invalid image file".to_string())
    })?;

    let rgb = decoded.to_rgb8();
    let resized = imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

    let size = INPUT_SIZE as usize;
    let tensor = Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
        let value = resized.get_pixel(x as u32, y as u32).0[c] as f32 / 255.0;
        (value - CHANNEL_MEAN[c]) / CHANNEL_STD[c]
    });

    Ok(tensor)
}

/// Pick the winning class from raw logits
pub fn classify_logits(logits: &[f32], labels: &[String]) -> Result<Classification, InferenceError> {
    if logits.len() != labels.len() {
        return Err(InferenceError::Runtime(format!(
            "Model produced {} logits for {} labels",
            logits.len(),
            labels.len()
        )));
    }

    if logits.iter().any(|l| !l.is_finite()) {
        return Err(InferenceError::Runtime("Non-finite logits".to_string()));
    }

    let (class_index, &best) = logits
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .ok_or_else(|| InferenceError::Runtime("Empty model output".to_string()))?;

    // Softmax, shifted by the max for stability
    let denom: f32 = logits.iter().map(|&l| (l - best).exp()).sum();
    let probability = 1.0 / denom;

    Ok(Classification {
        label: labels[class_index].clone(),
        class_index,
        confidence: (probability * 10_000.0).round() / 100.0,
    })
}

// ============================================================================
// ONNX IMPLEMENTATION
// ============================================================================

pub struct OnnxImageClassifier {
    session: OnnxSession,
    labels: Vec<String>,
}

impl OnnxImageClassifier {
    pub fn from_artifact(artifact: &Artifact, labels: Vec<String>) -> Result<Self, InferenceError> {
        let session = OnnxSession::from_bytes(&artifact.bytes)?;

        tracing::info!(
            "Image classifier loaded: {} ({} classes)",
            artifact.metadata.name,
            labels.len()
        );

        Ok(Self { session, labels })
    }
}

impl ImageClassifier for OnnxImageClassifier {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn classify(&self, input: Array4<f32>) -> Result<Classification, InferenceError> {
        let logits = self.session.run(input)?;
        classify_logits(&logits, &self.labels)
    }
}
