//! Model registry - everything loaded at startup

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::Config;
use super::artifact::{read_artifact, ModelKind, ModelMetadata};
use super::tabular::{to_defect_count, BatchRecord, LabelEncoders, OnnxDefectRegressor};
use super::vision::{self, Classification, OnnxImageClassifier};
use super::{DefectRegressor, ImageClassifier, InferenceError, LoadedModels};

// ============================================================================
// STATS
// ============================================================================

/// Per-model latency stats
#[derive(Debug, Default)]
pub struct ModelStats {
    inference_count: AtomicU64,
    latency_sum_us: AtomicU64,
}

impl ModelStats {
    pub fn record(&self, elapsed: Duration) {
        self.latency_sum_us.fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        self.inference_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inference_count(&self) -> u64 {
        self.inference_count.load(Ordering::Relaxed)
    }

    pub fn avg_latency_ms(&self) -> f32 {
        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        let count = self.inference_count();
        if count > 0 { (sum as f32 / count as f32) / 1000.0 } else { 0.0 }
    }
}

// ============================================================================
// MODELS
// ============================================================================

pub struct ImageModel {
    classifier: Box<dyn ImageClassifier>,
    metadata: ModelMetadata,
    stats: ModelStats,
}

impl ImageModel {
    pub fn new(classifier: Box<dyn ImageClassifier>, metadata: ModelMetadata) -> Self {
        Self { classifier, metadata, stats: ModelStats::default() }
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Decode, preprocess and classify one uploaded image. Blocking.
    pub fn classify_bytes(&self, bytes: &[u8]) -> Result<Classification, InferenceError> {
        let input = vision::preprocess(bytes)?;

        let start = Instant::now();
        let result = self.classifier.classify(input)?;
        self.stats.record(start.elapsed());

        Ok(result)
    }
}

pub struct TabularModel {
    regressor: Box<dyn DefectRegressor>,
    encoders: LabelEncoders,
    metadata: ModelMetadata,
    stats: ModelStats,
}

impl TabularModel {
    pub fn new(
        regressor: Box<dyn DefectRegressor>,
        encoders: LabelEncoders,
        metadata: ModelMetadata,
    ) -> Self {
        Self { regressor, encoders, metadata, stats: ModelStats::default() }
    }

    pub fn encoders(&self) -> &LabelEncoders {
        &self.encoders
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Predicted defect count for a validated record. Blocking.
    pub fn predict(&self, record: &BatchRecord) -> Result<i64, InferenceError> {
        let start = Instant::now();
        let raw = self.regressor.predict(record.features())?;
        self.stats.record(start.elapsed());

        to_defect_count(raw)
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Default)]
pub struct ModelRegistry {
    image: Option<Arc<ImageModel>>,
    tabular: Option<Arc<TabularModel>>,
}

/// Status snapshot for `/models`
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStatus {
    pub inference_device: String,
    pub image: Option<ModelStatus>,
    pub tabular: Option<ModelStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    #[serde(flatten)]
    pub metadata: ModelMetadata,
    /// Class names (image) or encoded columns (tabular)
    pub labels: Vec<String>,
    pub inference_count: u64,
    pub avg_latency_ms: f32,
}

impl ModelRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every configured model. Fails if any configured artifact is unusable.
    pub fn load(config: &Config) -> Result<Self, InferenceError> {
        let mut registry = Self::empty();

        match &config.image_model_path {
            Some(path) => {
                let labels = match &config.image_labels_path {
                    Some(labels_path) => vision::load_labels(labels_path)?,
                    None => vision::default_labels(),
                };
                let artifact = read_artifact(path, ModelKind::Image)?;
                let classifier = OnnxImageClassifier::from_artifact(&artifact, labels)?;
                registry = registry.with_image(ImageModel::new(Box::new(classifier), artifact.metadata));
            }
            None => tracing::warn!("IMAGE_MODEL_PATH not set, image classification disabled"),
        }

        match &config.tabular_model_path {
            Some(path) => {
                let encoders_path = config.label_encoders_path.as_ref().ok_or_else(|| {
                    InferenceError::Config(
                        "LABEL_ENCODERS_PATH is required when TABULAR_MODEL_PATH is set".to_string(),
                    )
                })?;
                let encoders = LabelEncoders::from_path(encoders_path)?;
                let artifact = read_artifact(path, ModelKind::Tabular)?;
                let regressor = OnnxDefectRegressor::from_artifact(&artifact)?;
                registry = registry.with_tabular(TabularModel::new(
                    Box::new(regressor),
                    encoders,
                    artifact.metadata,
                ));
            }
            None => tracing::warn!("TABULAR_MODEL_PATH not set, defect count prediction disabled"),
        }

        Ok(registry)
    }

    pub fn with_image(mut self, model: ImageModel) -> Self {
        self.image = Some(Arc::new(model));
        self
    }

    pub fn with_tabular(mut self, model: TabularModel) -> Self {
        self.tabular = Some(Arc::new(model));
        self
    }

    pub fn image(&self) -> Option<Arc<ImageModel>> {
        self.image.clone()
    }

    pub fn tabular(&self) -> Option<Arc<TabularModel>> {
        self.tabular.clone()
    }

    pub fn loaded(&self) -> LoadedModels {
        LoadedModels {
            image: self.image.is_some(),
            tabular: self.tabular.is_some(),
        }
    }

    pub fn status(&self) -> RegistryStatus {
        RegistryStatus {
            inference_device: "ONNX Runtime (CPU)".to_string(),
            image: self.image.as_ref().map(|m| ModelStatus {
                metadata: m.metadata.clone(),
                labels: m.classifier.labels().to_vec(),
                inference_count: m.stats.inference_count(),
                avg_latency_ms: m.stats.avg_latency_ms(),
            }),
            tabular: self.tabular.as_ref().map(|m| ModelStatus {
                metadata: m.metadata.clone(),
                labels: m.encoders.columns(),
                inference_count: m.stats.inference_count(),
                avg_latency_ms: m.stats.avg_latency_ms(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;
    use std::path::PathBuf;

    struct FixedRegressor(f32);

    impl DefectRegressor for FixedRegressor {
        fn predict(&self, _features: &[f32]) -> Result<f32, InferenceError> {
            Ok(self.0)
        }
    }

    struct FirstClass(Vec<String>);

    impl ImageClassifier for FirstClass {
        fn labels(&self) -> &[String] {
            &self.0
        }

        fn classify(&self, _input: Array4<f32>) -> Result<Classification, InferenceError> {
            vision::classify_logits(&[1.0, 0.0], &self.0)
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = ModelRegistry::load(&Config::default()).unwrap();
        assert_eq!(registry.loaded(), LoadedModels { image: false, tabular: false });
        let status = registry.status();
        assert!(status.image.is_none());
        assert!(status.tabular.is_none());
    }

    #[test]
    fn test_tabular_requires_encoders() {
        let config = Config {
            tabular_model_path: Some(PathBuf::from("defect_regressor.onnx")),
            ..Config::default()
        };
        assert!(matches!(ModelRegistry::load(&config), Err(InferenceError::Config(_))));
    }

    #[test]
    fn test_missing_image_artifact_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            image_model_path: Some(dir.path().join("missing.onnx")),
            ..Config::default()
        };
        assert!(matches!(
            ModelRegistry::load(&config),
            Err(InferenceError::ArtifactNotFound(_))
        ));
    }

    #[test]
    fn test_stats_track_predictions() {
        let encoders = LabelEncoders::from_json_str(r#"{"Shift": ["Day", "Night"]}"#).unwrap();
        let meta = ModelMetadata::from_bytes(ModelKind::Tabular, "<memory>", b"stub");
        let registry = ModelRegistry::empty()
            .with_tabular(TabularModel::new(Box::new(FixedRegressor(4.6)), encoders, meta));

        let model = registry.tabular().unwrap();
        let record = BatchRecord::from_json(
            &serde_json::json!({
                "Product_ID": 1, "Product_Type": 0, "Production_Volume": 10,
                "Shift": "Night", "Operator_Experience_Level": 2,
                "Machine_Usage_Hours": 1, "Temperature": 20, "Humidity": 30,
                "Previous_Day_Defects": 0
            }),
            model.encoders(),
        )
        .unwrap();

        assert_eq!(model.predict(&record).unwrap(), 4);
        assert_eq!(model.predict(&record).unwrap(), 4);

        let status = registry.status();
        let tabular = status.tabular.unwrap();
        assert_eq!(tabular.inference_count, 2);
        assert_eq!(tabular.labels, vec!["Shift"]);
    }

    #[test]
    fn test_image_status_lists_labels() {
        let labels = vec!["good".to_string(), "bad".to_string()];
        let meta = ModelMetadata::from_bytes(ModelKind::Image, "<memory>", b"stub");
        let registry = ModelRegistry::empty()
            .with_image(ImageModel::new(Box::new(FirstClass(labels.clone())), meta));

        let status = registry.status();
        assert_eq!(status.image.unwrap().labels, labels);
        assert!(registry.loaded().image);
    }
}
