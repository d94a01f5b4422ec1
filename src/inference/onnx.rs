//! ONNX Runtime session wrapper

use ndarray::{Array, Dimension};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Value;
use parking_lot::Mutex;

use super::InferenceError;

/// A committed session and the name of the output we read.
///
/// `Session::run` needs `&mut`, so concurrent requests serialize on the lock.
pub struct OnnxSession {
    session: Mutex<Session>,
    output_name: String,
}

impl OnnxSession {
    /// Build a session from artifact bytes
    pub fn from_bytes(model_bytes: &[u8]) -> Result<Self, InferenceError> {
        tracing::debug!("Building ONNX session ({} bytes)", model_bytes.len());

        let session = Session::builder()
            .map_err(|e| InferenceError::Load(format!("Session builder error: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| InferenceError::Load(format!("Optimization error: {}", e)))?
            .commit_from_memory(model_bytes)
            .map_err(|e| InferenceError::Load(format!("Load from memory error: {}", e)))?;

        let output_name = session.outputs.first()
            .map(|o| o.name.clone())
            .ok_or_else(|| InferenceError::Load("No output defined".to_string()))?;

        Ok(Self {
            session: Mutex::new(session),
            output_name,
        })
    }

    /// Run one input tensor and return the first output, flattened
    pub fn run<D>(&self, input: Array<f32, D>) -> Result<Vec<f32>, InferenceError>
    where
        D: Dimension + 'static,
    {
        let input_tensor = Value::from_array(input)
            .map_err(|e| InferenceError::Runtime(format!("Tensor error: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = session.run(ort::inputs![input_tensor])
            .map_err(|e| InferenceError::Runtime(format!("Session run failed: {}", e)))?;

        let output = outputs.get(&self.output_name)
            .ok_or_else(|| InferenceError::Runtime("No output".to_string()))?;

        let (_, data) = output.try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Runtime(format!("Extract error: {}", e)))?;

        Ok(data.to_vec())
    }
}
