//! ONNX Runtime backends for the model traits

use std::path::Path;

use ndarray::{Array2, Array3};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Value;
use parking_lot::Mutex;

use super::ensemble::{SequenceModel, TreeModel};
use super::priority::PriorityModel;
use super::registry::ArtifactError;
use super::InferenceError;

/// Output name emitted by converted scikit-learn / LightGBM classifiers
const PROBABILITIES_OUTPUT: &str = "probabilities";

fn open_session(path: &Path) -> Result<Session, ArtifactError> {
    if !path.exists() {
        return Err(ArtifactError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Model not found: {}", path.display()),
        )));
    }

    let session = Session::builder()
        .map_err(|e| ArtifactError::Runtime(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| ArtifactError::Runtime(format!("Failed to set optimization: {}", e)))?
        .commit_from_file(path)
        .map_err(|e| ArtifactError::Runtime(format!("Failed to load model: {}", e)))?;

    Ok(session)
}

fn first_output(session: &Session) -> Result<String, InferenceError> {
    session.outputs.first()
        .map(|o| o.name.clone())
        .ok_or_else(|| InferenceError("No output defined".to_string()))
}

// ============================================================================
// SEQUENCE MODEL
// ============================================================================

/// LSTM exported with a single sigmoid output of shape (N, 1)
pub struct OnnxSequenceModel {
    session: Mutex<Session>,
}

impl OnnxSequenceModel {
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        Ok(Self { session: Mutex::new(open_session(path)?) })
    }
}

impl SequenceModel for OnnxSequenceModel {
    fn predict_batch(&self, batch: &Array3<f32>) -> Result<Vec<f32>, InferenceError> {
        let mut session = self.session.lock();
        let output_name = first_output(&session)?;

        let input_tensor = Value::from_array(batch.clone())
            .map_err(|e| InferenceError(format!("Tensor error: {}", e)))?;

        let outputs = session.run(ort::inputs![input_tensor])
            .map_err(|e| InferenceError(format!("Inference failed: {}", e)))?;

        let output = outputs.get(&output_name)
            .ok_or_else(|| InferenceError("No output".to_string()))?;

        let output_tensor = output.try_extract_tensor::<f32>()
            .map_err(|e| InferenceError(format!("Extract error: {}", e)))?;

        Ok(output_tensor.1.to_vec())
    }
}

// ============================================================================
// TREE MODEL
// ============================================================================

/// Gradient-boosted classifier; reads P(class = 1) from the (N, 2) probability output
pub struct OnnxTreeModel {
    session: Mutex<Session>,
}

impl OnnxTreeModel {
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        Ok(Self { session: Mutex::new(open_session(path)?) })
    }
}

impl TreeModel for OnnxTreeModel {
    fn predict_proba(&self, batch: &Array2<f32>) -> Result<Vec<f32>, InferenceError> {
        let rows = batch.nrows();
        let mut session = self.session.lock();

        let output_name = if session.outputs.iter().any(|o| o.name == PROBABILITIES_OUTPUT) {
            PROBABILITIES_OUTPUT.to_string()
        } else {
            first_output(&session)?
        };

        let input_tensor = Value::from_array(batch.clone())
            .map_err(|e| InferenceError(format!("Tensor error: {}", e)))?;

        let outputs = session.run(ort::inputs![input_tensor])
            .map_err(|e| InferenceError(format!("Inference failed: {}", e)))?;

        let output = outputs.get(&output_name)
            .ok_or_else(|| InferenceError("No output".to_string()))?;

        let output_tensor = output.try_extract_tensor::<f32>()
            .map_err(|e| InferenceError(format!("Extract error: {}", e)))?;

        let data = output_tensor.1;
        if rows == 0 {
            return Ok(Vec::new());
        }

        // (N, 2) → positive column; (N,) / (N, 1) → already P(1)
        let width = data.len() / rows;
        match width {
            1 => Ok(data.to_vec()),
            2 => Ok(data.chunks(2).map(|pair| pair[1]).collect()),
            _ => Err(InferenceError(format!(
                "Unexpected probability output: {} values for {} rows", data.len(), rows
            ))),
        }
    }
}

// ============================================================================
// PRIORITY CLASSIFIER
// ============================================================================

/// Multi-class classifier whose first output is the int64 label
pub struct OnnxClassifier {
    session: Mutex<Session>,
}

impl OnnxClassifier {
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        Ok(Self { session: Mutex::new(open_session(path)?) })
    }
}

impl PriorityModel for OnnxClassifier {
    fn predict_class(&self, features: &[f32; 5]) -> Result<i64, InferenceError> {
        let input_array = Array2::<f32>::from_shape_vec((1, features.len()), features.to_vec())
            .map_err(|e| InferenceError(format!("Array error: {}", e)))?;

        let mut session = self.session.lock();
        let output_name = first_output(&session)?;

        let input_tensor = Value::from_array(input_array)
            .map_err(|e| InferenceError(format!("Tensor error: {}", e)))?;

        let outputs = session.run(ort::inputs![input_tensor])
            .map_err(|e| InferenceError(format!("Inference failed: {}", e)))?;

        let output = outputs.get(&output_name)
            .ok_or_else(|| InferenceError("No output".to_string()))?;

        let output_tensor = output.try_extract_tensor::<i64>()
            .map_err(|e| InferenceError(format!("Extract error: {}", e)))?;

        output_tensor.1.first()
            .copied()
            .ok_or_else(|| InferenceError("Empty label output".to_string()))
    }
}
