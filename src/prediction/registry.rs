//! Model Registry
//!
//! All trained artifacts, loaded once at startup and shared read-only.
//! Each artifact is optional: the registry records what is missing instead of
//! failing the whole process.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use super::ensemble::{SequenceModel, TreeModel};
use super::onnx::{OnnxClassifier, OnnxSequenceModel, OnnxTreeModel};
use super::priority::{MaintenanceCategory, PriorityClassifiers, PriorityModel};
use super::scaler::{PriorityScaler, WindowScaler};
use super::PredictError;

// ============================================================================
// ARTIFACT NAMES
// ============================================================================

pub const SEQUENCE_MODEL_FILE: &str = "lstm_model.onnx";
pub const TREE_MODEL_FILE: &str = "lgbm_model.onnx";
pub const WINDOW_SCALER_FILE: &str = "scaler.json";
pub const PRIORITY_SCALER_FILE: &str = "multi_priority_scaler.json";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("ONNX Runtime error: {0}")]
    Runtime(String),
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Default)]
pub struct ModelRegistry {
    sequence: Option<Arc<dyn SequenceModel>>,
    tree: Option<Arc<dyn TreeModel>>,
    window_scaler: Option<WindowScaler>,
    priority_scaler: Option<PriorityScaler>,
    classifiers: [Option<Arc<dyn PriorityModel>>; 3],
}

/// Which artifacts are loaded
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStatus {
    pub sequence_model: bool,
    pub tree_model: bool,
    pub window_scaler: bool,
    pub priority_scaler: bool,
    pub preventive_model: bool,
    pub corrective_model: bool,
    pub replacement_model: bool,
    /// Both failure models and their scaler are present
    pub ensemble_ready: bool,
    /// Priority scaler and all three classifiers are present
    pub priority_ready: bool,
}

impl ModelRegistry {
    /// Registry with nothing loaded (failure ensemble runs in fallback mode)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every artifact from `dir`; failures are logged and left empty
    pub fn load_from_dir(dir: &Path) -> Self {
        tracing::info!("Loading model artifacts from {}", dir.display());

        let mut registry = Self::empty();

        registry.sequence = load_logged(SEQUENCE_MODEL_FILE, || {
            OnnxSequenceModel::load(&dir.join(SEQUENCE_MODEL_FILE))
                .map(|m| Arc::new(m) as Arc<dyn SequenceModel>)
        });
        registry.tree = load_logged(TREE_MODEL_FILE, || {
            OnnxTreeModel::load(&dir.join(TREE_MODEL_FILE))
                .map(|m| Arc::new(m) as Arc<dyn TreeModel>)
        });
        registry.window_scaler = load_logged(WINDOW_SCALER_FILE, || {
            WindowScaler::load(&dir.join(WINDOW_SCALER_FILE))
        });
        registry.priority_scaler = load_logged(PRIORITY_SCALER_FILE, || {
            PriorityScaler::load(&dir.join(PRIORITY_SCALER_FILE))
        });

        for category in MaintenanceCategory::ALL {
            let file = category.artifact();
            registry.classifiers[category.index()] = load_logged(file, || {
                OnnxClassifier::load(&dir.join(file))
                    .map(|m| Arc::new(m) as Arc<dyn PriorityModel>)
            });
        }

        registry
    }

    pub fn with_sequence_model(mut self, model: Arc<dyn SequenceModel>) -> Self {
        self.sequence = Some(model);
        self
    }

    pub fn with_tree_model(mut self, model: Arc<dyn TreeModel>) -> Self {
        self.tree = Some(model);
        self
    }

    pub fn with_window_scaler(mut self, scaler: WindowScaler) -> Self {
        self.window_scaler = Some(scaler);
        self
    }

    pub fn with_priority_scaler(mut self, scaler: PriorityScaler) -> Self {
        self.priority_scaler = Some(scaler);
        self
    }

    pub fn with_classifier(mut self, category: MaintenanceCategory, model: Arc<dyn PriorityModel>) -> Self {
        self.classifiers[category.index()] = Some(model);
        self
    }

    /// Sequence model, tree model and window scaler, when all three loaded
    pub fn failure_models(&self) -> Option<(&dyn SequenceModel, &dyn TreeModel, &WindowScaler)> {
        match (&self.sequence, &self.tree, &self.window_scaler) {
            (Some(seq), Some(tree), Some(scaler)) => Some((&**seq, &**tree, scaler)),
            _ => None,
        }
    }

    /// Priority scaler plus the three classifiers; names the first missing artifact
    pub fn priority_classifiers(&self) -> Result<PriorityClassifiers<'_>, PredictError> {
        let scaler = self.priority_scaler.as_ref()
            .ok_or(PredictError::ModelUnavailable { artifact: PRIORITY_SCALER_FILE })?;

        let model = |category: MaintenanceCategory| {
            self.classifiers[category.index()]
                .as_deref()
                .ok_or(PredictError::ModelUnavailable { artifact: category.artifact() })
        };

        Ok(PriorityClassifiers::new(
            scaler,
            model(MaintenanceCategory::Preventive)?,
            model(MaintenanceCategory::Corrective)?,
            model(MaintenanceCategory::Replacement)?,
        ))
    }

    pub fn status(&self) -> RegistryStatus {
        let classifier = |c: MaintenanceCategory| self.classifiers[c.index()].is_some();

        RegistryStatus {
            sequence_model: self.sequence.is_some(),
            tree_model: self.tree.is_some(),
            window_scaler: self.window_scaler.is_some(),
            priority_scaler: self.priority_scaler.is_some(),
            preventive_model: classifier(MaintenanceCategory::Preventive),
            corrective_model: classifier(MaintenanceCategory::Corrective),
            replacement_model: classifier(MaintenanceCategory::Replacement),
            ensemble_ready: self.failure_models().is_some(),
            priority_ready: self.priority_classifiers().is_ok(),
        }
    }
}

fn load_logged<T>(name: &str, load: impl FnOnce() -> Result<T, ArtifactError>) -> Option<T> {
    match load() {
        Ok(artifact) => {
            tracing::info!("Loaded {}", name);
            Some(artifact)
        }
        Err(e) => {
            tracing::warn!("Could not load {}: {}", name, e);
            None
        }
    }
}
