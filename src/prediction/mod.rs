//! Prediction Module - failure ensemble and maintenance priority
//!
//! Pipeline:
//! usage logs → `features` → `scaler` → { `ensemble`, `priority` }
//! → `guard` (failure path only) → prediction / priority stores.
//!
//! Models are loaded once into a [`ModelRegistry`] and injected; a missing
//! failure-model artifact degrades to the rule-based scorer, a missing
//! priority artifact surfaces as [`PredictError::ModelUnavailable`].

pub mod features;
pub mod scaler;
pub mod ensemble;
pub mod onnx;
pub mod registry;
pub mod guard;
pub mod priority;
pub mod labels;
pub mod service;

#[cfg(test)]
mod tests;

pub use ensemble::{EnsembleOutcome, EnsembleResult, PredictionMethod};
pub use features::{FeatureWindow, PriorityFeatures};
pub use registry::{ModelRegistry, RegistryStatus};
pub use service::PredictionService;

use crate::store::StoreError;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Usage features per time step
pub const FEATURE_COUNT: usize = 5;

/// Time steps per window
pub const WINDOW_LEN: usize = 5;

/// Ensemble decision threshold; deliberately below 0.5
pub const DECISION_THRESHOLD: f64 = 0.40;

/// Hours a confirmed maintenance (or reset) shields the stored prediction
pub const PROTECTION_WINDOW_HOURS: i64 = 24;

/// Attempts per store write before the equipment is reported as failed
pub const MAX_WRITE_ATTEMPTS: usize = 3;

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Model runtime failure (shape mismatch, ONNX error, bad output)
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceError(pub String);

impl std::fmt::Display for InferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InferenceError: {}", self.0)
    }
}

impl std::error::Error for InferenceError {}

#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("Equipment {0} not found")]
    EquipmentNotFound(String),

    #[error("Model artifact unavailable: {artifact}")]
    ModelUnavailable { artifact: &'static str },

    #[error("{0}")]
    Inference(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<InferenceError> for PredictError {
    fn from(err: InferenceError) -> Self {
        PredictError::Inference(err.0)
    }
}
