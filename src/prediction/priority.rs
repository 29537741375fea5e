//! Priority Classifiers
//!
//! Three independent Low/Medium/High classifiers sharing the priority scaler.
//! There is no fallback: a missing artifact is reported, never guessed around.

use serde::Serialize;

use crate::models::PriorityLabel;
use super::features::PriorityFeatures;
use super::scaler::PriorityScaler;
use super::{InferenceError, PredictError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MaintenanceCategory {
    Preventive,
    Corrective,
    Replacement,
}

impl MaintenanceCategory {
    pub const ALL: [MaintenanceCategory; 3] = [
        MaintenanceCategory::Preventive,
        MaintenanceCategory::Corrective,
        MaintenanceCategory::Replacement,
    ];

    pub fn artifact(&self) -> &'static str {
        match self {
            MaintenanceCategory::Preventive => "preventive_model.onnx",
            MaintenanceCategory::Corrective => "corrective_model.onnx",
            MaintenanceCategory::Replacement => "replacement_model.onnx",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceCategory::Preventive => "Preventive",
            MaintenanceCategory::Corrective => "Corrective",
            MaintenanceCategory::Replacement => "Replacement",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            MaintenanceCategory::Preventive => 0,
            MaintenanceCategory::Corrective => 1,
            MaintenanceCategory::Replacement => 2,
        }
    }
}

/// One trained classifier over the scaled (5,) priority input
pub trait PriorityModel: Send + Sync {
    /// Raw class index (0, 1 or 2)
    fn predict_class(&self, scaled: &[f32; 5]) -> Result<i64, InferenceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriorityAssessment {
    pub preventive: PriorityLabel,
    pub corrective: PriorityLabel,
    pub replacement: PriorityLabel,
}

impl PriorityAssessment {
    pub fn get(&self, category: MaintenanceCategory) -> PriorityLabel {
        match category {
            MaintenanceCategory::Preventive => self.preventive,
            MaintenanceCategory::Corrective => self.corrective,
            MaintenanceCategory::Replacement => self.replacement,
        }
    }
}

/// Borrowed view of the loaded priority artifacts
pub struct PriorityClassifiers<'a> {
    scaler: &'a PriorityScaler,
    preventive: &'a dyn PriorityModel,
    corrective: &'a dyn PriorityModel,
    replacement: &'a dyn PriorityModel,
}

impl<'a> PriorityClassifiers<'a> {
    pub fn new(
        scaler: &'a PriorityScaler,
        preventive: &'a dyn PriorityModel,
        corrective: &'a dyn PriorityModel,
        replacement: &'a dyn PriorityModel,
    ) -> Self {
        Self { scaler, preventive, corrective, replacement }
    }

    pub fn classify(&self, features: &PriorityFeatures) -> Result<PriorityAssessment, PredictError> {
        let scaled = self.scaler.transform(&features.to_vector());

        let label = |category: MaintenanceCategory, model: &dyn PriorityModel| -> Result<PriorityLabel, PredictError> {
            let class = model.predict_class(&scaled)?;
            PriorityLabel::from_class(class).ok_or_else(|| {
                PredictError::Inference(format!(
                    "{} classifier returned unknown class {}", category.as_str(), class
                ))
            })
        };

        Ok(PriorityAssessment {
            preventive: label(MaintenanceCategory::Preventive, self.preventive)?,
            corrective: label(MaintenanceCategory::Corrective, self.corrective)?,
            replacement: label(MaintenanceCategory::Replacement, self.replacement)?,
        })
    }
}
