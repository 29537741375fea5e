//! Standard scaler
//!
//! Fitted offline, persisted as JSON, applied unchanged at inference time.
//! The usage-window scaler and the priority scaler are separate types so one
//! can never be handed to a consumer of the other.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::features::{PRIORITY_FEATURES, USAGE_FEATURES};
use super::registry::ArtifactError;
use super::FEATURE_COUNT;

/// Per-feature mean / scale, same semantics as sklearn's `StandardScaler`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    #[serde(default)]
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit on historical rows (population std; zero variance → scale 1)
    pub fn fit<R: AsRef<[f32]>>(feature_names: &[&str], rows: &[R]) -> Self {
        let width = feature_names.len();
        let n = rows.len().max(1) as f64;

        let mut mean = vec![0.0f64; width];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row.as_ref()) {
                *m += *v as f64;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut variance = vec![0.0f64; width];
        for row in rows {
            for (i, v) in row.as_ref().iter().take(width).enumerate() {
                variance[i] += (*v as f64 - mean[i]).powi(2);
            }
        }

        let scale = variance
            .into_iter()
            .map(|v| {
                let std = (v / n).sqrt();
                if std > 0.0 { std } else { 1.0 }
            })
            .collect();

        Self {
            feature_names: feature_names.iter().map(|s| s.to_string()).collect(),
            mean,
            scale,
        }
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let data = fs::read(path)?;
        let scaler: StandardScaler = serde_json::from_slice(&data)?;
        Ok(scaler)
    }

    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// Check width and, when names were persisted, the feature order
    pub fn validate(&self, expected: &[&str]) -> Result<(), ArtifactError> {
        if self.mean.len() != expected.len() || self.scale.len() != expected.len() {
            return Err(ArtifactError::Shape(format!(
                "scaler has {} means / {} scales, expected {}",
                self.mean.len(), self.scale.len(), expected.len()
            )));
        }
        if !self.feature_names.is_empty() && self.feature_names.iter().map(String::as_str).ne(expected.iter().copied()) {
            return Err(ArtifactError::Shape(format!(
                "scaler features {:?} do not match {:?}",
                self.feature_names, expected
            )));
        }
        if self.scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return Err(ArtifactError::Shape("scaler contains a zero or non-finite scale".to_string()));
        }
        Ok(())
    }

    fn transform_row(&self, row: &[f32; FEATURE_COUNT]) -> [f32; FEATURE_COUNT] {
        let mut scaled = [0.0f32; FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            scaled[i] = ((row[i] as f64 - self.mean[i]) / self.scale[i]) as f32;
        }
        scaled
    }
}

/// Scaler for (5,) usage rows, shared by the sequence and tree models
#[derive(Debug, Clone, PartialEq)]
pub struct WindowScaler(StandardScaler);

impl WindowScaler {
    pub fn new(inner: StandardScaler) -> Result<Self, ArtifactError> {
        inner.validate(&USAGE_FEATURES)?;
        Ok(Self(inner))
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        Self::new(StandardScaler::load(path)?)
    }

    pub fn transform(&self, row: &[f32; FEATURE_COUNT]) -> [f32; FEATURE_COUNT] {
        self.0.transform_row(row)
    }
}

/// Scaler for the (5,) aggregate priority input, shared by the three classifiers
#[derive(Debug, Clone, PartialEq)]
pub struct PriorityScaler(StandardScaler);

impl PriorityScaler {
    pub fn new(inner: StandardScaler) -> Result<Self, ArtifactError> {
        inner.validate(&PRIORITY_FEATURES)?;
        Ok(Self(inner))
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        Self::new(StandardScaler::load(path)?)
    }

    pub fn transform(&self, row: &[f32; 5]) -> [f32; 5] {
        self.0.transform_row(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_matches_population_std() {
        let rows = vec![
            [1.0f32, 10.0, 0.0, 50.0, 0.0],
            [3.0, 30.0, 0.0, 70.0, 2.0],
        ];
        let scaler = StandardScaler::fit(&USAGE_FEATURES, &rows);

        assert_eq!(scaler.mean, vec![2.0, 20.0, 0.0, 60.0, 1.0]);
        assert_eq!(scaler.scale, vec![1.0, 10.0, 1.0, 10.0, 1.0]);

        let window = WindowScaler::new(scaler).unwrap();
        assert_eq!(window.transform(&[3.0, 30.0, 0.0, 70.0, 2.0]), [1.0, 1.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_scalers_cannot_be_interchanged() {
        let rows = vec![[1.0f32, 2.0, 3.0, 4.0, 5.0]];
        let usage = StandardScaler::fit(&USAGE_FEATURES, &rows);
        let priority = StandardScaler::fit(&PRIORITY_FEATURES, &rows);

        assert!(WindowScaler::new(usage.clone()).is_ok());
        assert!(PriorityScaler::new(usage).is_err());
        assert!(WindowScaler::new(priority).is_err());
    }

    #[test]
    fn test_unnamed_scaler_checks_width_only() {
        let scaler = StandardScaler {
            feature_names: vec![],
            mean: vec![0.0; 4],
            scale: vec![1.0; 4],
        };
        assert!(matches!(WindowScaler::new(scaler), Err(ArtifactError::Shape(_))));
    }

    #[test]
    fn test_save_load_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.json");

        let original = StandardScaler::fit(&PRIORITY_FEATURES, &[[2.0f32, 4.0, 1.0, 3.0, 0.0], [4.0, 8.0, 3.0, 5.0, 1.0]]);
        original.save(&path).unwrap();

        let loaded = PriorityScaler::load(&path).unwrap();
        assert_eq!(loaded, PriorityScaler::new(original).unwrap());
    }
}
