//! Failure Ensemble
//!
//! Sequence model on (N, 5, 5) windows plus tree model on the flattened (N, 25)
//! rows, fused by arithmetic mean. When either model (or the window scaler) is
//! missing, or inference fails at runtime, a deterministic rule-based scorer
//! takes over and the outcome is tagged accordingly.

use ndarray::{Array2, Array3};
use serde::Serialize;

use super::features::FeatureWindow;
use super::registry::ModelRegistry;
use super::scaler::WindowScaler;
use super::{InferenceError, DECISION_THRESHOLD, FEATURE_COUNT, WINDOW_LEN};

// ============================================================================
// MODEL TRAITS
// ============================================================================

/// Sequence model over scaled windows, one probability per window
pub trait SequenceModel: Send + Sync {
    fn predict_batch(&self, batch: &Array3<f32>) -> Result<Vec<f32>, InferenceError>;
}

/// Tree model over flattened scaled windows, P(failure) per row
pub trait TreeModel: Send + Sync {
    fn predict_proba(&self, batch: &Array2<f32>) -> Result<Vec<f32>, InferenceError>;
}

// ============================================================================
// RESULTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMethod {
    MlEnsemble,
    Fallback,
}

impl PredictionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionMethod::MlEnsemble => "ml_ensemble",
            PredictionMethod::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleResult {
    pub equipment_id: String,
    pub failure_probability: f64,
    pub needs_maintenance: bool,
}

impl EnsembleResult {
    fn new(equipment_id: &str, failure_probability: f64) -> Self {
        Self {
            equipment_id: equipment_id.to_string(),
            failure_probability,
            needs_maintenance: decide(failure_probability),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnsembleOutcome {
    /// No equipment had a full window this cycle
    InsufficientData,
    Scored {
        method: PredictionMethod,
        results: Vec<EnsembleResult>,
    },
}

// ============================================================================
// FUSION
// ============================================================================

pub fn fuse(p_seq: f64, p_tree: f64) -> f64 {
    (p_seq + p_tree) / 2.0
}

/// Strictly above the threshold; exactly 0.40 does not flag
pub fn decide(probability: f64) -> bool {
    probability > DECISION_THRESHOLD
}

/// Score every window in one batched pass
pub fn predict(registry: &ModelRegistry, windows: &[FeatureWindow]) -> EnsembleOutcome {
    if windows.is_empty() {
        return EnsembleOutcome::InsufficientData;
    }

    if let Some((sequence, tree, scaler)) = registry.failure_models() {
        match predict_ml(sequence, tree, scaler, windows) {
            Ok(results) => {
                return EnsembleOutcome::Scored { method: PredictionMethod::MlEnsemble, results };
            }
            Err(e) => {
                tracing::warn!("ML ensemble failed, using fallback scorer: {}", e);
            }
        }
    } else {
        tracing::warn!("Failure models not loaded, using fallback scorer");
    }

    let results = windows
        .iter()
        .map(|w| EnsembleResult::new(&w.equipment_id, fallback_score(w)))
        .collect();

    EnsembleOutcome::Scored { method: PredictionMethod::Fallback, results }
}

/// One call per model for the whole batch
pub fn predict_ml(
    sequence: &dyn SequenceModel,
    tree: &dyn TreeModel,
    scaler: &WindowScaler,
    windows: &[FeatureWindow],
) -> Result<Vec<EnsembleResult>, InferenceError> {
    let n = windows.len();

    let mut scaled = Vec::with_capacity(n * WINDOW_LEN * FEATURE_COUNT);
    for window in windows {
        for step in &window.steps {
            scaled.extend_from_slice(&scaler.transform(step));
        }
    }

    let seq_batch = Array3::from_shape_vec((n, WINDOW_LEN, FEATURE_COUNT), scaled.clone())
        .map_err(|e| InferenceError(format!("Array error: {}", e)))?;
    let flat_batch = Array2::from_shape_vec((n, WINDOW_LEN * FEATURE_COUNT), scaled)
        .map_err(|e| InferenceError(format!("Array error: {}", e)))?;

    let p_seq = sequence.predict_batch(&seq_batch)?;
    let p_tree = tree.predict_proba(&flat_batch)?;

    if p_seq.len() != n || p_tree.len() != n {
        return Err(InferenceError(format!(
            "Expected {} probabilities, got {} (sequence) / {} (tree)",
            n, p_seq.len(), p_tree.len()
        )));
    }

    windows
        .iter()
        .zip(p_seq.into_iter().zip(p_tree))
        .map(|(window, (s, t))| {
            if !s.is_finite() || !t.is_finite() {
                return Err(InferenceError(format!(
                    "Non-finite probability for {}", window.equipment_id
                )));
            }
            let p = fuse(s.clamp(0.0, 1.0) as f64, t.clamp(0.0, 1.0) as f64);
            Ok(EnsembleResult::new(&window.equipment_id, p))
        })
        .collect()
}

// ============================================================================
// FALLBACK
// ============================================================================

const FALLBACK_CAP: f64 = 0.95;
const TREND_BONUS: f64 = 0.25;

/// Rule-based risk from the latest reading plus a sustained-trend bonus.
///
/// The four threshold rules (usage hours, error count, temperature, workload)
/// score the latest reading only. The trend bonus is an addition on top of
/// them and looks at all five features, `patients_served` included.
pub fn fallback_score(window: &FeatureWindow) -> f64 {
    let [usage_hours, _patients, workload_level, avg_cpu_temp, error_count] = *window.latest();
    let mut score = 0.0f64;

    if usage_hours > 8000.0 {
        score += 0.3;
    } else if usage_hours > 6000.0 {
        score += 0.2;
    }

    if error_count > 5.0 {
        score += 0.4;
    } else if error_count > 2.0 {
        score += 0.2;
    }

    if avg_cpu_temp > 75.0 {
        score += 0.3;
    } else if avg_cpu_temp > 65.0 {
        score += 0.1;
    }

    if workload_level > 80.0 {
        score += 0.2;
    }

    if rising_features(window) > FEATURE_COUNT * 7 / 10 {
        score += TREND_BONUS;
    }

    score.min(FALLBACK_CAP)
}

/// Features that never decrease across the window and end above where they started
fn rising_features(window: &FeatureWindow) -> usize {
    (0..FEATURE_COUNT)
        .filter(|&i| {
            let steady = window.steps.windows(2).all(|pair| pair[1][i] >= pair[0][i]);
            steady && window.latest()[i] > window.steps[0][i]
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::features::{FeatureRow, USAGE_FEATURES};
    use crate::prediction::scaler::StandardScaler;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const RISKY: [FeatureRow; 5] = [
        [5.5, 18.0, 0.60, 56.50, 1.0],
        [6.3, 20.0, 0.70, 58.30, 2.0],
        [7.1, 22.0, 0.80, 60.10, 3.0],
        [8.0, 24.0, 0.90, 62.00, 4.0],
        [9.0, 26.0, 1.00, 64.00, 5.0],
    ];

    const SAFE: [FeatureRow; 5] = [
        [4.87, 18.0, 0.49, 55.21, 0.0],
        [3.10, 12.0, 0.31, 45.84, 0.0],
        [3.08, 8.0, 0.31, 48.86, 0.0],
        [5.90, 17.0, 0.59, 47.91, 0.0],
        [8.84, 15.0, 0.88, 64.87, 1.0],
    ];

    fn window(id: &str, steps: [FeatureRow; 5]) -> FeatureWindow {
        FeatureWindow { equipment_id: id.to_string(), steps }
    }

    struct Constant {
        value: f32,
        calls: AtomicUsize,
    }

    impl Constant {
        fn new(value: f32) -> Arc<Self> {
            Arc::new(Self { value, calls: AtomicUsize::new(0) })
        }
    }

    impl SequenceModel for Constant {
        fn predict_batch(&self, batch: &Array3<f32>) -> Result<Vec<f32>, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![self.value; batch.shape()[0]])
        }
    }

    impl TreeModel for Constant {
        fn predict_proba(&self, batch: &Array2<f32>) -> Result<Vec<f32>, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(batch.shape()[1], 25);
            Ok(vec![self.value; batch.nrows()])
        }
    }

    struct Broken;

    impl SequenceModel for Broken {
        fn predict_batch(&self, _batch: &Array3<f32>) -> Result<Vec<f32>, InferenceError> {
            Err(InferenceError("session crashed".to_string()))
        }
    }

    fn identity_scaler() -> WindowScaler {
        WindowScaler::new(StandardScaler {
            feature_names: USAGE_FEATURES.iter().map(|s| s.to_string()).collect(),
            mean: vec![0.0; 5],
            scale: vec![1.0; 5],
        })
        .unwrap()
    }

    #[test]
    fn test_decision_boundary() {
        assert!(!decide(0.40));
        assert!(decide(0.4001));
        assert!(!decide(0.0));
    }

    #[test]
    fn test_fusion_is_mean() {
        assert_eq!(fuse(0.2, 0.6), 0.4);
        assert!(!decide(fuse(0.2, 0.6)));
        assert_eq!(fuse(1.0, 0.0), 0.5);
    }

    #[test]
    fn test_fallback_flags_risky_window() {
        let score = fallback_score(&window("EQ1", RISKY));
        assert!((score - 0.45).abs() < 1e-9);
        assert!(decide(score));
    }

    #[test]
    fn test_fallback_clears_safe_window() {
        let score = fallback_score(&window("EQ2", SAFE));
        assert_eq!(score, 0.0);
        assert!(!decide(score));
    }

    #[test]
    fn test_fallback_is_capped() {
        let hot = [[9000.0, 30.0, 95.0, 90.0, 9.0]; 5];
        assert_eq!(fallback_score(&window("EQ9", hot)), 0.95);
    }

    #[test]
    fn test_missing_models_use_fallback() {
        let outcome = predict(&ModelRegistry::empty(), &[window("EQ1", RISKY)]);
        match outcome {
            EnsembleOutcome::Scored { method, results } => {
                assert_eq!(method, PredictionMethod::Fallback);
                assert!(results[0].needs_maintenance);
            }
            EnsembleOutcome::InsufficientData => panic!("Expected scored outcome"),
        }
    }

    #[test]
    fn test_no_windows_is_insufficient() {
        assert_eq!(predict(&ModelRegistry::empty(), &[]), EnsembleOutcome::InsufficientData);
    }

    #[test]
    fn test_ml_batches_all_windows_in_one_call() {
        let seq = Constant::new(0.3);
        let tree = Constant::new(0.6);
        let registry = ModelRegistry::empty()
            .with_sequence_model(seq.clone())
            .with_tree_model(tree.clone())
            .with_window_scaler(identity_scaler());

        let windows = vec![window("EQ1", RISKY), window("EQ2", SAFE), window("EQ3", SAFE)];
        match predict(&registry, &windows) {
            EnsembleOutcome::Scored { method, results } => {
                assert_eq!(method, PredictionMethod::MlEnsemble);
                assert_eq!(results.len(), 3);
                for r in &results {
                    assert!((r.failure_probability - 0.45).abs() < 1e-6);
                    assert!(r.needs_maintenance);
                }
            }
            EnsembleOutcome::InsufficientData => panic!("Expected scored outcome"),
        }

        assert_eq!(seq.calls.load(Ordering::SeqCst), 1);
        assert_eq!(tree.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_runtime_failure_falls_back() {
        let registry = ModelRegistry::empty()
            .with_sequence_model(Arc::new(Broken))
            .with_tree_model(Constant::new(0.9))
            .with_window_scaler(identity_scaler());

        match predict(&registry, &[window("EQ2", SAFE)]) {
            EnsembleOutcome::Scored { method, results } => {
                assert_eq!(method, PredictionMethod::Fallback);
                assert!(!results[0].needs_maintenance);
            }
            EnsembleOutcome::InsufficientData => panic!("Expected scored outcome"),
        }
    }

    #[test]
    fn test_method_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&PredictionMethod::MlEnsemble).unwrap(), "\"ml_ensemble\"");
        assert_eq!(PredictionMethod::Fallback.as_str(), "fallback");
    }
}
