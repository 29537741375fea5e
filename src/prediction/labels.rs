//! Priority label derivation for offline training
//!
//! Each category gets a composite score per equipment; scores at or below the
//! 33rd percentile are Low, at or below the 66th Medium, the rest High.

use crate::models::PriorityLabel;
use super::features::PriorityFeatures;
use super::priority::{MaintenanceCategory, PriorityAssessment};

const LOW_QUANTILE: f64 = 0.33;
const MEDIUM_QUANTILE: f64 = 0.66;

pub fn composite_score(category: MaintenanceCategory, features: &PriorityFeatures) -> f64 {
    let age = features.equipment_age_years as f64;
    let failures = features.num_failures as f64;
    let flag = if features.needs_maintenance_10_days { 1.0 } else { 0.0 };

    match category {
        MaintenanceCategory::Preventive => age,
        MaintenanceCategory::Corrective => failures + features.downtime_hours_sum + 50.0 * flag,
        MaintenanceCategory::Replacement => age + failures + 30.0 * flag,
    }
}

/// Quantile with linear interpolation between closest ranks; `None` on empty input
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Label every value against the 33rd / 66th percentiles of the whole set
pub fn assign_quantile_labels(values: &[f64]) -> Vec<PriorityLabel> {
    let (Some(q1), Some(q2)) = (quantile(values, LOW_QUANTILE), quantile(values, MEDIUM_QUANTILE)) else {
        return Vec::new();
    };

    values
        .iter()
        .map(|&v| {
            if v <= q1 {
                PriorityLabel::Low
            } else if v <= q2 {
                PriorityLabel::Medium
            } else {
                PriorityLabel::High
            }
        })
        .collect()
}

/// Training labels for a whole fleet, in input order
pub fn label_dataset(rows: &[PriorityFeatures]) -> Vec<PriorityAssessment> {
    let [preventive, corrective, replacement] = MaintenanceCategory::ALL.map(|category| {
        let scores: Vec<f64> = rows.iter().map(|r| composite_score(category, r)).collect();
        assign_quantile_labels(&scores)
    });

    preventive
        .into_iter()
        .zip(corrective)
        .zip(replacement)
        .map(|((preventive, corrective), replacement)| PriorityAssessment {
            preventive,
            corrective,
            replacement,
        })
        .collect()
}
