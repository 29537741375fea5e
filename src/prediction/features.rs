//! Feature Builder
//!
//! Turns raw usage logs into fixed (5, 5) windows for the failure ensemble,
//! and maintenance history into the aggregate input of the priority classifiers.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{Equipment, MaintenanceLog, StoredPrediction, UsageRecord};
use super::{FEATURE_COUNT, WINDOW_LEN};

/// Usage feature order (must match the window scaler and both models)
pub const USAGE_FEATURES: [&str; FEATURE_COUNT] = [
    "usage_hours",
    "patients_served",
    "workload_level",
    "avg_cpu_temp",
    "error_count",
];

/// Priority feature order (must match the priority scaler and classifiers)
pub const PRIORITY_FEATURES: [&str; 5] = [
    "equipment_age",
    "downtime_hours",
    "num_failures",
    "response_time_hours",
    "needs_maintenance_10_days",
];

pub type FeatureRow = [f32; FEATURE_COUNT];

// ============================================================================
// USAGE WINDOWS
// ============================================================================

/// Five most recent readings of one equipment, oldest first
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureWindow {
    pub equipment_id: String,
    pub steps: [FeatureRow; WINDOW_LEN],
}

impl FeatureWindow {
    /// Build from one equipment's records; `None` when fewer than 5 exist
    pub fn from_records(equipment_id: &str, records: &[&UsageRecord]) -> Option<Self> {
        if records.len() < WINDOW_LEN {
            return None;
        }

        let mut recent: Vec<&UsageRecord> = records.to_vec();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(WINDOW_LEN);
        recent.reverse();

        let mut steps = [[0.0f32; FEATURE_COUNT]; WINDOW_LEN];
        for (step, record) in steps.iter_mut().zip(recent) {
            *step = record.features();
        }

        Some(Self {
            equipment_id: equipment_id.to_string(),
            steps,
        })
    }

    /// Most recent reading
    pub fn latest(&self) -> &FeatureRow {
        &self.steps[WINDOW_LEN - 1]
    }

    /// Row-major (25,) view used by the tree model
    pub fn flatten(&self) -> [f32; WINDOW_LEN * FEATURE_COUNT] {
        let mut flat = [0.0f32; WINDOW_LEN * FEATURE_COUNT];
        for (i, step) in self.steps.iter().enumerate() {
            flat[i * FEATURE_COUNT..(i + 1) * FEATURE_COUNT].copy_from_slice(step);
        }
        flat
    }
}

/// One window per equipment with at least 5 readings, ordered by equipment id.
/// Equipment with fewer readings is skipped for this cycle.
pub fn build_windows(records: &[UsageRecord]) -> Vec<FeatureWindow> {
    let mut grouped: BTreeMap<&str, Vec<&UsageRecord>> = BTreeMap::new();
    for record in records {
        grouped.entry(record.equipment_id.as_str()).or_default().push(record);
    }

    grouped
        .into_iter()
        .filter_map(|(equipment_id, group)| {
            let window = FeatureWindow::from_records(equipment_id, &group);
            if window.is_none() {
                tracing::debug!(
                    "Skipping {}: {} usage records (need {})",
                    equipment_id, group.len(), WINDOW_LEN
                );
            }
            window
        })
        .collect()
}

// ============================================================================
// PRIORITY AGGREGATES
// ============================================================================

/// Per-equipment input of the priority classifiers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityFeatures {
    pub equipment_id: String,
    pub equipment_age_years: i64,
    pub downtime_hours_sum: f64,
    pub num_failures: u32,
    pub avg_response_time_hours: f64,
    pub needs_maintenance_10_days: bool,
}

impl PriorityFeatures {
    /// Join equipment metadata, performed maintenance and the latest failure flag.
    /// Only logs with a status other than Scheduled count as history.
    pub fn build(
        equipment: &Equipment,
        logs: &[MaintenanceLog],
        latest: Option<&StoredPrediction>,
        today: NaiveDate,
    ) -> Self {
        let performed: Vec<&MaintenanceLog> = logs
            .iter()
            .filter(|log| log.equipment_id == equipment.equipment_id && log.is_performed())
            .collect();

        let downtime_hours_sum = performed
            .iter()
            .filter_map(|log| log.downtime_hours)
            .sum();

        let response_times: Vec<f64> = performed
            .iter()
            .filter_map(|log| log.response_time_hours)
            .collect();
        let avg_response_time_hours = if response_times.is_empty() {
            0.0
        } else {
            response_times.iter().sum::<f64>() / response_times.len() as f64
        };

        Self {
            equipment_id: equipment.equipment_id.clone(),
            equipment_age_years: equipment_age_years(equipment.installation_date, today),
            downtime_hours_sum,
            num_failures: performed.len() as u32,
            avg_response_time_hours,
            needs_maintenance_10_days: latest.map_or(false, |p| p.needs_maintenance_10_days),
        }
    }

    /// Values in `PRIORITY_FEATURES` order
    pub fn to_vector(&self) -> [f32; 5] {
        [
            self.equipment_age_years as f32,
            self.downtime_hours_sum as f32,
            self.num_failures as f32,
            self.avg_response_time_hours as f32,
            if self.needs_maintenance_10_days { 1.0 } else { 0.0 },
        ]
    }
}

/// Whole years as `days // 365`; leap days are ignored to match the trained labels
pub fn equipment_age_years(installed: NaiveDate, today: NaiveDate) -> i64 {
    (today - installed).num_days().div_euclid(365)
}
