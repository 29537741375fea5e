use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use ndarray::{Array2, Array3};

use crate::models::{
    Equipment, MaintenanceBase, MaintenanceEntry, MaintenanceLog, PriorityLabel, StoredPrediction,
    StoredPriority, UsageRecord, STATUS_COMPLETED,
};
use crate::store::{MaintenanceStore, MemoryStore};

use super::ensemble::{SequenceModel, TreeModel};
use super::features::{FeatureRow, PRIORITY_FEATURES, USAGE_FEATURES};
use super::priority::{MaintenanceCategory, PriorityModel};
use super::scaler::{PriorityScaler, StandardScaler, WindowScaler};
use super::service::{CycleOutcome, CycleReport, EntryStatus, PredictionService};
use super::*;

// ============================================================================
// FIXTURES
// ============================================================================

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

fn equipment(equipment_id: &str) -> Equipment {
    Equipment {
        equipment_id: equipment_id.to_string(),
        equipment_type: Some("Ventilator".to_string()),
        manufacturer: Some("Philips".to_string()),
        location: Some("ICU".to_string()),
        criticality: Some("High".to_string()),
        installation_date: NaiveDate::from_ymd_opt(2018, 1, 15).unwrap(),
    }
}

/// Five hourly readings ending one hour ago, oldest first
fn readings(equipment_id: &str, rows: &[FeatureRow]) -> Vec<UsageRecord> {
    let start = Utc::now() - Duration::hours(rows.len() as i64);
    rows.iter()
        .enumerate()
        .map(|(i, r)| UsageRecord {
            equipment_id: equipment_id.to_string(),
            timestamp: start + Duration::hours(i as i64),
            usage_hours: r[0] as f64,
            patients_served: r[1] as i32,
            workload_level: r[2] as f64,
            avg_cpu_temp: r[3] as f64,
            error_count: r[4] as i32,
        })
        .collect()
}

fn confirmed_maintenance(equipment_id: &str, hours_ago: i64) -> MaintenanceLog {
    MaintenanceLog {
        maintenance_id: format!("MTN-{}-{}", equipment_id, hours_ago),
        equipment_id: equipment_id.to_string(),
        date: Utc::now() - Duration::hours(hours_ago),
        maintenance_type: "Corrective".to_string(),
        downtime_hours: Some(3.0),
        cost_inr: Some(4500.0),
        issue_description: Some("Sensor recalibration".to_string()),
        technician_id: Some("T07".to_string()),
        service_rating: Some(4),
        response_time_hours: Some(2.0),
        completion_status: Some("Confirmed".to_string()),
        status: Some(STATUS_COMPLETED.to_string()),
    }
}

fn extended_entry(equipment_id: &str, completion_status: &str) -> MaintenanceEntry {
    MaintenanceEntry::Extended {
        base: MaintenanceBase {
            maintenance_id: format!("MTN-{}-{}", equipment_id, completion_status),
            equipment_id: equipment_id.to_string(),
            date: Utc::now() - Duration::hours(1),
            maintenance_type: "Corrective".to_string(),
            downtime_hours: 3.0,
            cost_inr: 4500.0,
            issue_description: "Compressor replaced".to_string(),
            technician_id: "T07".to_string(),
            completion_status: completion_status.to_string(),
        },
        service_rating: 5,
        response_time_hours: 2.0,
        status: STATUS_COMPLETED.to_string(),
    }
}

fn store_with(fleet: &[(&str, [FeatureRow; 5])]) -> MemoryStore {
    let store = MemoryStore::new();
    for (id, rows) in fleet {
        store.add_equipment(equipment(id));
        store.add_usage(readings(id, rows));
    }
    store
}

fn service(store: &MemoryStore, registry: ModelRegistry) -> PredictionService {
    PredictionService::new(Arc::new(store.clone()), Arc::new(registry))
}

fn completed(outcome: CycleOutcome) -> CycleReport {
    match outcome {
        CycleOutcome::Completed(report) => report,
        CycleOutcome::InsufficientData { message } => panic!("Unexpected insufficient data: {}", message),
    }
}

fn entry<'a>(report: &'a CycleReport, equipment_id: &str) -> &'a service::PredictionEntry {
    report.results.iter().find(|e| e.equipment_id == equipment_id).unwrap()
}

// ============================================================================
// STUB MODELS
// ============================================================================

/// Scores a window by its latest error count; stands in for both failure models
struct ErrorRate;

impl SequenceModel for ErrorRate {
    fn predict_batch(&self, batch: &Array3<f32>) -> Result<Vec<f32>, InferenceError> {
        Ok(batch.outer_iter().map(|w| if w[[4, 4]] > 2.0 { 0.9 } else { 0.1 }).collect())
    }
}

impl TreeModel for ErrorRate {
    fn predict_proba(&self, batch: &Array2<f32>) -> Result<Vec<f32>, InferenceError> {
        Ok(batch.outer_iter().map(|row| if row[24] > 2.0 { 0.7 } else { 0.2 }).collect())
    }
}

struct Fixed(i64);

impl PriorityModel for Fixed {
    fn predict_class(&self, _scaled: &[f32; 5]) -> Result<i64, InferenceError> {
        Ok(self.0)
    }
}

fn identity(names: &[&str]) -> StandardScaler {
    StandardScaler {
        feature_names: names.iter().map(|s| s.to_string()).collect(),
        mean: vec![0.0; 5],
        scale: vec![1.0; 5],
    }
}

fn ml_registry() -> ModelRegistry {
    ModelRegistry::empty()
        .with_sequence_model(Arc::new(ErrorRate))
        .with_tree_model(Arc::new(ErrorRate))
        .with_window_scaler(WindowScaler::new(identity(&USAGE_FEATURES)).unwrap())
}

fn priority_registry(preventive: i64, corrective: i64, replacement: i64) -> ModelRegistry {
    ModelRegistry::empty()
        .with_priority_scaler(PriorityScaler::new(identity(&PRIORITY_FEATURES)).unwrap())
        .with_classifier(MaintenanceCategory::Preventive, Arc::new(Fixed(preventive)))
        .with_classifier(MaintenanceCategory::Corrective, Arc::new(Fixed(corrective)))
        .with_classifier(MaintenanceCategory::Replacement, Arc::new(Fixed(replacement)))
}

// ============================================================================
// FAILURE CYCLE
// ============================================================================

#[tokio::test]
async fn test_risky_equipment_flagged_by_fallback() {
    let store = store_with(&[("EQ1", RISKY)]);
    let report = completed(service(&store, ModelRegistry::empty()).run_failure_predictions().await.unwrap());

    assert_eq!(report.method, PredictionMethod::Fallback);
    let eq1 = entry(&report, "EQ1");
    assert_eq!(eq1.status, EntryStatus::Updated);
    assert_eq!(eq1.needs_maintenance_10_days, Some(true));
    assert_eq!(eq1.failure_probability, Some(0.45));

    let stored = store.prediction("EQ1").await.unwrap().unwrap();
    assert!(stored.needs_maintenance_10_days);
    assert!(!stored.is_reset);
}

#[tokio::test]
async fn test_safe_equipment_clear_under_both_paths() {
    let store = store_with(&[("EQ2", SAFE)]);

    let fallback = completed(service(&store, ModelRegistry::empty()).run_failure_predictions().await.unwrap());
    assert_eq!(fallback.method, PredictionMethod::Fallback);
    assert_eq!(entry(&fallback, "EQ2").needs_maintenance_10_days, Some(false));

    let ml = completed(service(&store, ml_registry()).run_failure_predictions().await.unwrap());
    assert_eq!(ml.method, PredictionMethod::MlEnsemble);
    let eq2 = entry(&ml, "EQ2");
    assert_eq!(eq2.needs_maintenance_10_days, Some(false));
    // (0.1 + 0.2) / 2
    assert_eq!(eq2.failure_probability, Some(0.15));
}

#[tokio::test]
async fn test_recent_confirmation_preserves_sentinel() {
    let store = store_with(&[("EQ3", RISKY)]);
    let svc = service(&store, ModelRegistry::empty());
    store.add_maintenance_log(confirmed_maintenance("EQ3", 2));
    svc.reset_equipment_state("EQ3").await.unwrap();

    let report = completed(svc.run_failure_predictions().await.unwrap());
    let eq3 = entry(&report, "EQ3");
    assert_eq!(eq3.status, EntryStatus::Preserved);
    assert_eq!(eq3.failure_probability, Some(0.1));
    assert_eq!(report.summary.preserved, 1);
    assert_eq!(report.summary.updated, 0);

    let stored = store.prediction("EQ3").await.unwrap().unwrap();
    assert!(stored.holds_sentinel());
}

#[tokio::test]
async fn test_force_update_overwrites_protected_entry() {
    let store = store_with(&[("EQ3", RISKY)]);
    let svc = service(&store, ModelRegistry::empty());
    store.add_maintenance_log(confirmed_maintenance("EQ3", 2));
    svc.reset_equipment_state("EQ3").await.unwrap();

    let report = completed(svc.force_run_failure_predictions().await.unwrap());
    assert_eq!(entry(&report, "EQ3").status, EntryStatus::Updated);

    let stored = store.prediction("EQ3").await.unwrap().unwrap();
    assert_eq!(stored.failure_probability, 0.45);
    assert!(!stored.is_reset);
}

#[tokio::test]
async fn test_old_maintenance_no_longer_protects() {
    let store = store_with(&[("EQ3", RISKY)]);
    store.add_maintenance_log(confirmed_maintenance("EQ3", 25));
    store.set_prediction(StoredPrediction::reset("EQ3", Utc::now() - Duration::hours(25)));

    let report = completed(service(&store, ModelRegistry::empty()).run_failure_predictions().await.unwrap());
    assert_eq!(entry(&report, "EQ3").status, EntryStatus::Updated);
}

#[tokio::test]
async fn test_short_history_is_insufficient() {
    let store = MemoryStore::new();
    store.add_equipment(equipment("EQ5"));
    store.add_usage(readings("EQ5", &RISKY[..4]));

    let outcome = service(&store, ModelRegistry::empty()).run_failure_predictions().await.unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::InsufficientData { message: "Not enough data for any equipment.".to_string() }
    );
    assert!(store.prediction("EQ5").await.unwrap().is_none());
}

#[tokio::test]
async fn test_repeated_cycle_is_idempotent() {
    let store = store_with(&[("EQ1", RISKY), ("EQ2", SAFE)]);
    let svc = service(&store, ModelRegistry::empty());

    let first = completed(svc.run_failure_predictions().await.unwrap());
    let second = completed(svc.run_failure_predictions().await.unwrap());

    // A prediction write never creates protection on its own
    assert_eq!(first.summary.updated, 2);
    assert_eq!(second.summary.updated, 2);
    assert_eq!(first.results, second.results);
}

#[tokio::test]
async fn test_write_conflicts_are_retried() {
    let store = store_with(&[("EQ1", RISKY)]);
    store.fail_next_prediction_writes(MAX_WRITE_ATTEMPTS - 1);

    let report = completed(service(&store, ModelRegistry::empty()).run_failure_predictions().await.unwrap());
    assert_eq!(report.summary.updated, 1);
    assert_eq!(report.summary.failed, 0);
}

#[tokio::test]
async fn test_exhausted_retries_fail_one_equipment_only() {
    let store = store_with(&[("EQ1", RISKY), ("EQ2", SAFE)]);
    store.fail_next_prediction_writes(MAX_WRITE_ATTEMPTS);

    let report = completed(service(&store, ModelRegistry::empty()).run_failure_predictions().await.unwrap());
    assert_eq!(report.summary.total, 2);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.updated, 1);

    let eq1 = entry(&report, "EQ1");
    assert_eq!(eq1.status, EntryStatus::Failed);
    assert!(eq1.error.is_some());
    assert_eq!(entry(&report, "EQ2").status, EntryStatus::Updated);
}

// ============================================================================
// PRIORITY
// ============================================================================

#[tokio::test]
async fn test_priority_computed_then_cached() {
    let store = store_with(&[("EQ1", RISKY)]);
    let svc = service(&store, priority_registry(0, 1, 2));

    let first = svc.get_priority("EQ1").await.unwrap();
    assert!(!first.cached);
    assert_eq!(first.maintenance_needs.preventive, PriorityLabel::Low);
    assert_eq!(first.maintenance_needs.corrective, PriorityLabel::Medium);
    assert_eq!(first.maintenance_needs.replacement, PriorityLabel::High);

    let second = svc.get_priority("EQ1").await.unwrap();
    assert!(second.cached);
    assert_eq!(second.maintenance_needs, first.maintenance_needs);
}

#[tokio::test]
async fn test_priority_cache_hit_skips_models() {
    let store = store_with(&[("EQ1", RISKY)]);
    store.set_priority(StoredPriority {
        equipment_id: "EQ1".to_string(),
        predicted_to_fail: true,
        preventive: PriorityLabel::Medium,
        corrective: PriorityLabel::High,
        replacement: PriorityLabel::Low,
        last_updated: Utc::now(),
    });

    // No classifiers loaded: a miss would be an error
    let report = service(&store, ModelRegistry::empty()).get_priority("EQ1").await.unwrap();
    assert!(report.cached);
    assert!(report.predicted_to_fail);
    assert_eq!(report.maintenance_needs.corrective, PriorityLabel::High);
}

#[tokio::test]
async fn test_priority_without_classifiers_names_artifact() {
    let store = store_with(&[("EQ1", RISKY)]);
    let err = service(&store, ModelRegistry::empty()).get_priority("EQ1").await.unwrap_err();
    assert!(matches!(err, PredictError::ModelUnavailable { artifact: "multi_priority_scaler.json" }));
}

#[tokio::test]
async fn test_priority_unknown_equipment() {
    let store = MemoryStore::new();
    let err = service(&store, priority_registry(0, 0, 0)).get_priority("NOPE").await.unwrap_err();
    assert!(matches!(err, PredictError::EquipmentNotFound(id) if id == "NOPE"));
}

#[tokio::test]
async fn test_priority_uses_latest_failure_flag() {
    let store = store_with(&[("EQ1", RISKY)]);
    let svc = service(&store, priority_registry(0, 0, 0));
    svc.run_failure_predictions().await.unwrap();

    let report = svc.get_priority("EQ1").await.unwrap();
    assert!(report.predicted_to_fail);
}

// ============================================================================
// HEALTH AND RESET
// ============================================================================

#[tokio::test]
async fn test_equipment_health_lists_attention_needed() {
    let store = store_with(&[("EQ1", RISKY), ("EQ2", SAFE)]);
    store.set_priority(StoredPriority {
        equipment_id: "EQ1".to_string(),
        predicted_to_fail: true,
        preventive: PriorityLabel::High,
        corrective: PriorityLabel::Low,
        replacement: PriorityLabel::High,
        last_updated: Utc::now(),
    });
    store.set_priority(StoredPriority::reset("EQ2", Utc::now()));

    let report = service(&store, ModelRegistry::empty()).equipment_health().await.unwrap();
    assert_eq!(report.checked, 2);
    assert_eq!(report.health_status.len(), 1);
    assert_eq!(report.health_status[0].equipment_id, "EQ1");
    assert_eq!(
        report.health_status[0].message,
        "Likely to fail in 10 days; Preventive maintenance needed; Replacement maintenance needed"
    );
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn test_equipment_health_collects_failures() {
    let store = store_with(&[("EQ1", RISKY)]);
    let report = service(&store, ModelRegistry::empty()).equipment_health().await.unwrap();

    assert!(report.health_status.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].equipment_id, "EQ1");
}

#[tokio::test]
async fn test_reset_clears_priority_and_protects() {
    let store = store_with(&[("EQ1", RISKY)]);
    let svc = service(&store, ModelRegistry::empty());
    svc.run_failure_predictions().await.unwrap();

    let reset = svc.reset_equipment_state("EQ1").await.unwrap();
    assert!(reset.prediction.holds_sentinel());
    assert_eq!(reset.priority.preventive, PriorityLabel::Low);

    let cached = svc.get_priority("EQ1").await.unwrap();
    assert!(cached.cached);
    assert!(!cached.predicted_to_fail);

    let report = completed(svc.run_failure_predictions().await.unwrap());
    assert_eq!(entry(&report, "EQ1").status, EntryStatus::Preserved);
}

#[tokio::test]
async fn test_reset_unknown_equipment() {
    let store = MemoryStore::new();
    let err = service(&store, ModelRegistry::empty()).reset_equipment_state("EQ404").await.unwrap_err();
    assert!(matches!(err, PredictError::EquipmentNotFound(_)));
}

#[tokio::test]
async fn test_confirmed_entry_resets_before_protecting() {
    let store = store_with(&[("EQ3", RISKY)]);
    let svc = service(&store, ModelRegistry::empty());
    svc.run_failure_predictions().await.unwrap();
    store.set_priority(StoredPriority {
        equipment_id: "EQ3".to_string(),
        predicted_to_fail: true,
        preventive: PriorityLabel::High,
        corrective: PriorityLabel::High,
        replacement: PriorityLabel::Medium,
        last_updated: Utc::now(),
    });

    svc.record_maintenance(extended_entry("EQ3", "Confirmed")).await.unwrap();

    let report = completed(svc.run_failure_predictions().await.unwrap());
    let eq3 = entry(&report, "EQ3");
    assert_eq!(eq3.status, EntryStatus::Preserved);
    assert_eq!(eq3.needs_maintenance_10_days, Some(false));
    assert_eq!(eq3.failure_probability, Some(0.1));

    let priority = svc.get_priority("EQ3").await.unwrap();
    assert!(priority.cached);
    assert!(!priority.predicted_to_fail);
    assert_eq!(priority.maintenance_needs.preventive, PriorityLabel::Low);
    assert_eq!(store.maintenance_logs("EQ3").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unconfirmed_entry_keeps_prediction() {
    let store = store_with(&[("EQ3", RISKY)]);
    let svc = service(&store, ModelRegistry::empty());
    svc.run_failure_predictions().await.unwrap();

    svc.record_maintenance(extended_entry("EQ3", "Pending")).await.unwrap();

    let stored = store.prediction("EQ3").await.unwrap().unwrap();
    assert!(!stored.is_reset);
    assert_eq!(stored.failure_probability, 0.45);

    let report = completed(svc.run_failure_predictions().await.unwrap());
    assert_eq!(entry(&report, "EQ3").status, EntryStatus::Updated);
}
