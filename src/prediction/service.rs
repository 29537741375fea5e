//! Prediction Service
//!
//! Operations exposed to the routing layer. Every batch operation reports a
//! per-equipment outcome plus a summary; one equipment failing never aborts
//! the rest of the batch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{MaintenanceEntry, PriorityLabel, StoredPrediction, StoredPriority};
use crate::store::{MaintenanceStore, StoreError, WriteOutcome};
use super::ensemble::{self, EnsembleOutcome, EnsembleResult, PredictionMethod};
use super::features::{build_windows, PriorityFeatures};
use super::priority::{MaintenanceCategory, PriorityAssessment};
use super::registry::ModelRegistry;
use super::{PredictError, MAX_WRITE_ATTEMPTS};

// ============================================================================
// REPORTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Updated,
    Preserved,
    Failed,
}

/// Outcome for one equipment in a prediction cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionEntry {
    pub equipment_id: String,
    pub status: EntryStatus,
    /// Value now in the store (absent when nothing is stored or the write failed)
    pub needs_maintenance_10_days: Option<bool>,
    pub failure_probability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictionEntry {
    fn stored(status: EntryStatus, equipment_id: &str, row: Option<&StoredPrediction>) -> Self {
        Self {
            equipment_id: equipment_id.to_string(),
            status,
            needs_maintenance_10_days: row.map(|r| r.needs_maintenance_10_days),
            failure_probability: row.map(|r| r.failure_probability),
            error: None,
        }
    }

    fn failed(equipment_id: &str, error: &StoreError) -> Self {
        Self {
            equipment_id: equipment_id.to_string(),
            status: EntryStatus::Failed,
            needs_maintenance_10_days: None,
            failure_probability: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub total: usize,
    pub updated: usize,
    pub preserved: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub results: Vec<PredictionEntry>,
    pub method: PredictionMethod,
    pub summary: CycleSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CycleOutcome {
    InsufficientData { message: String },
    Completed(CycleReport),
}

/// Priority triple for one equipment, from the cache or freshly classified
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityReport {
    pub equipment_id: String,
    pub predicted_to_fail: bool,
    pub maintenance_needs: PriorityAssessment,
    pub cached: bool,
}

impl PriorityReport {
    fn from_stored(row: StoredPriority, cached: bool) -> Self {
        Self {
            equipment_id: row.equipment_id,
            predicted_to_fail: row.predicted_to_fail,
            maintenance_needs: PriorityAssessment {
                preventive: row.preventive,
                corrective: row.corrective,
                replacement: row.replacement,
            },
            cached,
        }
    }

    /// Human-readable reasons this equipment needs attention
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.predicted_to_fail {
            issues.push("Likely to fail in 10 days".to_string());
        }
        for category in MaintenanceCategory::ALL {
            if self.maintenance_needs.get(category) == PriorityLabel::High {
                issues.push(format!("{} maintenance needed", category.as_str()));
            }
        }
        issues
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthAlert {
    pub equipment_id: String,
    pub health_status: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthFailure {
    pub equipment_id: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub checked: usize,
    pub health_status: Vec<HealthAlert>,
    pub failed: Vec<HealthFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResetReport {
    pub equipment_id: String,
    pub prediction: StoredPrediction,
    pub priority: StoredPriority,
}

// ============================================================================
// SERVICE
// ============================================================================

pub struct PredictionService {
    store: Arc<dyn MaintenanceStore>,
    registry: Arc<ModelRegistry>,
}

impl PredictionService {
    pub fn new(store: Arc<dyn MaintenanceStore>, registry: Arc<ModelRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Routine cycle; protected equipment keeps its stored prediction
    pub async fn run_failure_predictions(&self) -> Result<CycleOutcome, PredictError> {
        self.run_cycle(true).await
    }

    /// Administrative override that overwrites every equipment, protected or not
    pub async fn force_run_failure_predictions(&self) -> Result<CycleOutcome, PredictError> {
        tracing::warn!("Force update requested: maintenance protection bypassed");
        self.run_cycle(false).await
    }

    async fn run_cycle(&self, guarded: bool) -> Result<CycleOutcome, PredictError> {
        let records = self.store.usage_records().await?;
        let registry = Arc::clone(&self.registry);

        let outcome = tokio::task::spawn_blocking(move || {
            let windows = build_windows(&records);
            tracing::info!("Prediction cycle: {} eligible equipment", windows.len());
            ensemble::predict(&registry, &windows)
        })
        .await
        .map_err(|e| PredictError::Inference(format!("Inference task failed: {}", e)))?;

        let (method, scored) = match outcome {
            EnsembleOutcome::InsufficientData => {
                tracing::info!("No equipment has enough usage history; nothing to predict");
                return Ok(CycleOutcome::InsufficientData {
                    message: "Not enough data for any equipment.".to_string(),
                });
            }
            EnsembleOutcome::Scored { method, results } => (method, results),
        };

        let now = Utc::now();
        let mut summary = CycleSummary { total: scored.len(), ..Default::default() };
        let mut results = Vec::with_capacity(scored.len());

        for result in &scored {
            let row = stored_row(result, now);
            let entry = match self.write_prediction(&row, guarded, now).await {
                Ok(WriteOutcome::Updated(stored)) => {
                    summary.updated += 1;
                    PredictionEntry::stored(EntryStatus::Updated, &result.equipment_id, Some(&stored))
                }
                Ok(WriteOutcome::Preserved(stored)) => {
                    tracing::info!("Preserving {}: recent maintenance protection", result.equipment_id);
                    summary.preserved += 1;
                    PredictionEntry::stored(EntryStatus::Preserved, &result.equipment_id, stored.as_ref())
                }
                Err(e) => {
                    tracing::error!("Failed to store prediction for {}: {}", result.equipment_id, e);
                    summary.failed += 1;
                    PredictionEntry::failed(&result.equipment_id, &e)
                }
            };
            results.push(entry);
        }

        tracing::info!(
            "Prediction cycle done ({}): {} updated, {} preserved, {} failed",
            method.as_str(), summary.updated, summary.preserved, summary.failed
        );

        Ok(CycleOutcome::Completed(CycleReport { results, method, summary }))
    }

    /// Bounded retry on write conflicts; each attempt re-reads protection state
    async fn write_prediction(
        &self,
        row: &StoredPrediction,
        guarded: bool,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, StoreError> {
        let mut attempt = 1;
        loop {
            let result = if guarded {
                self.store.upsert_prediction_guarded(row, now).await
            } else {
                self.store.upsert_prediction(row).await.map(WriteOutcome::Updated)
            };

            match result {
                Err(StoreError::Conflict(key)) if attempt < MAX_WRITE_ATTEMPTS => {
                    tracing::warn!(
                        "Write conflict on {} (attempt {}/{}), retrying",
                        key, attempt, MAX_WRITE_ATTEMPTS
                    );
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Cached priority when present, otherwise classify and cache
    pub async fn get_priority(&self, equipment_id: &str) -> Result<PriorityReport, PredictError> {
        let equipment = self.store.equipment(equipment_id).await?
            .ok_or_else(|| PredictError::EquipmentNotFound(equipment_id.to_string()))?;

        if let Some(cached) = self.store.priority(equipment_id).await? {
            tracing::debug!("Priority cache hit for {}", equipment_id);
            return Ok(PriorityReport::from_stored(cached, true));
        }

        let logs = self.store.maintenance_logs(equipment_id).await?;
        let latest = self.store.prediction(equipment_id).await?;
        let now = Utc::now();

        let features = PriorityFeatures::build(&equipment, &logs, latest.as_ref(), now.date_naive());
        let assessment = self.registry.priority_classifiers()?.classify(&features)?;

        let row = StoredPriority {
            equipment_id: equipment_id.to_string(),
            predicted_to_fail: features.needs_maintenance_10_days,
            preventive: assessment.preventive,
            corrective: assessment.corrective,
            replacement: assessment.replacement,
            last_updated: now,
        };
        self.store.upsert_priority(&row).await?;

        tracing::debug!("Priority computed for {}: {:?}", equipment_id, assessment);
        Ok(PriorityReport::from_stored(row, false))
    }

    /// Priority for the whole fleet; lists only equipment that needs attention
    pub async fn equipment_health(&self) -> Result<HealthReport, PredictError> {
        let ids = self.store.equipment_ids().await?;
        let mut alerts = Vec::new();
        let mut failed = Vec::new();

        for equipment_id in &ids {
            match self.get_priority(equipment_id).await {
                Ok(report) => {
                    let issues = report.issues();
                    if !issues.is_empty() {
                        alerts.push(HealthAlert {
                            equipment_id: equipment_id.clone(),
                            health_status: "Attention Needed",
                            message: issues.join("; "),
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!("Health check skipped {}: {}", equipment_id, e);
                    failed.push(HealthFailure {
                        equipment_id: equipment_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(HealthReport { checked: ids.len(), health_status: alerts, failed })
    }

    /// Write the post-maintenance sentinel; starts the protection window
    pub async fn reset_equipment_state(&self, equipment_id: &str) -> Result<ResetReport, PredictError> {
        if self.store.equipment(equipment_id).await?.is_none() {
            return Err(PredictError::EquipmentNotFound(equipment_id.to_string()));
        }

        let (prediction, priority) = self.store.reset_equipment(equipment_id, Utc::now()).await?;
        tracing::info!("Reset health predictions for {}", equipment_id);

        Ok(ResetReport {
            equipment_id: equipment_id.to_string(),
            prediction,
            priority,
        })
    }

    /// Store a maintenance entry. A confirmed or approved completion also resets
    /// the equipment, so the protection window shields the all-clear values.
    pub async fn record_maintenance(&self, entry: MaintenanceEntry) -> Result<(), PredictError> {
        let equipment_id = entry.equipment_id().to_string();
        if self.store.equipment(&equipment_id).await?.is_none() {
            return Err(PredictError::EquipmentNotFound(equipment_id));
        }

        let log = entry.into_log();
        if log.is_confirmed_completion() {
            self.store.insert_confirmed_maintenance(&log, Utc::now()).await?;
            tracing::info!(
                "Maintenance {} confirmed for {}; health predictions reset",
                log.maintenance_id, equipment_id
            );
        } else {
            self.store.insert_maintenance_log(&log).await?;
            tracing::info!("Maintenance {} recorded for {}", log.maintenance_id, equipment_id);
        }
        Ok(())
    }
}

fn stored_row(result: &EnsembleResult, now: DateTime<Utc>) -> StoredPrediction {
    StoredPrediction {
        equipment_id: result.equipment_id.clone(),
        prediction_date: now,
        needs_maintenance_10_days: result.needs_maintenance,
        failure_probability: round4(result.failure_probability),
        is_reset: false,
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
