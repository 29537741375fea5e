use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::models::{Equipment, MaintenanceLog, StoredPrediction, StoredPriority, UsageRecord};
use crate::prediction::guard;

use super::{MaintenanceStore, StoreError, WriteOutcome};

/// In-process store; one lock makes every guarded write atomic
#[derive(Default, Clone)]
pub struct MemoryStore(Arc<Mutex<StoreInner>>);

#[derive(Default, Debug)]
struct StoreInner {
    /// Equipment metadata by id
    equipment: HashMap<String, Equipment>,
    /// Usage readings in insertion order
    usage: Vec<UsageRecord>,
    /// Maintenance logs in insertion order
    maintenance: Vec<MaintenanceLog>,
    /// Latest failure prediction by equipment id
    predictions: HashMap<String, StoredPrediction>,
    /// Latest priority triple by equipment id
    priorities: HashMap<String, StoredPriority>,
    /// Upcoming prediction writes to reject with a conflict
    pending_conflicts: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_equipment(&self, equipment: Equipment) {
        self.0.lock().equipment.insert(equipment.equipment_id.clone(), equipment);
    }

    pub fn add_usage(&self, records: impl IntoIterator<Item = UsageRecord>) {
        self.0.lock().usage.extend(records);
    }

    pub fn add_maintenance_log(&self, log: MaintenanceLog) {
        self.0.lock().maintenance.push(log);
    }

    pub fn set_prediction(&self, prediction: StoredPrediction) {
        self.0.lock().predictions.insert(prediction.equipment_id.clone(), prediction);
    }

    pub fn set_priority(&self, priority: StoredPriority) {
        self.0.lock().priorities.insert(priority.equipment_id.clone(), priority);
    }

    /// Make the next `count` prediction writes fail as if a racing writer won
    pub fn fail_next_prediction_writes(&self, count: usize) {
        self.0.lock().pending_conflicts = count;
    }
}

impl StoreInner {
    fn take_conflict(&mut self, equipment_id: &str) -> Result<(), StoreError> {
        if self.pending_conflicts > 0 {
            self.pending_conflicts -= 1;
            return Err(StoreError::Conflict(format!("failure_predictions.{}", equipment_id)));
        }
        Ok(())
    }

    fn logs_for(&self, equipment_id: &str) -> Vec<MaintenanceLog> {
        self.maintenance
            .iter()
            .filter(|log| log.equipment_id == equipment_id)
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl MaintenanceStore for MemoryStore {
    async fn usage_records(&self) -> Result<Vec<UsageRecord>, StoreError> {
        let mut records = self.0.lock().usage.clone();
        records.sort_by(|a, b| {
            a.equipment_id.cmp(&b.equipment_id).then(b.timestamp.cmp(&a.timestamp))
        });
        Ok(records)
    }

    async fn equipment(&self, equipment_id: &str) -> Result<Option<Equipment>, StoreError> {
        Ok(self.0.lock().equipment.get(equipment_id).cloned())
    }

    async fn equipment_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.0.lock().equipment.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn maintenance_logs(&self, equipment_id: &str) -> Result<Vec<MaintenanceLog>, StoreError> {
        let mut logs = self.0.lock().logs_for(equipment_id);
        logs.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(logs)
    }

    async fn insert_maintenance_log(&self, log: &MaintenanceLog) -> Result<(), StoreError> {
        let mut inner = self.0.lock();
        if inner.maintenance.iter().any(|l| l.maintenance_id == log.maintenance_id) {
            return Err(StoreError::Conflict(format!("maintenance_logs.{}", log.maintenance_id)));
        }
        inner.maintenance.push(log.clone());
        Ok(())
    }

    async fn insert_confirmed_maintenance(
        &self,
        log: &MaintenanceLog,
        now: DateTime<Utc>,
    ) -> Result<(StoredPrediction, StoredPriority), StoreError> {
        let prediction = StoredPrediction::reset(&log.equipment_id, now);
        let priority = StoredPriority::reset(&log.equipment_id, now);

        let mut inner = self.0.lock();
        if inner.maintenance.iter().any(|l| l.maintenance_id == log.maintenance_id) {
            return Err(StoreError::Conflict(format!("maintenance_logs.{}", log.maintenance_id)));
        }
        inner.maintenance.push(log.clone());
        inner.predictions.insert(log.equipment_id.clone(), prediction.clone());
        inner.priorities.insert(log.equipment_id.clone(), priority.clone());

        Ok((prediction, priority))
    }

    async fn prediction(&self, equipment_id: &str) -> Result<Option<StoredPrediction>, StoreError> {
        Ok(self.0.lock().predictions.get(equipment_id).cloned())
    }

    async fn upsert_prediction_guarded(
        &self,
        prediction: &StoredPrediction,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, StoreError> {
        let mut inner = self.0.lock();
        inner.take_conflict(&prediction.equipment_id)?;

        let logs = inner.logs_for(&prediction.equipment_id);
        let stored = inner.predictions.get(&prediction.equipment_id);

        if guard::evaluate(now, &logs, stored).is_protected() {
            return Ok(WriteOutcome::Preserved(stored.cloned()));
        }

        let row = StoredPrediction { is_reset: false, ..prediction.clone() };
        inner.predictions.insert(row.equipment_id.clone(), row.clone());
        Ok(WriteOutcome::Updated(row))
    }

    async fn upsert_prediction(&self, prediction: &StoredPrediction) -> Result<StoredPrediction, StoreError> {
        let mut inner = self.0.lock();
        inner.take_conflict(&prediction.equipment_id)?;
        inner.predictions.insert(prediction.equipment_id.clone(), prediction.clone());
        Ok(prediction.clone())
    }

    async fn priority(&self, equipment_id: &str) -> Result<Option<StoredPriority>, StoreError> {
        Ok(self.0.lock().priorities.get(equipment_id).cloned())
    }

    async fn upsert_priority(&self, priority: &StoredPriority) -> Result<(), StoreError> {
        self.0.lock().priorities.insert(priority.equipment_id.clone(), priority.clone());
        Ok(())
    }

    async fn reset_equipment(
        &self,
        equipment_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(StoredPrediction, StoredPriority), StoreError> {
        let prediction = StoredPrediction::reset(equipment_id, now);
        let priority = StoredPriority::reset(equipment_id, now);

        let mut inner = self.0.lock();
        inner.predictions.insert(equipment_id.to_string(), prediction.clone());
        inner.priorities.insert(equipment_id.to_string(), priority.clone());

        Ok((prediction, priority))
    }
}
