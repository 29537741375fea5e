use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::{Equipment, MaintenanceLog, StoredPrediction, StoredPriority, UsageRecord};
use crate::prediction::guard::protection_cutoff;

use super::{MaintenanceStore, StoreError, WriteOutcome};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MaintenanceStore for PgStore {
    async fn usage_records(&self) -> Result<Vec<UsageRecord>, StoreError> {
        Ok(UsageRecord::list_recent_first(&self.pool).await?)
    }

    async fn equipment(&self, equipment_id: &str) -> Result<Option<Equipment>, StoreError> {
        Ok(Equipment::find_by_id(&self.pool, equipment_id).await?)
    }

    async fn equipment_ids(&self) -> Result<Vec<String>, StoreError> {
        Ok(Equipment::list_ids(&self.pool).await?)
    }

    async fn maintenance_logs(&self, equipment_id: &str) -> Result<Vec<MaintenanceLog>, StoreError> {
        Ok(MaintenanceLog::list_by_equipment(&self.pool, equipment_id).await?)
    }

    async fn insert_maintenance_log(&self, log: &MaintenanceLog) -> Result<(), StoreError> {
        Ok(MaintenanceLog::insert(&self.pool, log).await?)
    }

    async fn insert_confirmed_maintenance(
        &self,
        log: &MaintenanceLog,
        now: DateTime<Utc>,
    ) -> Result<(StoredPrediction, StoredPriority), StoreError> {
        let prediction = StoredPrediction::reset(&log.equipment_id, now);
        let priority = StoredPriority::reset(&log.equipment_id, now);

        let mut tx = self.pool.begin().await?;
        MaintenanceLog::insert(&mut *tx, log).await?;
        let stored = StoredPrediction::upsert(&mut *tx, &prediction).await?;
        StoredPriority::upsert(&mut *tx, &priority).await?;
        tx.commit().await?;

        Ok((stored, priority))
    }

    async fn prediction(&self, equipment_id: &str) -> Result<Option<StoredPrediction>, StoreError> {
        Ok(StoredPrediction::find_by_equipment(&self.pool, equipment_id).await?)
    }

    async fn upsert_prediction_guarded(
        &self,
        prediction: &StoredPrediction,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, StoreError> {
        let written = StoredPrediction::upsert_unless_protected(
            &self.pool,
            prediction,
            protection_cutoff(now),
        )
        .await?;

        match written {
            Some(row) => Ok(WriteOutcome::Updated(row)),
            None => {
                let current = StoredPrediction::find_by_equipment(&self.pool, &prediction.equipment_id).await?;
                Ok(WriteOutcome::Preserved(current))
            }
        }
    }

    async fn upsert_prediction(&self, prediction: &StoredPrediction) -> Result<StoredPrediction, StoreError> {
        Ok(StoredPrediction::upsert(&self.pool, prediction).await?)
    }

    async fn priority(&self, equipment_id: &str) -> Result<Option<StoredPriority>, StoreError> {
        Ok(StoredPriority::find_by_equipment(&self.pool, equipment_id).await?)
    }

    async fn upsert_priority(&self, priority: &StoredPriority) -> Result<(), StoreError> {
        Ok(StoredPriority::upsert(&self.pool, priority).await?)
    }

    async fn reset_equipment(
        &self,
        equipment_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(StoredPrediction, StoredPriority), StoreError> {
        let prediction = StoredPrediction::reset(equipment_id, now);
        let priority = StoredPriority::reset(equipment_id, now);

        let mut tx = self.pool.begin().await?;
        let stored = StoredPrediction::upsert(&mut *tx, &prediction).await?;
        StoredPriority::upsert(&mut *tx, &priority).await?;
        tx.commit().await?;

        Ok((stored, priority))
    }
}
