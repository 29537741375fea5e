//! Storage API for the prediction core
//!
//! Everything the prediction service reads or writes goes through
//! [`MaintenanceStore`], backed by PostgreSQL in production and by an
//! in-memory map in tests.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use chrono::{DateTime, Utc};

use crate::models::{Equipment, MaintenanceLog, StoredPrediction, StoredPriority, UsageRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Conflicting write for {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.constraint().unwrap_or("unique key").to_string())
            }
            _ => StoreError::Database(err.to_string()),
        }
    }
}

/// Result of a guarded prediction write
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Updated(StoredPrediction),
    /// Skipped because the equipment is protected; carries the row left in place
    Preserved(Option<StoredPrediction>),
}

// We need async_trait because the stabilized feature lacks support for object safety
// (i.e. dyn MaintenanceStore)
#[async_trait::async_trait]
pub trait MaintenanceStore: Send + Sync {
    /// All usage records, newest first within each equipment
    async fn usage_records(&self) -> Result<Vec<UsageRecord>, StoreError>;

    async fn equipment(&self, equipment_id: &str) -> Result<Option<Equipment>, StoreError>;

    async fn equipment_ids(&self) -> Result<Vec<String>, StoreError>;

    async fn maintenance_logs(&self, equipment_id: &str) -> Result<Vec<MaintenanceLog>, StoreError>;

    async fn insert_maintenance_log(&self, log: &MaintenanceLog) -> Result<(), StoreError>;

    /// Insert a confirmed completion and write the reset rows in the same step
    async fn insert_confirmed_maintenance(
        &self,
        log: &MaintenanceLog,
        now: DateTime<Utc>,
    ) -> Result<(StoredPrediction, StoredPriority), StoreError>;

    async fn prediction(&self, equipment_id: &str) -> Result<Option<StoredPrediction>, StoreError>;

    /// Protection check and write as one atomic step
    async fn upsert_prediction_guarded(
        &self,
        prediction: &StoredPrediction,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, StoreError>;

    /// Write ignoring protection (administrative override)
    async fn upsert_prediction(&self, prediction: &StoredPrediction) -> Result<StoredPrediction, StoreError>;

    async fn priority(&self, equipment_id: &str) -> Result<Option<StoredPriority>, StoreError>;

    async fn upsert_priority(&self, priority: &StoredPriority) -> Result<(), StoreError>;

    /// Write the failure sentinel and the all-Low priority row together
    async fn reset_equipment(
        &self,
        equipment_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(StoredPrediction, StoredPriority), StoreError>;
}
