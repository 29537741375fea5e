//! Prediction store models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres};

/// Sentinel values written when maintenance is confirmed complete
pub const RESET_FAILURE_PROBABILITY: f64 = 0.1;
pub const RESET_NEEDS_MAINTENANCE: bool = false;

/// Guarded write. $5 is the protection cutoff; $6 and $7 are the sentinel values.
const UPSERT_UNLESS_PROTECTED: &str = r#"
INSERT INTO failure_predictions (
    equipment_id, prediction_date, needs_maintenance_10_days,
    failure_probability, is_reset
)
SELECT $1, $2, $3, $4, false
WHERE NOT EXISTS (
    SELECT 1 FROM maintenance_logs
    WHERE equipment_id = $1
      AND status = 'Completed'
      AND completion_status IN ('Confirmed', 'Approved')
      AND date > $5
)
ON CONFLICT (equipment_id) DO UPDATE SET
    prediction_date = EXCLUDED.prediction_date,
    needs_maintenance_10_days = EXCLUDED.needs_maintenance_10_days,
    failure_probability = EXCLUDED.failure_probability,
    is_reset = false
WHERE NOT (
    failure_predictions.is_reset
    AND failure_predictions.failure_probability = $6
    AND failure_predictions.needs_maintenance_10_days = $7
    AND failure_predictions.prediction_date > $5
)
RETURNING equipment_id, prediction_date, needs_maintenance_10_days,
          failure_probability, is_reset
"#;

/// Latest failure prediction per equipment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StoredPrediction {
    pub equipment_id: String,
    pub prediction_date: DateTime<Utc>,
    pub needs_maintenance_10_days: bool,
    pub failure_probability: f64,
    /// Set only by the post-maintenance reset, never by a prediction cycle
    pub is_reset: bool,
}

impl StoredPrediction {
    /// Sentinel row written after a confirmed maintenance
    pub fn reset(equipment_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            equipment_id: equipment_id.to_string(),
            prediction_date: now,
            needs_maintenance_10_days: RESET_NEEDS_MAINTENANCE,
            failure_probability: RESET_FAILURE_PROBABILITY,
            is_reset: true,
        }
    }

    pub fn holds_sentinel(&self) -> bool {
        self.is_reset
            && self.needs_maintenance_10_days == RESET_NEEDS_MAINTENANCE
            && (self.failure_probability - RESET_FAILURE_PROBABILITY).abs() < 1e-9
    }

    pub async fn find_by_equipment(pool: &PgPool, equipment_id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, StoredPrediction>(
            r#"
            SELECT equipment_id, prediction_date, needs_maintenance_10_days,
                   failure_probability, is_reset
            FROM failure_predictions
            WHERE equipment_id = $1
            "#
        )
        .bind(equipment_id)
        .fetch_optional(pool)
        .await
    }

    /// Unconditional insert-or-replace
    pub async fn upsert<'e, E>(executor: E, prediction: &StoredPrediction) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, StoredPrediction>(
            r#"
            INSERT INTO failure_predictions (
                equipment_id, prediction_date, needs_maintenance_10_days,
                failure_probability, is_reset
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (equipment_id) DO UPDATE SET
                prediction_date = EXCLUDED.prediction_date,
                needs_maintenance_10_days = EXCLUDED.needs_maintenance_10_days,
                failure_probability = EXCLUDED.failure_probability,
                is_reset = EXCLUDED.is_reset
            RETURNING equipment_id, prediction_date, needs_maintenance_10_days,
                      failure_probability, is_reset
            "#
        )
        .bind(&prediction.equipment_id)
        .bind(prediction.prediction_date)
        .bind(prediction.needs_maintenance_10_days)
        .bind(prediction.failure_probability)
        .bind(prediction.is_reset)
        .fetch_one(executor)
        .await
    }

    /// Insert-or-replace in one statement unless a confirmed maintenance or a
    /// sentinel reset newer than `cutoff` exists. `None` means the write was skipped.
    pub async fn upsert_unless_protected(
        pool: &PgPool,
        prediction: &StoredPrediction,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, StoredPrediction>(UPSERT_UNLESS_PROTECTED)
        .bind(&prediction.equipment_id)
        .bind(prediction.prediction_date)
        .bind(prediction.needs_maintenance_10_days)
        .bind(prediction.failure_probability)
        .bind(cutoff)
        .bind(RESET_FAILURE_PROBABILITY)
        .bind(RESET_NEEDS_MAINTENANCE)
        .fetch_optional(pool)
        .await
    }
}

/// Urgency of one maintenance category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriorityLabel {
    Low,
    Medium,
    High,
}

impl PriorityLabel {
    /// Classifier output index → label
    pub fn from_class(class: i64) -> Option<Self> {
        match class {
            0 => Some(PriorityLabel::Low),
            1 => Some(PriorityLabel::Medium),
            2 => Some(PriorityLabel::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityLabel::Low => "Low",
            PriorityLabel::Medium => "Medium",
            PriorityLabel::High => "High",
        }
    }
}

impl fmt::Display for PriorityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown priority label: {0}")]
pub struct UnknownPriorityLabel(pub String);

impl FromStr for PriorityLabel {
    type Err = UnknownPriorityLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(PriorityLabel::Low),
            "Medium" => Ok(PriorityLabel::Medium),
            "High" => Ok(PriorityLabel::High),
            other => Err(UnknownPriorityLabel(other.to_string())),
        }
    }
}

impl TryFrom<String> for PriorityLabel {
    type Error = UnknownPriorityLabel;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Latest priority triple per equipment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StoredPriority {
    pub equipment_id: String,
    pub predicted_to_fail: bool,
    #[sqlx(try_from = "String")]
    pub preventive: PriorityLabel,
    #[sqlx(try_from = "String")]
    pub corrective: PriorityLabel,
    #[sqlx(try_from = "String")]
    pub replacement: PriorityLabel,
    pub last_updated: DateTime<Utc>,
}

impl StoredPriority {
    /// All-clear row written alongside the failure sentinel
    pub fn reset(equipment_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            equipment_id: equipment_id.to_string(),
            predicted_to_fail: false,
            preventive: PriorityLabel::Low,
            corrective: PriorityLabel::Low,
            replacement: PriorityLabel::Low,
            last_updated: now,
        }
    }

    pub async fn find_by_equipment(pool: &PgPool, equipment_id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, StoredPriority>(
            r#"
            SELECT equipment_id, predicted_to_fail, preventive, corrective,
                   replacement, last_updated
            FROM maintenance_prediction_results
            WHERE equipment_id = $1
            "#
        )
        .bind(equipment_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn upsert<'e, E>(executor: E, priority: &StoredPriority) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO maintenance_prediction_results (
                equipment_id, predicted_to_fail, preventive, corrective,
                replacement, last_updated
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (equipment_id) DO UPDATE SET
                predicted_to_fail = EXCLUDED.predicted_to_fail,
                preventive = EXCLUDED.preventive,
                corrective = EXCLUDED.corrective,
                replacement = EXCLUDED.replacement,
                last_updated = EXCLUDED.last_updated
            "#
        )
        .bind(&priority.equipment_id)
        .bind(priority.predicted_to_fail)
        .bind(priority.preventive.as_str())
        .bind(priority.corrective.as_str())
        .bind(priority.replacement.as_str())
        .bind(priority.last_updated)
        .execute(executor)
        .await?;
        Ok(())
    }
}
