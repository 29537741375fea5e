//! Usage log model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

/// One timestamped telemetry reading for a piece of equipment
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageRecord {
    pub equipment_id: String,
    pub timestamp: DateTime<Utc>,
    pub usage_hours: f64,
    pub patients_served: i32,
    pub workload_level: f64,
    pub avg_cpu_temp: f64,
    pub error_count: i32,
}

impl UsageRecord {
    /// Numeric features in model input order
    pub fn features(&self) -> [f32; 5] {
        [
            self.usage_hours as f32,
            self.patients_served as f32,
            self.workload_level as f32,
            self.avg_cpu_temp as f32,
            self.error_count as f32,
        ]
    }

    /// All usage logs, grouped by equipment and newest first inside each group
    pub async fn list_recent_first(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, UsageRecord>(
            r#"
            SELECT equipment_id, timestamp, usage_hours, patients_served,
                   workload_level, avg_cpu_temp, error_count
            FROM usage_logs
            ORDER BY equipment_id, timestamp DESC
            "#
        )
        .fetch_all(pool)
        .await
    }
}
