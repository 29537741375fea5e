//! Equipment model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Equipment {
    pub equipment_id: String,
    pub equipment_type: Option<String>,
    pub manufacturer: Option<String>,
    pub location: Option<String>,
    pub criticality: Option<String>,
    pub installation_date: NaiveDate,
}

impl Equipment {
    pub async fn find_by_id(pool: &PgPool, equipment_id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Equipment>("SELECT * FROM equipment WHERE equipment_id = $1")
            .bind(equipment_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_ids(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT equipment_id FROM equipment ORDER BY equipment_id")
            .fetch_all(pool)
            .await
    }
}
