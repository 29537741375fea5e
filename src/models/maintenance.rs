//! Maintenance log model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres};

use crate::middleware::auth::Role;

/// Log status values
pub const STATUS_SCHEDULED: &str = "Scheduled";
pub const STATUS_COMPLETED: &str = "Completed";

/// Completion status values that count as a confirmed maintenance outcome
pub const CONFIRMED_COMPLETION: [&str; 2] = ["Confirmed", "Approved"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MaintenanceLog {
    pub maintenance_id: String,
    pub equipment_id: String,
    pub date: DateTime<Utc>,
    pub maintenance_type: String,
    pub downtime_hours: Option<f64>,
    pub cost_inr: Option<f64>,
    pub issue_description: Option<String>,
    pub technician_id: Option<String>,
    pub service_rating: Option<i32>,
    pub response_time_hours: Option<f64>,
    pub completion_status: Option<String>,
    pub status: Option<String>,
}

impl MaintenanceLog {
    /// A scheduled log is a pending entry, not a performed maintenance event
    pub fn is_scheduled(&self) -> bool {
        self.status.as_deref() == Some(STATUS_SCHEDULED)
    }

    /// Counts toward maintenance history. Entries without a status (technician
    /// submissions) are left out, as are scheduled ones.
    pub fn is_performed(&self) -> bool {
        self.status.is_some() && !self.is_scheduled()
    }

    /// Completed and signed off by an engineer or admin
    pub fn is_confirmed_completion(&self) -> bool {
        self.status.as_deref() == Some(STATUS_COMPLETED)
            && self.completion_status
                .as_deref()
                .map_or(false, |c| CONFIRMED_COMPLETION.contains(&c))
    }

    pub async fn list_by_equipment(pool: &PgPool, equipment_id: &str) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, MaintenanceLog>(
            "SELECT * FROM maintenance_logs WHERE equipment_id = $1 ORDER BY date DESC"
        )
        .bind(equipment_id)
        .fetch_all(pool)
        .await
    }

    pub async fn insert<'e, E>(executor: E, log: &MaintenanceLog) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO maintenance_logs (
                maintenance_id, equipment_id, date, maintenance_type, downtime_hours,
                cost_inr, issue_description, technician_id, service_rating,
                response_time_hours, completion_status, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#
        )
        .bind(&log.maintenance_id)
        .bind(&log.equipment_id)
        .bind(log.date)
        .bind(&log.maintenance_type)
        .bind(log.downtime_hours)
        .bind(log.cost_inr)
        .bind(&log.issue_description)
        .bind(&log.technician_id)
        .bind(log.service_rating)
        .bind(log.response_time_hours)
        .bind(&log.completion_status)
        .bind(&log.status)
        .execute(executor)
        .await?;
        Ok(())
    }
}

/// Fields every maintenance entry carries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceBase {
    pub maintenance_id: String,
    pub equipment_id: String,
    pub date: DateTime<Utc>,
    pub maintenance_type: String,
    pub downtime_hours: f64,
    pub cost_inr: f64,
    pub issue_description: String,
    pub technician_id: String,
    pub completion_status: String,
}

/// Incoming payload; extended fields are only accepted from engineers and admins
#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceEntryRequest {
    #[serde(flatten)]
    pub base: MaintenanceBase,
    #[serde(default)]
    pub service_rating: Option<i32>,
    #[serde(default)]
    pub response_time_hours: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

/// A maintenance entry shaped by the submitting role
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MaintenanceEntry {
    Basic(MaintenanceBase),
    Extended {
        #[serde(flatten)]
        base: MaintenanceBase,
        service_rating: i32,
        response_time_hours: f64,
        status: String,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EntryRejection {
    #[error("Technician not allowed to submit extended fields")]
    ExtendedFieldsForbidden,
    #[error("Full log data required (service_rating, response_time_hours, status)")]
    MissingExtendedFields,
    #[error("Role '{0}' cannot record maintenance")]
    RoleNotAllowed(String),
}

impl MaintenanceEntry {
    /// Build the entry variant the role is allowed to submit
    pub fn for_role(role: &Role, req: MaintenanceEntryRequest) -> Result<Self, EntryRejection> {
        let has_extended = req.service_rating.is_some()
            || req.response_time_hours.is_some()
            || req.status.is_some();

        match role {
            Role::Technician => {
                if has_extended {
                    return Err(EntryRejection::ExtendedFieldsForbidden);
                }
                Ok(MaintenanceEntry::Basic(req.base))
            }
            Role::Admin | Role::Biomedical => {
                match (req.service_rating, req.response_time_hours, req.status) {
                    (Some(service_rating), Some(response_time_hours), Some(status)) => {
                        Ok(MaintenanceEntry::Extended {
                            base: req.base,
                            service_rating,
                            response_time_hours,
                            status,
                        })
                    }
                    _ => Err(EntryRejection::MissingExtendedFields),
                }
            }
            Role::Other(name) => Err(EntryRejection::RoleNotAllowed(name.clone())),
        }
    }

    pub fn equipment_id(&self) -> &str {
        match self {
            MaintenanceEntry::Basic(base) => &base.equipment_id,
            MaintenanceEntry::Extended { base, .. } => &base.equipment_id,
        }
    }

    /// Flatten into the stored row; basic entries leave extended columns empty
    pub fn into_log(self) -> MaintenanceLog {
        let (base, service_rating, response_time_hours, status) = match self {
            MaintenanceEntry::Basic(base) => (base, None, None, None),
            MaintenanceEntry::Extended { base, service_rating, response_time_hours, status } => {
                (base, Some(service_rating), Some(response_time_hours), Some(status))
            }
        };

        MaintenanceLog {
            maintenance_id: base.maintenance_id,
            equipment_id: base.equipment_id,
            date: base.date,
            maintenance_type: base.maintenance_type,
            downtime_hours: Some(base.downtime_hours),
            cost_inr: Some(base.cost_inr),
            issue_description: Some(base.issue_description),
            technician_id: Some(base.technician_id),
            service_rating,
            response_time_hours,
            completion_status: Some(base.completion_status),
            status,
        }
    }
}
