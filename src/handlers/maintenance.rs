//! Maintenance priority and state handlers

use axum::{extract::{State, Path}, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::{AppState, AppResult, AppError};
use crate::middleware::auth::{require_any_role, Role, UserContext};
use crate::models::{EntryRejection, MaintenanceEntry, MaintenanceEntryRequest};
use crate::prediction::service::{HealthReport, PriorityReport, ResetReport};

/// Cached or freshly classified priority for one equipment
pub async fn priority(
    State(state): State<AppState>,
    user: UserContext,
    Path(equipment_id): Path<String>,
) -> AppResult<Json<PriorityReport>> {
    tracing::debug!("Priority request for {} from {:?}", equipment_id, user.role);
    let report = state.service.get_priority(&equipment_id).await?;
    Ok(Json(report))
}

/// Fleet-wide list of equipment that needs attention
pub async fn health_status(
    State(state): State<AppState>,
    user: UserContext,
) -> AppResult<Json<HealthReport>> {
    require_any_role(&user, &[Role::Admin, Role::Biomedical])?;

    let report = state.service.equipment_health().await?;
    Ok(Json(report))
}

/// Mark maintenance outcome: sentinel prediction plus all-Low priority
pub async fn reset_predictions(
    State(state): State<AppState>,
    user: UserContext,
    Path(equipment_id): Path<String>,
) -> AppResult<Json<ResetReport>> {
    require_any_role(&user, &[Role::Admin, Role::Biomedical])?;

    let report = state.service.reset_equipment_state(&equipment_id).await?;
    tracing::info!("Predictions for {} reset by {}", equipment_id, user.username);
    Ok(Json(report))
}

/// Record a maintenance log shaped by the caller's role
pub async fn record_entry(
    State(state): State<AppState>,
    user: UserContext,
    Json(req): Json<MaintenanceEntryRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let entry = MaintenanceEntry::for_role(&user.role, req).map_err(|e| match e {
        EntryRejection::MissingExtendedFields => AppError::ValidationError(e.to_string()),
        EntryRejection::ExtendedFieldsForbidden | EntryRejection::RoleNotAllowed(_) => {
            tracing::warn!("Rejected maintenance entry from {}: {}", user.username, e);
            AppError::Forbidden
        }
    })?;

    let equipment_id = entry.equipment_id().to_string();
    state.service.record_maintenance(entry).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Log added",
            "equipment_id": equipment_id,
        })),
    ))
}
