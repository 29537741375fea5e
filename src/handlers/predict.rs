//! Failure prediction handlers

use axum::{extract::State, Json};

use crate::{AppState, AppResult};
use crate::middleware::auth::{require_admin, require_any_role, Role, UserContext};
use crate::prediction::service::CycleOutcome;

/// Run the guarded prediction cycle over all equipment
pub async fn run(
    State(state): State<AppState>,
    user: UserContext,
) -> AppResult<Json<CycleOutcome>> {
    require_any_role(&user, &[Role::Admin, Role::Biomedical])?;

    tracing::info!("Prediction cycle requested by {}", user.username);
    let outcome = state.service.run_failure_predictions().await?;
    Ok(Json(outcome))
}

/// Overwrite every prediction, ignoring maintenance protection
pub async fn force_update(
    State(state): State<AppState>,
    user: UserContext,
) -> AppResult<Json<CycleOutcome>> {
    require_admin(&user)?;

    tracing::warn!("Forced prediction update requested by {}", user.username);
    let outcome = state.service.force_run_failure_predictions().await?;
    Ok(Json(outcome))
}
