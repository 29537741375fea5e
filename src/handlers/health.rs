//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use crate::prediction::RegistryStatus;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: i64,
    production: bool,
    models: RegistryStatus,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let models = state.service.registry().status();

    Json(HealthResponse {
        status: if models.ensemble_ready && models.priority_ready { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
        production: state.config.is_production(),
        models,
    })
}
