//! MedEquip Cloud - hospital equipment maintenance server
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      MEDEQUIP CLOUD                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌────────────────────────────────────────┐  │
//! │  │  API      │   │  Prediction Service                    │  │
//! │  │  (Axum)   │──▶│  features → scaler → ensemble / SVCs   │  │
//! │  │  JWT/RBAC │   │  → maintenance guard → stores          │  │
//! │  └───────────┘   └──────────────┬─────────────────────────┘  │
//! │                                 ▼                            │
//! │          ┌─────────────┐   ┌──────────────────┐              │
//! │          │ PostgreSQL  │   │ ONNX artifacts   │              │
//! │          └─────────────┘   └──────────────────┘              │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod prediction;
pub mod store;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
    middleware as axum_middleware,
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};

pub use error::{AppError, AppResult};

use prediction::PredictionService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
    pub config: config::Config,
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health::check));

    // Management routes (user JWT auth); role checks live in the handlers
    let management_routes = Router::new()
        // Failure prediction
        .route("/api/v1/predict", post(handlers::predict::run))
        .route("/api/v1/predict/force-update", post(handlers::predict::force_update))

        // Maintenance priority and state
        .route("/api/v1/maintenance", post(handlers::maintenance::record_entry))
        .route("/api/v1/maintenance/priority/:equipment_id", get(handlers::maintenance::priority))
        .route("/api/v1/maintenance/health-status", get(handlers::maintenance::health_status))
        .route(
            "/api/v1/maintenance/reset-predictions/:equipment_id",
            put(handlers::maintenance::reset_predictions),
        )

        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_user_auth
        ));

    Router::new()
        .merge(public_routes)
        .merge(management_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
