//! MedEquip Cloud server binary

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use medequip_cloud::{
    AppState, config, create_router, db,
    prediction::{ModelRegistry, PredictionService},
    store::PgStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    // Initialize logging (JSON lines in production)
    let json_logs = config.is_production();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "medequip_cloud=debug,tower_http=debug".into()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .init();

    tracing::info!("MedEquip Cloud Server starting...");
    tracing::info!("Database: {}", config.database_url.split('@').last().unwrap_or("***"));

    // Initialize database pool
    let pool = db::create_pool(&config.database_url).await
        .context("Failed to create database pool")?;

    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await
        .context("Failed to run migrations")?;

    // Models are loaded once; missing artifacts degrade instead of aborting
    let registry = ModelRegistry::load_from_dir(&config.model_dir);
    let status = registry.status();
    tracing::info!(
        "Model registry: failure ensemble {}, priority classifiers {}",
        if status.ensemble_ready { "ready" } else { "fallback" },
        if status.priority_ready { "ready" } else { "unavailable" },
    );

    let store = Arc::new(PgStore::new(pool));
    let service = Arc::new(PredictionService::new(store, Arc::new(registry)));

    let state = AppState {
        service,
        config: config.clone(),
    };

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await
        .context("Server error")?;

    Ok(())
}
