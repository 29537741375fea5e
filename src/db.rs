//! Database module - PostgreSQL connection and migrations

use sqlx::{postgres::PgPoolOptions, PgPool};

/// Create database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create tables if not exist
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await?;

    tracing::info!("Database schema applied successfully");
    Ok(())
}

/// Database schema SQL
const SCHEMA_SQL: &str = r#"
-- Equipment registry (managed by the CRUD service)
CREATE TABLE IF NOT EXISTS equipment (
    equipment_id VARCHAR(64) PRIMARY KEY,
    equipment_type VARCHAR(100),
    manufacturer VARCHAR(255),
    location VARCHAR(255),
    criticality VARCHAR(20),
    installation_date DATE NOT NULL
);

-- Telemetry readings
CREATE TABLE IF NOT EXISTS usage_logs (
    id BIGSERIAL PRIMARY KEY,
    equipment_id VARCHAR(64) REFERENCES equipment(equipment_id) ON DELETE CASCADE,
    timestamp TIMESTAMPTZ NOT NULL,
    usage_hours DOUBLE PRECISION NOT NULL DEFAULT 0,
    patients_served INT NOT NULL DEFAULT 0,
    workload_level DOUBLE PRECISION NOT NULL DEFAULT 0,
    avg_cpu_temp DOUBLE PRECISION NOT NULL DEFAULT 0,
    error_count INT NOT NULL DEFAULT 0
);

-- Maintenance history and schedule
CREATE TABLE IF NOT EXISTS maintenance_logs (
    maintenance_id VARCHAR(64) PRIMARY KEY,
    equipment_id VARCHAR(64) REFERENCES equipment(equipment_id) ON DELETE CASCADE,
    date TIMESTAMPTZ NOT NULL,
    maintenance_type VARCHAR(50) NOT NULL,
    downtime_hours DOUBLE PRECISION,
    cost_inr DOUBLE PRECISION,
    issue_description TEXT,
    technician_id VARCHAR(64),
    service_rating INT,
    response_time_hours DOUBLE PRECISION,
    completion_status VARCHAR(30),
    status VARCHAR(20)
);

-- Latest failure prediction per equipment
CREATE TABLE IF NOT EXISTS failure_predictions (
    prediction_id BIGSERIAL PRIMARY KEY,
    equipment_id VARCHAR(64) NOT NULL UNIQUE,
    prediction_date TIMESTAMPTZ NOT NULL,
    needs_maintenance_10_days BOOLEAN NOT NULL,
    failure_probability DOUBLE PRECISION NOT NULL,
    is_reset BOOLEAN NOT NULL DEFAULT false
);

-- Latest priority classification per equipment
CREATE TABLE IF NOT EXISTS maintenance_prediction_results (
    equipment_id VARCHAR(64) PRIMARY KEY,
    predicted_to_fail BOOLEAN NOT NULL,
    preventive VARCHAR(10) NOT NULL,
    corrective VARCHAR(10) NOT NULL,
    replacement VARCHAR(10) NOT NULL,
    last_updated TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_usage_equipment_time ON usage_logs(equipment_id, timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_maintenance_equipment ON maintenance_logs(equipment_id, date);
CREATE INDEX IF NOT EXISTS idx_maintenance_status ON maintenance_logs(status, completion_status);
"#;
