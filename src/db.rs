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
    // raw_sql: the schema holds several statements
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await?;

    tracing::info!("Database schema applied successfully");
    Ok(())
}

/// Database schema SQL
const SCHEMA_SQL: &str = r#"
-- Prediction history
CREATE TABLE IF NOT EXISTS predictions (
    id UUID PRIMARY KEY,
    kind VARCHAR(20) NOT NULL,
    label TEXT,
    confidence REAL,
    predicted_defects BIGINT,
    filename TEXT,
    input JSONB,
    model_sha256 VARCHAR(64) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Widen columns created by earlier schema versions
ALTER TABLE predictions ALTER COLUMN label TYPE TEXT;
ALTER TABLE predictions ALTER COLUMN filename TYPE TEXT;

CREATE INDEX IF NOT EXISTS idx_predictions_created ON predictions(created_at);
CREATE INDEX IF NOT EXISTS idx_predictions_kind ON predictions(kind, created_at);
"#;
