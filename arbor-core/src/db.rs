use crate::config::DatabaseConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};

/// Idempotent schema. The expression index on the ordered pair is what turns a
/// second insert of {a,b} or {b,a} into a conflict.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS fragments (
    id            TEXT PRIMARY KEY,
    owner_id      TEXT NOT NULL,
    content       TEXT NOT NULL,
    fragment_type TEXT NOT NULL DEFAULT 'TEXT',
    tags          TEXT[] NOT NULL DEFAULT '{}',
    mood          TEXT,
    metadata      JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at    TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS fragments_owner_created_idx
    ON fragments (owner_id, created_at DESC);

CREATE TABLE IF NOT EXISTS branches (
    id          TEXT PRIMARY KEY,
    source_id   TEXT NOT NULL REFERENCES fragments(id) ON DELETE CASCADE,
    target_id   TEXT NOT NULL REFERENCES fragments(id) ON DELETE CASCADE,
    branch_type TEXT NOT NULL,
    weight      DOUBLE PRECISION NOT NULL CHECK (weight >= 0 AND weight <= 1),
    metadata    JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    CHECK (source_id <> target_id)
);

CREATE UNIQUE INDEX IF NOT EXISTS branches_unordered_pair_idx
    ON branches (LEAST(source_id, target_id), GREATEST(source_id, target_id));

CREATE INDEX IF NOT EXISTS branches_source_idx ON branches (source_id);
CREATE INDEX IF NOT EXISTS branches_target_idx ON branches (target_id);
"#;

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}

pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    tracing::info!("Schema initialised");
    Ok(())
}
