use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all run-state tables. Idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Per-logger run state
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS loggers (
            name TEXT PRIMARY KEY,
            fingerprint TEXT,
            last_success_at INTEGER,
            latest_event_at INTEGER,
            events_sent_total INTEGER NOT NULL DEFAULT 0,
            bytes_sent_total INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Delivered event identities
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS known_events (
            logger TEXT NOT NULL,
            id TEXT NOT NULL,
            first_seen_at INTEGER NOT NULL,
            PRIMARY KEY (logger, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Delivered document identities
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS known_documents (
            logger TEXT NOT NULL,
            id TEXT NOT NULL,
            first_seen_at INTEGER NOT NULL,
            PRIMARY KEY (logger, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_known_events_seen ON known_events(logger, first_seen_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_known_documents_seen ON known_documents(logger, first_seen_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
