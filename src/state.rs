//! Persisted run state, one row set per logger identity.
//!
//! Holds the last source fingerprint, the delivered event and document
//! identities, and running totals. Loaded at the start of a sync and saved
//! at the end of a non-fatal run in one transaction. Pruning is a separate
//! maintenance job (`hsync prune`) and never runs inside a sync.

use chrono::{DateTime, Duration, Utc};
use sqlx::{Row, SqlitePool};

use crate::dedup::DedupStore;
use crate::error::SyncError;
use crate::pipeline::RunOutcome;

/// Everything a run needs from, and hands back to, persisted state.
#[derive(Debug, Default, Clone)]
pub struct RunState {
    pub fingerprint: Option<String>,
    pub dedup: DedupStore,
    pub last_success: Option<DateTime<Utc>>,
}

pub async fn load_state(pool: &SqlitePool, logger: &str) -> Result<RunState, SyncError> {
    let row = sqlx::query("SELECT fingerprint, last_success_at FROM loggers WHERE name = ?")
        .bind(logger)
        .fetch_optional(pool)
        .await?;

    let (fingerprint, last_success) = match row {
        Some(row) => (
            row.get::<Option<String>, _>("fingerprint"),
            row.get::<Option<i64>, _>("last_success_at")
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
        ),
        None => (None, None),
    };

    let events: Vec<String> = sqlx::query_scalar("SELECT id FROM known_events WHERE logger = ?")
        .bind(logger)
        .fetch_all(pool)
        .await?;
    let documents: Vec<String> =
        sqlx::query_scalar("SELECT id FROM known_documents WHERE logger = ?")
            .bind(logger)
            .fetch_all(pool)
            .await?;

    Ok(RunState {
        fingerprint,
        dedup: DedupStore::seeded(events, documents),
        last_success,
    })
}

/// Persist a completed run: new identities, totals, and the fingerprint the
/// outcome asks to keep.
pub async fn save_state(
    pool: &SqlitePool,
    logger: &str,
    state: &RunState,
    outcome: &RunOutcome,
) -> Result<(), SyncError> {
    let now = Utc::now().timestamp();
    let mut tx = pool.begin().await?;

    for id in state.dedup.new_events() {
        sqlx::query(
            "INSERT OR IGNORE INTO known_events (logger, id, first_seen_at) VALUES (?, ?, ?)",
        )
        .bind(logger)
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }
    for id in state.dedup.new_documents() {
        sqlx::query(
            "INSERT OR IGNORE INTO known_documents (logger, id, first_seen_at) VALUES (?, ?, ?)",
        )
        .bind(logger)
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO loggers (name, fingerprint, last_success_at, latest_event_at, events_sent_total, bytes_sent_total)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(name) DO UPDATE SET
            fingerprint = excluded.fingerprint,
            last_success_at = excluded.last_success_at,
            latest_event_at = COALESCE(excluded.latest_event_at, loggers.latest_event_at),
            events_sent_total = loggers.events_sent_total + excluded.events_sent_total,
            bytes_sent_total = loggers.bytes_sent_total + excluded.bytes_sent_total
        "#,
    )
    .bind(logger)
    .bind(&outcome.fingerprint)
    .bind(state.last_success.map(|t| t.timestamp()))
    .bind(outcome.latest_timestamp.map(|t| t.timestamp()))
    .bind(outcome.events_sent as i64)
    .bind(outcome.bytes_sent as i64)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Summary of one logger's persisted state, for `hsync status`.
#[derive(Debug, Clone)]
pub struct LoggerStatus {
    pub name: String,
    pub fingerprint: Option<String>,
    pub last_success_at: Option<i64>,
    pub latest_event_at: Option<i64>,
    pub events_sent_total: i64,
    pub bytes_sent_total: i64,
    pub known_events: i64,
    pub known_documents: i64,
}

pub async fn logger_status(pool: &SqlitePool) -> Result<Vec<LoggerStatus>, SyncError> {
    let rows = sqlx::query(
        r#"
        SELECT
            l.name,
            l.fingerprint,
            l.last_success_at,
            l.latest_event_at,
            l.events_sent_total,
            l.bytes_sent_total,
            (SELECT COUNT(*) FROM known_events e WHERE e.logger = l.name) AS known_events,
            (SELECT COUNT(*) FROM known_documents d WHERE d.logger = l.name) AS known_documents
        FROM loggers l
        ORDER BY l.name
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| LoggerStatus {
            name: row.get("name"),
            fingerprint: row.get("fingerprint"),
            last_success_at: row.get("last_success_at"),
            latest_event_at: row.get("latest_event_at"),
            events_sent_total: row.get("events_sent_total"),
            bytes_sent_total: row.get("bytes_sent_total"),
            known_events: row.get("known_events"),
            known_documents: row.get("known_documents"),
        })
        .collect())
}

/// Limits applied by [`prune`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PrunePolicy {
    pub max_age_days: Option<u32>,
    pub max_known: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub events_removed: u64,
    pub documents_removed: u64,
}

/// Forget old identities for `logger`.
///
/// Clears the logger's fingerprint when anything was removed so the next sync
/// re-reads the source instead of short-circuiting.
pub async fn prune(
    pool: &SqlitePool,
    logger: &str,
    policy: PrunePolicy,
) -> Result<PruneReport, SyncError> {
    let mut report = PruneReport::default();
    let mut tx = pool.begin().await?;

    for (table, removed) in [
        ("known_events", &mut report.events_removed),
        ("known_documents", &mut report.documents_removed),
    ] {
        if let Some(days) = policy.max_age_days {
            let cutoff = (Utc::now() - Duration::days(i64::from(days))).timestamp();
            let res = sqlx::query(&format!(
                "DELETE FROM {} WHERE logger = ? AND first_seen_at < ?",
                table
            ))
            .bind(logger)
            .bind(cutoff)
            .execute(&mut *tx)
            .await?;
            *removed += res.rows_affected();
        }

        if let Some(keep) = policy.max_known {
            let res = sqlx::query(&format!(
                r#"
                DELETE FROM {table} WHERE logger = ? AND id NOT IN (
                    SELECT id FROM {table} WHERE logger = ?
                    ORDER BY first_seen_at DESC, rowid DESC
                    LIMIT ?
                )
                "#,
                table = table
            ))
            .bind(logger)
            .bind(logger)
            .bind(keep as i64)
            .execute(&mut *tx)
            .await?;
            *removed += res.rows_affected();
        }
    }

    if report.events_removed + report.documents_removed > 0 {
        sqlx::query("UPDATE loggers SET fingerprint = NULL WHERE name = ?")
            .bind(logger)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(report)
}
