//! `hsync status`: persisted run state at a glance.
//!
//! Shows per-logger totals, how many identities are remembered for dedup,
//! and when each logger last completed a run.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::state;

/// Print a summary for all loggers, or only `logger` when given.
pub async fn run_status(config: &Config, logger: Option<&str>) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let mut rows = state::logger_status(&pool).await?;
    if let Some(name) = logger {
        rows.retain(|r| r.name == name);
    }

    let db_size = std::fs::metadata(&config.state.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("History Sync: Run State");
    println!("========================");
    println!();
    println!("  Database:    {}", config.state.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();

    if rows.is_empty() {
        println!("  No runs recorded yet.");
        println!();
        pool.close().await;
        return Ok(());
    }

    println!(
        "  {:<16} {:>8} {:>10} {:>8} {:>8}   {}",
        "LOGGER", "SENT", "BYTES", "EVENTS", "DOCS", "LAST SUCCESS"
    );
    println!("  {}", "-".repeat(76));
    for r in &rows {
        let last = match r.last_success_at {
            Some(ts) => format_ts_relative(ts),
            None => "never".to_string(),
        };
        println!(
            "  {:<16} {:>8} {:>10} {:>8} {:>8}   {}",
            r.name,
            r.events_sent_total,
            format_bytes(r.bytes_sent_total.max(0) as u64),
            r.known_events,
            r.known_documents,
            last
        );
    }
    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
