//! `hsync prune <logger>`: bound the persisted dedup sets.
//!
//! Command-line limits override the `[state]` defaults. With neither set the
//! command does nothing.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::state::{self, PrunePolicy, PruneReport};

pub async fn run_prune(
    config: &Config,
    logger: &str,
    max_age_days: Option<u32>,
    max_events: Option<usize>,
) -> Result<PruneReport> {
    config.logger(logger)?;

    let policy = PrunePolicy {
        max_age_days: max_age_days.or(config.state.max_age_days),
        max_known: max_events.or(config.state.max_known_events),
    };
    if policy.max_age_days.is_none() && policy.max_known.is_none() {
        println!("prune {}", logger);
        println!("  no limits configured (set state.max_age_days or state.max_known_events)");
        return Ok(PruneReport::default());
    }

    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let report = state::prune(&pool, logger, policy).await?;
    pool.close().await;

    println!("prune {}", logger);
    println!("  events forgotten: {}", report.events_removed);
    println!("  documents forgotten: {}", report.documents_removed);
    println!("ok");
    Ok(report)
}
