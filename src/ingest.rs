//! `hsync sync <logger>`: one full pipeline invocation.
//!
//! Wires the production collaborators (DiMe client, URI classifier, text
//! extractor) into a [`Pipeline`], loads the logger's persisted state, runs,
//! and saves state for completed runs. No-op runs write nothing; fatal
//! errors propagate without touching persisted state.

use anyhow::{Context, Result};
use std::time::Duration;

use crate::classify::UriClassifier;
use crate::config::Config;
use crate::db;
use crate::enrich::{HttpTextExtractor, NoExtractor, TextExtractor};
use crate::migrate;
use crate::pipeline::{Pipeline, RunOutcome, RunStatus};
use crate::sink::{DimeClient, Sink};
use crate::state;

pub async fn run_sync(config: &Config, logger: &str) -> Result<RunOutcome> {
    // Fail on an unknown logger before building any clients.
    config.logger(logger)?;
    let sink = DimeClient::new(&config.sink)?;

    let extractor: Box<dyn TextExtractor> = if config.sync.fulltext {
        Box::new(
            HttpTextExtractor::new(
                Duration::from_secs(config.sink.timeout_secs),
                config.sync.max_text_bytes,
            )
            .context("Failed to build text extractor")?,
        )
    } else {
        Box::new(NoExtractor)
    };

    let outcome = run_sync_with(config, logger, &sink, extractor.as_ref()).await?;
    print_summary(logger, &outcome);
    Ok(outcome)
}

/// Like [`run_sync`] but with caller-supplied sink and extractor.
pub async fn run_sync_with(
    config: &Config,
    logger: &str,
    sink: &dyn Sink,
    extractor: &dyn TextExtractor,
) -> Result<RunOutcome> {
    let settings = config.logger(logger)?;
    let classifier = UriClassifier;
    let pipeline = Pipeline::new(config, settings, sink, &classifier, extractor)?;

    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let mut run_state = state::load_state(&pool, logger).await?;
    let outcome = pipeline
        .run(&mut run_state)
        .await
        .with_context(|| format!("sync {} failed", logger))?;

    if outcome.status == RunStatus::Completed {
        state::save_state(&pool, logger, &run_state, &outcome).await?;
    }

    pool.close().await;
    Ok(outcome)
}

fn print_summary(logger: &str, outcome: &RunOutcome) {
    println!("sync {}", logger);
    match outcome.status {
        RunStatus::SinkUnreachable => println!("  no connection to sink (no-op)"),
        RunStatus::Unchanged => println!("  history not changed (no-op)"),
        RunStatus::Completed => {
            println!("  processed: {}", outcome.processed);
            println!("  events sent: {}", outcome.events_sent);
            println!("  documents embedded: {}", outcome.embedded);
            println!("  bytes sent: {}", outcome.bytes_sent);
            println!("  filtered: {}", outcome.filtered);
            println!("  duplicates: {}", outcome.duplicates);
            if outcome.failed > 0 {
                println!("  failed: {} (retried next run)", outcome.failed);
            }
        }
    }
    println!("ok");
}
