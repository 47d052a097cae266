//! Run controller.
//!
//! One invocation walks a fixed sequence of phases:
//!
//! ```text
//! Idle → CheckingConnectivity → CheckingChange → Snapshotting → Iterating → Done
//! ```
//!
//! The change check fingerprints the same frozen copy that is later read,
//! `-wal` sidecar included. An unreachable sink or an unchanged source ends
//! the run early as a no-op.
//! Snapshot and query errors end it with a [`SyncError`]. Inside `Iterating`
//! a failing record is counted and skipped; it never aborts the batch.
//!
//! Records are processed strictly one at a time. A record's identities are
//! marked known only after the sink accepted it, and before the next record
//! is examined, so later records in the same run see the update.

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use tracing::{debug, info, warn};

use crate::classify::{is_textual, Classifier};
use crate::config::{Config, LoggerSettings};
use crate::enrich::TextExtractor;
use crate::error::SyncError;
use crate::fingerprint;
use crate::filter::Denylist;
use crate::models::{Document, RawRecord};
use crate::normalize::{normalize, NormalizeContext};
use crate::sink::Sink;
use crate::snapshot::FrozenCopy;
use crate::state::RunState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    CheckingConnectivity,
    CheckingChange,
    Snapshotting,
    Iterating,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStatus {
    /// Records were read and processed.
    #[default]
    Completed,
    /// The sink did not answer the ping; try again next time.
    SinkUnreachable,
    /// The source fingerprint matched the stored one.
    Unchanged,
}

/// Aggregated result of one run.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub events_sent: u64,
    pub bytes_sent: u64,
    /// Wall-clock time of the last successful delivery.
    pub latest_timestamp: Option<DateTime<Utc>>,
    /// Fingerprint to persist. Stays at the previous value when any record
    /// failed, so the next run re-reads the source and retries it.
    pub fingerprint: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
    pub processed: u64,
    pub filtered: u64,
    pub duplicates: u64,
    pub embedded: u64,
    pub failed: u64,
    pub enrich_failures: u64,
}

impl RunOutcome {
    pub fn is_noop(&self) -> bool {
        self.status != RunStatus::Completed
    }
}

pub struct Pipeline<'a> {
    logger: LoggerSettings,
    ctx: NormalizeContext,
    denylist: Denylist,
    fulltext: bool,
    sink: &'a dyn Sink,
    classifier: &'a dyn Classifier,
    extractor: &'a dyn TextExtractor,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &Config,
        logger: LoggerSettings,
        sink: &'a dyn Sink,
        classifier: &'a dyn Classifier,
        extractor: &'a dyn TextExtractor,
    ) -> Result<Self, SyncError> {
        let denylist = Denylist::new(&logger.denylist)
            .map_err(|e| SyncError::Config(format!("loggers.{}.denylist: {}", logger.name, e)))?;
        let ctx = NormalizeContext {
            origin: config.sync.hostname.clone(),
            actor: logger.actor.clone(),
            event_type: config.sync.event_type.clone(),
            document_type: config.sync.document_type.clone(),
        };

        Ok(Self {
            logger,
            ctx,
            denylist,
            fulltext: config.sync.fulltext,
            sink,
            classifier,
            extractor,
        })
    }

    /// Run once against `state`, updating its dedup sets, fingerprint and
    /// last-success time in memory. Persisting is the caller's job.
    pub async fn run(&self, state: &mut RunState) -> Result<RunOutcome, SyncError> {
        let logger = self.logger.name.as_str();
        info!(
            logger,
            known_events = state.dedup.event_count(),
            known_documents = state.dedup.document_count(),
            "starting history sync"
        );

        self.enter(Phase::CheckingConnectivity);
        if !self.sink.ping().await {
            info!(logger, "no connection to sink, skipping run");
            return Ok(RunOutcome {
                status: RunStatus::SinkUnreachable,
                fingerprint: state.fingerprint.clone(),
                last_success: state.last_success,
                ..RunOutcome::default()
            });
        }

        self.enter(Phase::CheckingChange);
        let frozen = FrozenCopy::create(&self.logger.history_file)?;
        let check = fingerprint::should_run(frozen.path(), state.fingerprint.as_deref())?;
        if !check.changed {
            info!(logger, "history not changed, skipping run");
            return Ok(RunOutcome {
                status: RunStatus::Unchanged,
                fingerprint: Some(check.fingerprint),
                last_success: state.last_success,
                ..RunOutcome::default()
            });
        }

        self.enter(Phase::Snapshotting);
        let mut snapshot = frozen.open(self.logger.browser).await?;

        self.enter(Phase::Iterating);
        let mut outcome = RunOutcome::default();
        {
            let mut records = snapshot.records(self.logger.max_events);
            while let Some(record) = records.try_next().await? {
                debug!(n = outcome.processed, locator = %record.locator, "processing");
                outcome.processed += 1;
                self.process(&record, state, &mut outcome).await;
            }
        }
        if let Err(e) = snapshot.close().await {
            warn!(logger, error = %e, "failed closing snapshot");
        }

        self.enter(Phase::Done);
        let now = Utc::now();
        state.last_success = Some(now);
        if outcome.failed == 0 {
            state.fingerprint = Some(check.fingerprint);
        }
        outcome.fingerprint = state.fingerprint.clone();
        outcome.last_success = Some(now);

        info!(
            logger,
            processed = outcome.processed,
            sent = outcome.events_sent,
            bytes = outcome.bytes_sent,
            filtered = outcome.filtered,
            duplicates = outcome.duplicates,
            failed = outcome.failed,
            "history sync finished"
        );
        Ok(outcome)
    }

    fn enter(&self, phase: Phase) {
        debug!(logger = %self.logger.name, ?phase, "entering phase");
    }

    async fn process(&self, record: &RawRecord, state: &mut RunState, outcome: &mut RunOutcome) {
        if self.denylist.is_excluded(&record.locator) {
            debug!(locator = %record.locator, "denylisted, skipping");
            outcome.filtered += 1;
            return;
        }

        let (mut document, event) = match normalize(record, &self.ctx, self.classifier) {
            Ok(pair) => pair,
            Err(e) => {
                warn!(locator = %record.locator, error = %e, "normalization failed, skipping");
                outcome.failed += 1;
                return;
            }
        };

        if state.dedup.has_event(&event.identity) {
            debug!(id = %event.identity, "event already known, skipping");
            outcome.duplicates += 1;
            return;
        }

        let new_document = !state.dedup.has_document(&document.identity);
        let payload = if new_document {
            debug!(id = %document.identity, "document not known, sending full data");
            self.fill_content(&mut document, &record.label, outcome).await;
            event.with_embedded(document)
        } else {
            event.clone()
        };

        match self.sink.deliver(&payload).await {
            Ok(bytes) => {
                state.dedup.record_event(&event.identity);
                if new_document {
                    state.dedup.record_document(event.target.document_id());
                    outcome.embedded += 1;
                }
                outcome.events_sent += 1;
                outcome.bytes_sent += bytes;
                outcome.latest_timestamp = Some(Utc::now());
            }
            Err(e) => {
                warn!(locator = %record.locator, error = %e, "delivery failed, will retry next run");
                outcome.failed += 1;
            }
        }
    }

    /// Title and plain text for a first-seen document.
    async fn fill_content(&self, document: &mut Document, label: &str, outcome: &mut RunOutcome) {
        if self.fulltext && is_textual(&document.mime_type) {
            match self.extractor.extract_text(&document.locator, label).await {
                Ok(text) => {
                    document.plain_text = Some(text.plain_text);
                    document.title = text.title;
                    return;
                }
                Err(e) => {
                    warn!(locator = %document.locator, error = %e, "text extraction failed, using label");
                    outcome.enrich_failures += 1;
                }
            }
        }
        document.title = label.to_string();
        document.plain_text = Some(label.to_string());
    }
}
