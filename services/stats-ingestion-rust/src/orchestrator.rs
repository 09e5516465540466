//! Drives (league, season) units through fetch, normalize, validate and
//! write, one unit at a time.
//!
//! A unit that fails is recorded and the run moves on; nothing a single unit
//! does can abort the others.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::cancel::CancelToken;
use crate::error::FetchError;
use crate::loader::shots::ShotRowMapper;
use crate::loader::{BatchSink, BulkLoader, LineStream, LoadOptions};
use crate::models::{
    IngestionRun, League, NormalizedStatRecord, ReplaceScope, RunSummary, ShotRecord, UnitStage,
};
use crate::normalize::normalize_event;
use crate::paginate::Paginator;
use crate::provider::EventPageSource;
use crate::retry::RetryPolicy;
use crate::store::RecordSink;
use crate::validation::ValidationGate;
use crate::writer::{UpsertWriter, WriteReport, WriterConfig};

/// Hooks for progress reporting. Implementations must not fail the run.
#[async_trait]
pub trait RunObserver: Send + Sync {
    async fn unit_started(&self, run: &IngestionRun);
    async fn unit_finished(&self, run: &IngestionRun);
}

/// Delays, retry and write settings for one run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineTuning {
    /// Pause after every provider request.
    pub request_delay: Duration,
    /// Pause between units.
    pub unit_delay: Duration,
    pub fetch_retry: RetryPolicy,
    pub writer: WriterConfig,
    /// Clear each unit's scope before writing.
    pub replace: bool,
    pub strict_teams: bool,
}

impl Default for PipelineTuning {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_millis(100),
            unit_delay: Duration::from_secs(1),
            fetch_retry: RetryPolicy::default(),
            writer: WriterConfig::default(),
            replace: false,
            strict_teams: false,
        }
    }
}

impl PipelineTuning {
    /// No delays and no backoff. For tests and dry runs against local data.
    pub fn immediate() -> Self {
        Self {
            request_delay: Duration::ZERO,
            unit_delay: Duration::ZERO,
            fetch_retry: RetryPolicy::immediate(3),
            writer: WriterConfig {
                retry: RetryPolicy::immediate(3),
                ..WriterConfig::default()
            },
            ..Self::default()
        }
    }
}

pub struct Orchestrator {
    tuning: PipelineTuning,
    cancel: CancelToken,
    observers: Vec<Arc<dyn RunObserver>>,
}

impl Orchestrator {
    pub fn new(tuning: PipelineTuning, cancel: CancelToken) -> Self {
        Self {
            tuning,
            cancel,
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    async fn notify_started(&self, run: &IngestionRun) {
        for observer in &self.observers {
            observer.unit_started(run).await;
        }
    }

    async fn notify_finished(&self, run: &IngestionRun) {
        for observer in &self.observers {
            observer.unit_finished(run).await;
        }
    }

    /// Runs every league × season unit in order.
    pub async fn run_backfill<P, S>(
        &self,
        source: &P,
        sink: &S,
        leagues: &[League],
        seasons: &[String],
    ) -> RunSummary
    where
        P: EventPageSource + ?Sized,
        S: RecordSink<NormalizedStatRecord> + ?Sized,
    {
        let mut summary = RunSummary::default();
        let units: Vec<(League, &String)> = leagues
            .iter()
            .flat_map(|l| seasons.iter().map(move |s| (*l, s)))
            .collect();
        info!("Starting backfill of {} units", units.len());

        for (i, (league, season)) in units.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }
            if i > 0 && !self.tuning.unit_delay.is_zero() {
                tokio::time::sleep(self.tuning.unit_delay).await;
            }
            let run = self.run_unit(source, sink, league, season).await;
            summary.units.push(run);
        }

        summary.cancelled = self.cancel.is_cancelled();
        summary.log();
        summary
    }

    /// One (league, season) unit. Every failure ends up on the returned run.
    pub async fn run_unit<P, S>(&self, source: &P, sink: &S, league: League, season: &str) -> IngestionRun
    where
        P: EventPageSource + ?Sized,
        S: RecordSink<NormalizedStatRecord> + ?Sized,
    {
        let mut run = IngestionRun::start(league.as_str(), season);
        info!("{}: starting", run.label());
        self.notify_started(&run).await;

        run.enter(UnitStage::Fetching);
        let fetch = Paginator::new(source, self.tuning.fetch_retry, self.tuning.request_delay)
            .fetch_all(league.as_str(), season, &self.cancel)
            .await;
        let mut cancelled = false;
        match &fetch.failure {
            None => {}
            Some(FetchError::Cancelled) => cancelled = true,
            Some(e) => {
                error!("{}: fetch stopped after {} pages: {}", run.label(), fetch.pages, e);
                run.record_error(format!("fetch stopped after {} pages: {}", fetch.pages, e));
            }
        }

        run.enter(UnitStage::Normalizing);
        let mut records = Vec::new();
        for event in &fetch.events {
            for result in normalize_event(event, league, season) {
                run.records_fetched += 1;
                match result {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        run.records_rejected += 1;
                        run.record_warning(format!("rejected: {}", e));
                    }
                }
            }
        }

        run.enter(UnitStage::Validating);
        let gate = ValidationGate::new().strict_teams(self.tuning.strict_teams);
        let mut valid = Vec::with_capacity(records.len());
        for record in records {
            let result = gate.validate(&record);
            for warning in &result.warnings {
                run.record_warning(format!("{}: {}", record.conflict_key(), warning));
            }
            if result.is_valid {
                valid.push(record);
            } else {
                run.records_rejected += 1;
                let reasons: Vec<String> = result.errors.iter().map(|e| e.to_string()).collect();
                run.record_warning(format!(
                    "rejected {}: {}",
                    record.conflict_key(),
                    reasons.join("; ")
                ));
            }
        }
        info!(
            "{}: {} records valid, {} rejected",
            run.label(),
            valid.len(),
            run.records_rejected
        );

        if !cancelled && !self.cancel.is_cancelled() {
            run.enter(UnitStage::Writing);
            let writer = UpsertWriter::new(sink, self.tuning.writer);

            let mut replace_ok = true;
            if self.tuning.replace {
                if fetch.is_complete() {
                    let scope = ReplaceScope {
                        league: league.as_str().to_string(),
                        season: season.to_string(),
                    };
                    if let Err(e) = writer.replace_scope::<NormalizedStatRecord>(&scope).await {
                        run.record_error(format!("replace delete failed: {}", e));
                        replace_ok = false;
                    }
                } else {
                    warn!("{}: fetch incomplete, keeping existing rows", run.label());
                    run.record_warning("replace skipped because the fetch was incomplete");
                }
            }

            if replace_ok {
                let report = writer.write(valid, &self.cancel).await;
                apply_write_report(&mut run, &report);
                cancelled = report.was_cancelled();
            }
        } else {
            cancelled = true;
        }

        run.finish(cancelled);
        info!(
            "{}: {:?} ({} written, {} rejected, {} failed)",
            run.label(),
            run.outcome,
            run.records_written,
            run.records_rejected,
            run.records_failed
        );
        self.notify_finished(&run).await;
        run
    }

    /// Streams a shot file into `sink` as a single unit.
    pub async fn run_shots<S>(
        &self,
        lines: LineStream,
        sink: &S,
        season: Option<String>,
        options: LoadOptions,
    ) -> RunSummary
    where
        S: RecordSink<ShotRecord> + ?Sized,
    {
        let label_season = season.clone().unwrap_or_else(|| "all".to_string());
        let mut run = IngestionRun::start(League::Nhl.as_str(), label_season);
        self.notify_started(&run).await;
        run.enter(UnitStage::Streaming);

        let pending_replace = match (&season, self.tuning.replace) {
            (Some(season), true) => Some(ReplaceScope {
                league: League::Nhl.as_str().to_string(),
                season: season.clone(),
            }),
            (None, true) => {
                run.record_warning("replace needs a season, skipped");
                None
            }
            _ => None,
        };

        let writer = UpsertWriter::new(sink, self.tuning.writer);
        let mut batch_sink = WriterSink {
            writer: &writer,
            cancel: &self.cancel,
            pending_replace,
            report: WriteReport::default(),
        };

        let loaded = BulkLoader::new(ShotRowMapper::new(season), options)
            .load(lines, &mut batch_sink, &self.cancel)
            .await;
        let report = batch_sink.report;

        run.enter(UnitStage::Writing);
        let mut cancelled = report.was_cancelled();
        match loaded {
            Ok(load) => {
                run.records_fetched = load.lines_read;
                run.records_rejected = load.rows_skipped;
                for warning in load.warnings {
                    run.record_warning(warning);
                }
                cancelled |= load.cancelled;
            }
            Err(e) => {
                error!("Shot load failed: {}", e);
                run.record_error(format!("load failed: {}", e));
            }
        }
        apply_write_report(&mut run, &report);
        run.finish(cancelled);
        self.notify_finished(&run).await;

        let summary = RunSummary {
            units: vec![run],
            cancelled,
        };
        summary.log();
        summary
    }
}

/// Row failures are record-level losses. They only fail the unit when no
/// row made it at all.
fn apply_write_report(run: &mut IngestionRun, report: &WriteReport) {
    run.records_written += report.written;
    run.records_failed += report.failed.len();
    for failure in &report.failed {
        run.record_warning(format!("row {} failed: {}", failure.key, failure.reason));
    }
    if !report.failed.is_empty() && report.written == 0 {
        run.record_error(format!("all {} rows failed to write", report.failed.len()));
    }
}

/// Feeds loader batches through the writer, running a pending full-replace
/// delete right before the first batch lands.
struct WriterSink<'w, S: ?Sized> {
    writer: &'w UpsertWriter<'w, S>,
    cancel: &'w CancelToken,
    pending_replace: Option<ReplaceScope>,
    report: WriteReport,
}

#[async_trait]
impl<'w, S> BatchSink<ShotRecord> for WriterSink<'w, S>
where
    S: RecordSink<ShotRecord> + ?Sized,
{
    async fn flush(&mut self, batch: Vec<ShotRecord>) -> anyhow::Result<()> {
        if let Some(scope) = self.pending_replace.take() {
            self.writer.replace_scope::<ShotRecord>(&scope).await?;
        }
        let report = self.writer.write(batch, self.cancel).await;
        self.report.merge(report);
        Ok(())
    }
}
