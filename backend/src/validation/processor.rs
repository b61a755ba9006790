use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use shared::{
    GlickoRating, MatchRecord, ProcessorErrorEntry, ProcessorStatusDto, Result, SharedError,
    ValidationStatus,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant, MissedTickBehavior};

use super::clock::Clock;
use super::events::{ValidationEvent, ValidationEvents};
use super::repository::{MatchStore, RatingStore, ReportStore};
use crate::config::ValidationConfig;
use crate::metrics::{record_match_resolved, record_processor_run, Metrics};
use crate::ratings::engine::RatingEngine;

/// Totals for one `process_now` or scheduled run, across all its attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub attempts: u32,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub validated: u64,
    pub disputed: u64,
    pub expired: u64,
    /// Matches another writer resolved first.
    pub skipped: u64,
}

impl RunSummary {
    fn absorb(&mut self, batch: &BatchOutcome) {
        self.attempts += 1;
        self.processed += batch.processed;
        self.succeeded += batch.succeeded;
        self.failed += batch.failed;
        self.validated += batch.validated;
        self.disputed += batch.disputed;
        self.expired += batch.expired;
        self.skipped += batch.skipped;
    }

    /// A run succeeds if anything succeeded, or there was simply nothing to do.
    pub fn is_success(&self) -> bool {
        self.succeeded > 0 || (self.processed == 0 && self.failed == 0)
    }
}

#[derive(Debug, Default)]
struct BatchOutcome {
    processed: u64,
    succeeded: u64,
    failed: u64,
    validated: u64,
    disputed: u64,
    expired: u64,
    skipped: u64,
    errors: Vec<(Option<String>, SharedError)>,
}

impl BatchOutcome {
    fn should_retry(&self) -> bool {
        let partial = self.succeeded > 0 && self.failed > 0;
        partial || self.errors.iter().any(|(_, e)| e.is_transient())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Resolved(ValidationStatus),
    Skipped,
}

#[derive(Debug, Default)]
struct ProcessorStats {
    total_runs: u64,
    total_processed: u64,
    total_succeeded: u64,
    total_failed: u64,
    consecutive_failures: u32,
    last_run_at: Option<DateTime<Utc>>,
    last_success_at: Option<DateTime<Utc>>,
    recent_errors: VecDeque<ProcessorErrorEntry>,
}

struct ProcessorInner {
    matches: Arc<dyn MatchStore>,
    reports: Arc<dyn ReportStore>,
    ratings: Arc<dyn RatingStore>,
    clock: Arc<dyn Clock>,
    engine: RatingEngine,
    config: ValidationConfig,
    events: ValidationEvents,
    metrics: Option<Arc<Metrics>>,
    /// Set while a run is in flight; a second trigger is dropped, not queued.
    running: AtomicBool,
    started: AtomicBool,
    suspended: AtomicBool,
    stats: Mutex<ProcessorStats>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<LoopHandle>>,
}

/// A spawned scheduler loop and the signal that cancels it alone.
struct LoopHandle {
    handle: JoinHandle<()>,
    cancel: watch::Sender<bool>,
}

/// Periodically resolves matches whose dispute window has closed.
///
/// Cloning is cheap and every clone drives the same processor.
#[derive(Clone)]
pub struct BackgroundValidationProcessor {
    inner: Arc<ProcessorInner>,
}

impl BackgroundValidationProcessor {
    pub fn new(
        matches: Arc<dyn MatchStore>,
        reports: Arc<dyn ReportStore>,
        ratings: Arc<dyn RatingStore>,
        clock: Arc<dyn Clock>,
        engine: RatingEngine,
        config: ValidationConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(ProcessorInner {
                matches,
                reports,
                ratings,
                clock,
                engine,
                config,
                events: ValidationEvents::default(),
                metrics: None,
                running: AtomicBool::new(false),
                started: AtomicBool::new(false),
                suspended: AtomicBool::new(false),
                stats: Mutex::new(ProcessorStats::default()),
                shutdown,
                task: Mutex::new(None),
            }),
        }
    }

    /// Builder hooks. Only usable before the processor is shared.
    pub fn with_events(self, events: ValidationEvents) -> Self {
        self.map_inner(|inner| inner.events = events)
    }

    pub fn with_metrics(self, metrics: Arc<Metrics>) -> Self {
        self.map_inner(|inner| inner.metrics = Some(metrics))
    }

    fn map_inner(self, apply: impl FnOnce(&mut ProcessorInner)) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                apply(&mut inner);
                Self { inner: Arc::new(inner) }
            }
            Err(shared) => {
                warn!("Processor already shared; builder option ignored");
                Self { inner: shared }
            }
        }
    }

    /// Start the recurring schedule
    pub async fn start(&self) -> Result<()> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            warn!("Validation processor is already running");
            return Ok(());
        }
        self.inner.shutdown.send_replace(false);

        if self.inner.suspended.load(Ordering::SeqCst) {
            warn!("Validation processor is suspended; call resume() to schedule runs");
            return Ok(());
        }

        info!(
            "Starting validation processor (every {}s, batch {})",
            self.inner.config.processing_interval_secs, self.inner.config.batch_size_limit
        );
        self.spawn_loop().await;
        Ok(())
    }

    /// Cancel the pending tick and any retry wait. A run already in flight
    /// finishes but schedules nothing further.
    pub async fn stop(&self) {
        self.inner.started.store(false, Ordering::SeqCst);
        self.inner.shutdown.send_replace(true);
        // Cancel rather than abort so an in-flight run can finish its writes
        if let Some(task) = self.inner.task.lock().await.take() {
            task.cancel.send_replace(true);
        }
        self.inner.update_active_gauge();
        info!("Stopping validation processor...");
    }

    /// Clear a suspension and, if the processor was started, resume scheduling.
    pub async fn resume(&self) {
        {
            let mut stats = self.inner.stats.lock().await;
            stats.consecutive_failures = 0;
        }
        let was_suspended = self.inner.suspended.swap(false, Ordering::SeqCst);
        info!("Validation processor resumed (was suspended: {})", was_suspended);

        if self.inner.started.load(Ordering::SeqCst) {
            let idle = match self.inner.task.lock().await.as_ref() {
                Some(task) => task.handle.is_finished(),
                None => true,
            };
            if idle {
                self.spawn_loop().await;
            }
        }
        self.inner.update_active_gauge();
    }

    /// Run a batch immediately. Returns `None` without doing anything if a
    /// run is already in progress.
    pub async fn process_now(&self) -> Option<RunSummary> {
        self.inner.run_once("manual").await
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub async fn is_healthy(&self) -> bool {
        let stats = self.inner.stats.lock().await;
        stats.consecutive_failures < self.inner.config.max_consecutive_failures
    }

    pub async fn status(&self) -> ProcessorStatusDto {
        let stats = self.inner.stats.lock().await;
        ProcessorStatusDto {
            is_active: self.inner.is_active(),
            is_running: self.inner.running.load(Ordering::SeqCst),
            is_healthy: stats.consecutive_failures < self.inner.config.max_consecutive_failures,
            total_runs: stats.total_runs,
            total_processed: stats.total_processed,
            total_succeeded: stats.total_succeeded,
            total_failed: stats.total_failed,
            consecutive_failures: stats.consecutive_failures,
            last_run_at: stats.last_run_at,
            last_success_at: stats.last_success_at,
            recent_errors: stats.recent_errors.iter().cloned().collect(),
        }
    }

    async fn spawn_loop(&self) {
        let inner = self.inner.clone();
        let (cancel, cancelled) = watch::channel(false);
        let handle = tokio::spawn(async move {
            inner.run_loop(cancelled).await;
        });
        let previous = self
            .inner
            .task
            .lock()
            .await
            .replace(LoopHandle { handle, cancel });
        // At most one loop schedules runs
        if let Some(previous) = previous {
            previous.cancel.send_replace(true);
        }
        self.inner.update_active_gauge();
    }
}

/// Clears the overlap flag however the run ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ProcessorInner {
    fn is_active(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.suspended.load(Ordering::SeqCst)
    }

    fn update_active_gauge(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.processor.active.set(i64::from(self.is_active()));
        }
    }

    fn shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    async fn run_loop(self: Arc<Self>, mut cancelled: watch::Receiver<bool>) {
        let period = self.config.processing_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Validation processor loop started");

        loop {
            tokio::select! {
                biased;
                changed = cancelled.changed() => {
                    if changed.is_err() || *cancelled.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            self.run_once("scheduled").await;

            if self.suspended.load(Ordering::SeqCst) {
                error!("Validation processor suspended; waiting for an explicit resume");
                break;
            }
            if *cancelled.borrow() {
                break;
            }
        }

        self.update_active_gauge();
        info!("Validation processor loop stopped");
    }

    async fn run_once(&self, trigger: &str) -> Option<RunSummary> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Validation run ({}) skipped: another run is in progress", trigger);
            if let Some(metrics) = &self.metrics {
                metrics.processor.runs_total.with_label_values(&["skipped"]).inc();
            }
            return None;
        }
        let _guard = RunGuard(&self.running);

        let started = Instant::now();
        let run_at = self.clock.now();
        let mut summary = RunSummary::default();
        let mut attempt: u32 = 0;

        loop {
            let batch = self.process_batch().await;
            summary.absorb(&batch);
            self.record_attempt(&batch).await;

            if !batch.should_retry() {
                break;
            }
            if attempt >= self.config.max_retry_attempts {
                warn!("Validation batch still failing after {} retries", attempt);
                break;
            }

            let delay = self.config.retry_delay(attempt);
            attempt += 1;
            warn!(
                "Validation batch had {} failure(s); retry {}/{} in {:?}",
                batch.failed, attempt, self.config.max_retry_attempts, delay
            );

            if self.shutting_down() {
                break;
            }
            let mut shutdown = self.shutdown.subscribe();
            let cancelled = tokio::select! {
                _ = sleep(delay) => false,
                changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
            };
            if cancelled {
                info!("Validation retry cancelled by shutdown");
                break;
            }
        }

        let outcome = self.finish_run(&summary, run_at).await;
        let elapsed = started.elapsed();
        if let Some(metrics) = &self.metrics {
            record_processor_run(metrics, trigger, outcome, elapsed);
        }
        info!(
            "Validation run ({}) {}: {} processed, {} validated, {} disputed, {} expired, {} failed in {:?}",
            trigger,
            outcome,
            summary.processed,
            summary.validated,
            summary.disputed,
            summary.expired,
            summary.failed,
            elapsed
        );
        Some(summary)
    }

    async fn record_attempt(&self, batch: &BatchOutcome) {
        let at = self.clock.now();
        let mut stats = self.stats.lock().await;
        stats.total_processed += batch.processed;
        stats.total_succeeded += batch.succeeded;
        stats.total_failed += batch.failed;

        for (match_id, err) in &batch.errors {
            stats.recent_errors.push_front(ProcessorErrorEntry {
                at,
                match_id: match_id.clone(),
                message: err.to_string(),
            });
        }
        stats.recent_errors.truncate(self.config.error_log_capacity);
    }

    async fn finish_run(&self, summary: &RunSummary, run_at: DateTime<Utc>) -> &'static str {
        let mut stats = self.stats.lock().await;
        stats.total_runs += 1;
        stats.last_run_at = Some(run_at);

        if summary.is_success() {
            stats.consecutive_failures = 0;
            stats.last_success_at = Some(run_at);
            return if summary.failed > 0 { "partial" } else { "success" };
        }

        stats.consecutive_failures += 1;
        if stats.consecutive_failures >= self.config.max_consecutive_failures
            && !self.suspended.swap(true, Ordering::SeqCst)
        {
            error!(
                "Validation processor suspended after {} consecutive failed runs",
                stats.consecutive_failures
            );
            self.update_active_gauge();
        }
        "failed"
    }

    async fn process_batch(&self) -> BatchOutcome {
        let now = self.clock.now();
        let mut outcome = BatchOutcome::default();

        let due = match self
            .matches
            .list_matches_past_deadline(now, self.config.dispute_window(), self.config.batch_size_limit)
            .await
        {
            Ok(due) => due,
            Err(e) => {
                error!("Failed to list matches due for validation: {}", e);
                outcome.errors.push((None, e));
                return outcome;
            }
        };

        for record in due {
            outcome.processed += 1;
            match self.resolve_or_expire(&record, now).await {
                Ok(Resolution::Resolved(status)) => {
                    outcome.succeeded += 1;
                    match status {
                        ValidationStatus::Validated => outcome.validated += 1,
                        ValidationStatus::Disputed => outcome.disputed += 1,
                        ValidationStatus::Expired => outcome.expired += 1,
                        ValidationStatus::Pending => {}
                    }
                }
                Ok(Resolution::Skipped) => {
                    outcome.succeeded += 1;
                    outcome.skipped += 1;
                }
                Err(e) => {
                    error!("Failed to resolve match {}: {}", record.id, e);
                    outcome.failed += 1;
                    outcome.errors.push((Some(record.id.clone()), e));
                }
            }
        }
        outcome
    }

    /// Resolves one match; past the long-stop a failing match is expired instead.
    async fn resolve_or_expire(&self, record: &MatchRecord, now: DateTime<Utc>) -> Result<Resolution> {
        match self.resolve(record).await {
            Ok(resolution) => Ok(resolution),
            Err(e) => {
                let long_stop = record
                    .effective_deadline(self.config.dispute_window())
                    .map(|deadline| deadline + self.config.expiry_grace());
                match long_stop {
                    Some(limit) if now >= limit => {
                        warn!("Expiring match {} after failing past its long-stop: {}", record.id, e);
                        self.transition(record, ValidationStatus::Expired).await
                    }
                    _ => Err(e),
                }
            }
        }
    }

    async fn resolve(&self, record: &MatchRecord) -> Result<Resolution> {
        if record.validation_status != ValidationStatus::Pending || record.rating_applied {
            return Ok(Resolution::Skipped);
        }

        let (team1, team2) = record.team_scores();
        let deadline = record.effective_deadline(self.config.dispute_window());
        if !record.has_result() || deadline.is_none() || (team1, team2) == (0, 0) {
            warn!("Match {} has no usable result; expiring", record.id);
            return self.transition(record, ValidationStatus::Expired).await;
        }

        let stored_reports = self.reports.count_reports(&record.id).await?;
        let report_count = record.report_count.max(stored_reports);
        if report_count >= self.config.dispute_threshold {
            return self.transition(record, ValidationStatus::Disputed).await;
        }

        self.validate_and_rate(record, team1, team2).await
    }

    /// Moves a pending match to a terminal status that applies no rating.
    async fn transition(&self, record: &MatchRecord, status: ValidationStatus) -> Result<Resolution> {
        let won = self
            .matches
            .update_match_status(&record.id, status, false, false)
            .await?;
        if !won {
            debug!("Match {} was resolved elsewhere", record.id);
            return Ok(Resolution::Skipped);
        }
        self.announce(record, status);
        Ok(Resolution::Resolved(status))
    }

    async fn validate_and_rate(&self, record: &MatchRecord, team1: u32, team2: u32) -> Result<Resolution> {
        // Only the writer that flips rating_applied may touch ratings
        let claimed = self
            .matches
            .update_match_status(&record.id, ValidationStatus::Validated, true, false)
            .await?;
        if !claimed {
            debug!("Match {} already claimed by another run", record.id);
            return Ok(Resolution::Skipped);
        }

        if let Err(e) = self.apply_ratings(record, team1, team2).await {
            match self.matches.release_claim(&record.id).await {
                Ok(true) => debug!("Released claim on match {} after rating failure", record.id),
                Ok(false) => warn!("Claim on match {} was not ours to release", record.id),
                Err(release_err) => error!(
                    "Match {} is validated without ratings; release failed: {}",
                    record.id, release_err
                ),
            }
            return Err(e);
        }

        info!(
            "Match {} validated ({}-{}); ratings applied for {}",
            record.id,
            team1,
            team2,
            record.players().join(", ")
        );
        self.announce(record, ValidationStatus::Validated);
        Ok(Resolution::Resolved(ValidationStatus::Validated))
    }

    /// Reads the four ratings after the claim so they are as fresh as possible,
    /// then writes all four updates as one batch.
    async fn apply_ratings(&self, record: &MatchRecord, team1: u32, team2: u32) -> Result<()> {
        let [p1, p2, p3, p4] = record.players();
        let before = [
            self.ratings.get_rating(p1).await?,
            self.ratings.get_rating(p2).await?,
            self.ratings.get_rating(p3).await?,
            self.ratings.get_rating(p4).await?,
        ];
        let after = self
            .engine
            .compute_match_ratings(before[0], before[1], before[2], before[3], team1, team2)
            .into_array();

        let updates: Vec<(String, GlickoRating)> = record
            .players()
            .iter()
            .map(|id| id.to_string())
            .zip(after)
            .collect();
        self.ratings.set_ratings(&updates).await
    }

    fn announce(&self, record: &MatchRecord, status: ValidationStatus) {
        if let Some(metrics) = &self.metrics {
            record_match_resolved(metrics, status.as_str());
        }
        self.events.publish(ValidationEvent {
            match_id: record.id.clone(),
            status,
            report_count: record.report_count,
            at: self.clock.now(),
        });
    }
}
