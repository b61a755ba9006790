use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use shared::{
    MatchRecord, MatchReport, MatchValidationSnapshot, ReportEligibility, ReportOutcome,
    ReportRefusal, Result, SharedError, SubmitReportRequest, ValidationStatus,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use validator::Validate;

use super::clock::Clock;
use super::events::{ValidationEvent, ValidationEvents};
use super::repository::{MatchStore, ReportStore};
use super::window::window_for_match;
use crate::config::ValidationConfig;
use crate::metrics::{record_report_submission, Metrics};

/// Lets match participants contest a recorded result while its dispute
/// window is open.
pub struct MatchReportingService {
    matches: Arc<dyn MatchStore>,
    reports: Arc<dyn ReportStore>,
    clock: Arc<dyn Clock>,
    config: ValidationConfig,
    events: ValidationEvents,
    metrics: Option<Arc<Metrics>>,
}

impl MatchReportingService {
    pub fn new(
        matches: Arc<dyn MatchStore>,
        reports: Arc<dyn ReportStore>,
        clock: Arc<dyn Clock>,
        config: ValidationConfig,
    ) -> Self {
        Self {
            matches,
            reports,
            clock,
            config,
            events: ValidationEvents::default(),
            metrics: None,
        }
    }

    /// Shares an event channel, typically with the background processor.
    pub fn with_events(mut self, events: ValidationEvents) -> Self {
        self.events = events;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn events(&self) -> &ValidationEvents {
        &self.events
    }

    /// Push channel for status changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ValidationEvent> {
        self.events.subscribe()
    }

    /// Whether `user_id` may report `match_id` right now.
    ///
    /// Checks run in a fixed order and the first failure wins: sign-in,
    /// match existence, recorded result, resolution, window, participation,
    /// then prior report.
    pub async fn can_user_report_match(
        &self,
        match_id: &str,
        user_id: Option<&str>,
    ) -> Result<ReportEligibility> {
        let Some(user_id) = user_id else {
            return Ok(ReportEligibility::Refused(ReportRefusal::NotAuthenticated));
        };
        let Some(record) = self.matches.get_match(match_id).await? else {
            return Ok(ReportEligibility::Refused(ReportRefusal::MatchNotFound));
        };
        let reports = self.reports.list_reports(match_id).await?;
        Ok(self.eligibility_for(&record, &reports, user_id, self.clock.now()))
    }

    fn eligibility_for(
        &self,
        record: &MatchRecord,
        reports: &[MatchReport],
        user_id: &str,
        now: DateTime<Utc>,
    ) -> ReportEligibility {
        use ReportRefusal::*;

        if !record.has_result() {
            return ReportEligibility::Refused(NoResult);
        }
        if record.validation_status.is_terminal() {
            return ReportEligibility::Refused(AlreadyResolved);
        }
        let deadline = record.effective_deadline(self.config.dispute_window());
        if !deadline.map_or(false, |d| now < d) {
            return ReportEligibility::Refused(WindowClosed);
        }
        if !record.is_participant(user_id) {
            return ReportEligibility::Refused(NotParticipant);
        }
        if reports.iter().any(|r| r.reporter_id == user_id) {
            return ReportEligibility::Refused(AlreadyReported);
        }
        ReportEligibility::Allowed
    }

    /// Files a report. Refusals are returned as outcomes; only store
    /// failures and malformed requests are errors.
    pub async fn submit_report(
        &self,
        match_id: &str,
        user_id: Option<&str>,
        request: SubmitReportRequest,
    ) -> Result<ReportOutcome> {
        request.validate()?;

        if let ReportEligibility::Refused(refusal) =
            self.can_user_report_match(match_id, user_id).await?
        {
            debug!("Report on match {} refused: {:?}", match_id, refusal);
            return Ok(self.refuse(refusal));
        }
        // Eligibility already rejected the anonymous case
        let Some(reporter_id) = user_id else {
            return Ok(self.refuse(ReportRefusal::NotAuthenticated));
        };

        let details = request
            .additional_details
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let report = match self
            .reports
            .insert_report(match_id, reporter_id, request.reason, details, self.clock.now())
            .await
        {
            Ok(report) => report,
            Err(SharedError::DuplicateReport { .. }) => {
                // Lost a race with a concurrent submission from the same player
                return Ok(self.refuse(ReportRefusal::AlreadyReported));
            }
            Err(e) => return Err(e),
        };

        let updated = self
            .matches
            .increment_report_count(match_id, self.config.dispute_threshold)
            .await?;

        info!(
            "Player {} reported match {} ({}), {} report(s), status {}",
            reporter_id,
            match_id,
            report.reason.as_str(),
            updated.report_count,
            updated.validation_status
        );
        if updated.validation_status == ValidationStatus::Disputed
            && updated.report_count == self.config.dispute_threshold
        {
            warn!("Match {} disputed after {} reports", match_id, updated.report_count);
        }

        self.events.publish(ValidationEvent {
            match_id: match_id.to_string(),
            status: updated.validation_status,
            report_count: updated.report_count,
            at: self.clock.now(),
        });
        if let Some(metrics) = &self.metrics {
            record_report_submission(metrics, "accepted");
        }

        Ok(ReportOutcome::Accepted {
            report,
            report_count: updated.report_count,
            validation_status: updated.validation_status,
        })
    }

    fn refuse(&self, refusal: ReportRefusal) -> ReportOutcome {
        if let Some(metrics) = &self.metrics {
            let label = serde_json::to_value(refusal)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| "refused".to_string());
            record_report_submission(metrics, &label);
        }
        ReportOutcome::refused(refusal)
    }

    pub async fn list_reports(&self, match_id: &str) -> Result<Vec<MatchReport>> {
        self.reports.list_reports(match_id).await
    }

    /// Pull API: everything a client needs to redraw a match's validation state.
    pub async fn refresh(
        &self,
        match_id: &str,
        user_id: Option<&str>,
    ) -> Result<MatchValidationSnapshot> {
        let record = self
            .matches
            .get_match(match_id)
            .await?
            .ok_or_else(|| SharedError::NotFound(format!("Match {} not found", match_id)))?;
        let reports = self.reports.list_reports(match_id).await?;
        let now = self.clock.now();

        let eligibility = match user_id {
            Some(user_id) => self.eligibility_for(&record, &reports, user_id, now),
            None => ReportEligibility::Refused(ReportRefusal::NotAuthenticated),
        };
        let window = window_for_match(&record, self.config.dispute_window(), self.clock.as_ref());

        Ok(MatchValidationSnapshot {
            match_record: record,
            window,
            reports,
            eligibility,
        })
    }
}
