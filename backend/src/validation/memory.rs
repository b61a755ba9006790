use chrono::{DateTime, Duration, Utc};
use shared::{
    GlickoRating, MatchRecord, MatchReport, ReportReason, Result, SharedError, ValidationStatus,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repository::{MatchStore, RatingStore, ReportStore};

/// Process-local match storage. Every trait call takes the write lock for its
/// whole check-then-set, which gives the compare-and-set semantics the
/// processor relies on.
#[derive(Debug, Default)]
pub struct InMemoryMatchStore {
    matches: RwLock<HashMap<String, MatchRecord>>,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record, as external match creation would.
    pub async fn upsert(&self, record: MatchRecord) {
        self.matches.write().await.insert(record.id.clone(), record);
    }

    pub async fn len(&self) -> usize {
        self.matches.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.matches.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl MatchStore for InMemoryMatchStore {
    async fn get_match(&self, match_id: &str) -> Result<Option<MatchRecord>> {
        Ok(self.matches.read().await.get(match_id).cloned())
    }

    async fn list_matches_past_deadline(
        &self,
        now: DateTime<Utc>,
        dispute_window: Duration,
        limit: usize,
    ) -> Result<Vec<MatchRecord>> {
        let matches = self.matches.read().await;
        let mut due: Vec<(DateTime<Utc>, MatchRecord)> = matches
            .values()
            .filter(|m| m.validation_status == ValidationStatus::Pending)
            .filter_map(|m| m.effective_deadline(dispute_window).map(|d| (d, m)))
            .filter(|(deadline, _)| *deadline <= now)
            .map(|(deadline, m)| (deadline, m.clone()))
            .collect();
        due.sort_by(|(a_deadline, a), (b_deadline, b)| {
            a_deadline.cmp(b_deadline).then_with(|| a.id.cmp(&b.id))
        });
        due.truncate(limit);
        Ok(due.into_iter().map(|(_, m)| m).collect())
    }

    async fn update_match_status(
        &self,
        match_id: &str,
        status: ValidationStatus,
        rating_applied: bool,
        expected_rating_applied: bool,
    ) -> Result<bool> {
        let mut matches = self.matches.write().await;
        let record = matches
            .get_mut(match_id)
            .ok_or_else(|| SharedError::NotFound(format!("Match {} not found", match_id)))?;

        if record.validation_status != ValidationStatus::Pending
            || record.rating_applied != expected_rating_applied
        {
            return Ok(false);
        }

        record.validation_status = status;
        record.rating_applied = rating_applied;
        Ok(true)
    }

    async fn increment_report_count(
        &self,
        match_id: &str,
        dispute_threshold: u32,
    ) -> Result<MatchRecord> {
        let mut matches = self.matches.write().await;
        let record = matches
            .get_mut(match_id)
            .ok_or_else(|| SharedError::NotFound(format!("Match {} not found", match_id)))?;

        record.report_count += 1;
        if record.validation_status == ValidationStatus::Pending
            && record.report_count >= dispute_threshold
        {
            record.validation_status = ValidationStatus::Disputed;
        }
        Ok(record.clone())
    }

    async fn release_claim(&self, match_id: &str) -> Result<bool> {
        let mut matches = self.matches.write().await;
        let record = matches
            .get_mut(match_id)
            .ok_or_else(|| SharedError::NotFound(format!("Match {} not found", match_id)))?;

        if record.validation_status != ValidationStatus::Validated || !record.rating_applied {
            return Ok(false);
        }
        record.validation_status = ValidationStatus::Pending;
        record.rating_applied = false;
        Ok(true)
    }
}

/// Reports keyed by match, unique on `(match_id, reporter_id)`.
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    reports: RwLock<HashMap<String, Vec<MatchReport>>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ReportStore for InMemoryReportStore {
    async fn insert_report(
        &self,
        match_id: &str,
        reporter_id: &str,
        reason: ReportReason,
        additional_details: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<MatchReport> {
        let mut reports = self.reports.write().await;
        let for_match = reports.entry(match_id.to_string()).or_default();

        if for_match.iter().any(|r| r.reporter_id == reporter_id) {
            return Err(SharedError::DuplicateReport {
                match_id: match_id.to_string(),
                reporter_id: reporter_id.to_string(),
            });
        }

        let report = MatchReport {
            id: Uuid::new_v4(),
            match_id: match_id.to_string(),
            reporter_id: reporter_id.to_string(),
            reason,
            additional_details,
            created_at,
        };
        for_match.push(report.clone());
        Ok(report)
    }

    async fn list_reports(&self, match_id: &str) -> Result<Vec<MatchReport>> {
        Ok(self
            .reports
            .read()
            .await
            .get(match_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn count_reports(&self, match_id: &str) -> Result<u32> {
        Ok(self
            .reports
            .read()
            .await
            .get(match_id)
            .map_or(0, |r| r.len() as u32))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRatingStore {
    ratings: RwLock<HashMap<String, GlickoRating>>,
}

impl InMemoryRatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, player_id: &str, rating: GlickoRating) {
        self.ratings.write().await.insert(player_id.to_string(), rating);
    }
}

#[async_trait::async_trait]
impl RatingStore for InMemoryRatingStore {
    async fn get_rating(&self, player_id: &str) -> Result<GlickoRating> {
        Ok(self
            .ratings
            .read()
            .await
            .get(player_id)
            .copied()
            .unwrap_or_default())
    }

    async fn set_ratings(&self, ratings: &[(String, GlickoRating)]) -> Result<()> {
        let mut stored = self.ratings.write().await;
        for (player_id, rating) in ratings {
            stored.insert(player_id.clone(), *rating);
        }
        Ok(())
    }
}
