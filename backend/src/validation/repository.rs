use chrono::{DateTime, Duration, Utc};
use shared::{GlickoRating, MatchRecord, MatchReport, ReportReason, Result, ValidationStatus};

/// Read/write contract the validation pipeline needs from match storage.
///
/// Implementations must make each call atomic with respect to the others;
/// the processor relies on `update_match_status` being a compare-and-set.
#[async_trait::async_trait]
pub trait MatchStore: Send + Sync {
    async fn get_match(&self, match_id: &str) -> Result<Option<MatchRecord>>;

    /// Pending matches whose deadline is at or before `now`, oldest deadline
    /// first. A match with no stamped deadline is due at
    /// `completed_at + dispute_window`.
    async fn list_matches_past_deadline(
        &self,
        now: DateTime<Utc>,
        dispute_window: Duration,
        limit: usize,
    ) -> Result<Vec<MatchRecord>>;

    /// Moves a pending match to `status` and writes `rating_applied`, but only
    /// if it is still `Pending` with `rating_applied == expected_rating_applied`.
    /// Returns `false` when the condition did not hold.
    async fn update_match_status(
        &self,
        match_id: &str,
        status: ValidationStatus,
        rating_applied: bool,
        expected_rating_applied: bool,
    ) -> Result<bool>;

    /// Adds one to `report_count`, flipping a pending match to `Disputed`
    /// once the count reaches `dispute_threshold`. Returns the updated record.
    async fn increment_report_count(
        &self,
        match_id: &str,
        dispute_threshold: u32,
    ) -> Result<MatchRecord>;

    /// Undoes a `Validated`/`rating_applied` claim whose rating write failed,
    /// returning the match to `Pending` so a later run can retry it.
    async fn release_claim(&self, match_id: &str) -> Result<bool>;
}

#[async_trait::async_trait]
pub trait ReportStore: Send + Sync {
    /// Fails with `SharedError::DuplicateReport` if the reporter already
    /// reported this match.
    async fn insert_report(
        &self,
        match_id: &str,
        reporter_id: &str,
        reason: ReportReason,
        additional_details: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<MatchReport>;

    async fn list_reports(&self, match_id: &str) -> Result<Vec<MatchReport>>;

    async fn count_reports(&self, match_id: &str) -> Result<u32>;
}

/// Player ratings. The processor reads them only after claiming a match, so
/// two matches sharing a player are rated in claim order as long as each
/// `set_ratings` is visible to later `get_rating` calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RatingStore: Send + Sync {
    /// Current rating, or the unrated default for unknown players.
    async fn get_rating(&self, player_id: &str) -> Result<GlickoRating>;

    /// Writes every entry or none.
    async fn set_ratings(&self, ratings: &[(String, GlickoRating)]) -> Result<()>;
}
