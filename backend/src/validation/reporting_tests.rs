#[cfg(test)]
mod reporting_tests {
    use crate::config::ValidationConfig;
    use crate::metrics::Metrics;
    use crate::validation::clock::ManualClock;
    use crate::validation::memory::{InMemoryMatchStore, InMemoryReportStore};
    use crate::validation::reporting::MatchReportingService;
    use crate::validation::repository::{MatchStore, ReportStore};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use shared::{
        MatchRecord, MatchReport, ReportEligibility, ReportOutcome, ReportReason, ReportRefusal,
        Result, SetScore, SharedError, SubmitReportRequest, ValidationStatus,
    };
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 17, 0, 0).unwrap()
    }

    fn played_match(id: &str) -> MatchRecord {
        MatchRecord::completed(
            id,
            ["alice", "bob", "carol", "dave"],
            vec![SetScore::new(6, 3), SetScore::new(6, 4)],
            t0(),
        )
        .with_validation_window(Duration::hours(24))
    }

    struct Fixture {
        service: MatchReportingService,
        matches: Arc<InMemoryMatchStore>,
        clock: ManualClock,
    }

    async fn fixture() -> Fixture {
        let matches = Arc::new(InMemoryMatchStore::new());
        matches.upsert(played_match("m1")).await;
        let reports = Arc::new(InMemoryReportStore::new());
        let clock = ManualClock::new(t0() + Duration::hours(1));

        let service = MatchReportingService::new(
            matches.clone(),
            reports,
            Arc::new(clock.clone()),
            ValidationConfig::default(),
        );
        Fixture { service, matches, clock }
    }

    fn request(reason: ReportReason) -> SubmitReportRequest {
        SubmitReportRequest {
            reason,
            additional_details: None,
        }
    }

    fn refused(eligibility: ReportEligibility) -> Option<ReportRefusal> {
        eligibility.refusal()
    }

    #[tokio::test]
    async fn test_participant_in_open_window_may_report() {
        let f = fixture().await;
        let eligibility = f.service.can_user_report_match("m1", Some("carol")).await.unwrap();
        assert_eq!(eligibility, ReportEligibility::Allowed);
    }

    #[tokio::test]
    async fn test_anonymous_caller_is_refused_first() {
        let f = fixture().await;
        // Even for a match that does not exist
        let eligibility = f.service.can_user_report_match("missing", None).await.unwrap();
        assert_eq!(refused(eligibility), Some(ReportRefusal::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_unknown_match_is_refused() {
        let f = fixture().await;
        let eligibility = f.service.can_user_report_match("missing", Some("alice")).await.unwrap();
        assert_eq!(refused(eligibility), Some(ReportRefusal::MatchNotFound));
    }

    #[tokio::test]
    async fn test_match_without_result_is_refused() {
        let f = fixture().await;
        let mut record = played_match("m2");
        record.sets.clear();
        f.matches.upsert(record).await;

        let eligibility = f.service.can_user_report_match("m2", Some("alice")).await.unwrap();
        assert_eq!(refused(eligibility), Some(ReportRefusal::NoResult));
    }

    #[tokio::test]
    async fn test_resolved_match_is_refused() {
        let f = fixture().await;
        for (id, status) in [
            ("v", ValidationStatus::Validated),
            ("d", ValidationStatus::Disputed),
            ("e", ValidationStatus::Expired),
        ] {
            let mut record = played_match(id);
            record.validation_status = status;
            f.matches.upsert(record).await;

            let eligibility = f.service.can_user_report_match(id, Some("alice")).await.unwrap();
            assert_eq!(refused(eligibility), Some(ReportRefusal::AlreadyResolved));
        }
    }

    #[tokio::test]
    async fn test_window_boundaries() {
        let f = fixture().await;

        f.clock.set(t0() + Duration::hours(23) + Duration::minutes(59));
        let eligibility = f.service.can_user_report_match("m1", Some("alice")).await.unwrap();
        assert!(eligibility.is_allowed());

        f.clock.set(t0() + Duration::hours(24));
        let eligibility = f.service.can_user_report_match("m1", Some("alice")).await.unwrap();
        assert_eq!(refused(eligibility), Some(ReportRefusal::WindowClosed));

        f.clock.set(t0() + Duration::hours(24) + Duration::seconds(1));
        let eligibility = f.service.can_user_report_match("m1", Some("alice")).await.unwrap();
        assert_eq!(refused(eligibility), Some(ReportRefusal::WindowClosed));
    }

    #[tokio::test]
    async fn test_closed_window_reported_before_participation() {
        let f = fixture().await;
        f.clock.set(t0() + Duration::days(2));
        let eligibility = f.service.can_user_report_match("m1", Some("mallory")).await.unwrap();
        assert_eq!(refused(eligibility), Some(ReportRefusal::WindowClosed));
    }

    #[tokio::test]
    async fn test_outsider_is_refused() {
        let f = fixture().await;
        let eligibility = f.service.can_user_report_match("m1", Some("mallory")).await.unwrap();
        assert_eq!(refused(eligibility), Some(ReportRefusal::NotParticipant));
    }

    #[tokio::test]
    async fn test_first_report_is_accepted_and_stays_pending() {
        let f = fixture().await;
        let mut events = f.service.subscribe();

        let mut req = request(ReportReason::IncorrectScore);
        req.additional_details = Some("  Second set was 4-6  ".to_string());
        let outcome = f.service.submit_report("m1", Some("carol"), req).await.unwrap();

        match outcome {
            ReportOutcome::Accepted { report, report_count, validation_status } => {
                assert_eq!(report.reporter_id, "carol");
                assert_eq!(report.reason, ReportReason::IncorrectScore);
                assert_eq!(report.additional_details.as_deref(), Some("Second set was 4-6"));
                assert_eq!(report.created_at, t0() + Duration::hours(1));
                assert_eq!(report_count, 1);
                assert_eq!(validation_status, ValidationStatus::Pending);
            }
            other => panic!("expected acceptance, got {:?}", other),
        }

        let event = events.recv().await.unwrap();
        assert_eq!(event.match_id, "m1");
        assert_eq!(event.report_count, 1);
        assert_eq!(event.status, ValidationStatus::Pending);
    }

    #[tokio::test]
    async fn test_second_report_disputes_immediately() {
        let f = fixture().await;
        f.service
            .submit_report("m1", Some("carol"), request(ReportReason::IncorrectScore))
            .await
            .unwrap();
        let outcome = f
            .service
            .submit_report("m1", Some("alice"), request(ReportReason::WrongPlayers))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ReportOutcome::Accepted {
                report_count: 2,
                validation_status: ValidationStatus::Disputed,
                ..
            }
        ));
        let record = f.matches.get_match("m1").await.unwrap().unwrap();
        assert_eq!(record.validation_status, ValidationStatus::Disputed);
        assert!(!record.rating_applied);

        // Nobody else can pile on once it is resolved
        let eligibility = f.service.can_user_report_match("m1", Some("bob")).await.unwrap();
        assert_eq!(refused(eligibility), Some(ReportRefusal::AlreadyResolved));
    }

    #[tokio::test]
    async fn test_duplicate_report_does_not_increment_count() {
        let f = fixture().await;
        f.service
            .submit_report("m1", Some("carol"), request(ReportReason::IncorrectScore))
            .await
            .unwrap();
        let outcome = f
            .service
            .submit_report("m1", Some("carol"), request(ReportReason::Other))
            .await
            .unwrap();

        assert_eq!(outcome, ReportOutcome::refused(ReportRefusal::AlreadyReported));
        let record = f.matches.get_match("m1").await.unwrap().unwrap();
        assert_eq!(record.report_count, 1);
        assert_eq!(record.validation_status, ValidationStatus::Pending);
        assert_eq!(f.service.list_reports("m1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_overlong_details_are_a_validation_error() {
        let f = fixture().await;
        let mut req = request(ReportReason::Other);
        req.additional_details = Some("x".repeat(501));

        let err = f.service.submit_report("m1", Some("carol"), req).await.unwrap_err();
        assert!(matches!(err, SharedError::Validation(_)));
        assert_eq!(f.service.list_reports("m1").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_refused_submission_writes_nothing() {
        let f = fixture().await;
        let outcome = f
            .service
            .submit_report("m1", Some("mallory"), request(ReportReason::MatchNotPlayed))
            .await
            .unwrap();

        assert_eq!(outcome, ReportOutcome::refused(ReportRefusal::NotParticipant));
        let record = f.matches.get_match("m1").await.unwrap().unwrap();
        assert_eq!(record.report_count, 0);
    }

    /// Report store that has never seen a report but rejects every insert as
    /// a duplicate, as happens when two submissions from one player race.
    struct RacingReportStore;

    #[async_trait::async_trait]
    impl ReportStore for RacingReportStore {
        async fn insert_report(
            &self,
            match_id: &str,
            reporter_id: &str,
            _reason: ReportReason,
            _additional_details: Option<String>,
            _created_at: DateTime<Utc>,
        ) -> Result<MatchReport> {
            Err(SharedError::DuplicateReport {
                match_id: match_id.to_string(),
                reporter_id: reporter_id.to_string(),
            })
        }

        async fn list_reports(&self, _match_id: &str) -> Result<Vec<MatchReport>> {
            Ok(Vec::new())
        }

        async fn count_reports(&self, _match_id: &str) -> Result<u32> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_store_level_duplicate_becomes_refusal() {
        let matches = Arc::new(InMemoryMatchStore::new());
        matches.upsert(played_match("m1")).await;
        let metrics = Arc::new(Metrics::new().unwrap());
        let service = MatchReportingService::new(
            matches.clone(),
            Arc::new(RacingReportStore),
            Arc::new(ManualClock::new(t0())),
            ValidationConfig::default(),
        )
        .with_metrics(metrics.clone());

        let outcome = service
            .submit_report("m1", Some("alice"), request(ReportReason::IncorrectScore))
            .await
            .unwrap();

        assert_eq!(outcome, ReportOutcome::refused(ReportRefusal::AlreadyReported));
        let record = matches.get_match("m1").await.unwrap().unwrap();
        assert_eq!(record.report_count, 0);
        assert_eq!(
            metrics
                .reports
                .submissions_total
                .with_label_values(&["already_reported"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_refresh_snapshot() {
        let f = fixture().await;
        f.service
            .submit_report("m1", Some("dave"), request(ReportReason::IncorrectScore))
            .await
            .unwrap();

        let snapshot = f.service.refresh("m1", Some("dave")).await.unwrap();
        assert_eq!(snapshot.match_record.report_count, 1);
        assert_eq!(snapshot.reports.len(), 1);
        assert_eq!(snapshot.eligibility.refusal(), Some(ReportRefusal::AlreadyReported));

        let window = snapshot.window.unwrap();
        assert!(window.is_open);
        assert_eq!(window.time_remaining, Duration::hours(23));

        let other = f.service.refresh("m1", Some("bob")).await.unwrap();
        assert!(other.eligibility.is_allowed());

        let anonymous = f.service.refresh("m1", None).await.unwrap();
        assert_eq!(anonymous.eligibility.refusal(), Some(ReportRefusal::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_refresh_unknown_match_is_not_found() {
        let f = fixture().await;
        let err = f.service.refresh("missing", Some("alice")).await.unwrap_err();
        assert!(matches!(err, SharedError::NotFound(_)));
    }
}
