use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::match_record::{MatchRecord, ValidationStatus};
use crate::models::report::{MatchReport, ReportReason};

/// Serializes a `chrono::Duration` as whole seconds.
mod duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        i64::deserialize(deserializer).map(Duration::seconds)
    }
}

/// Derived view of a match's dispute window. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWindowInfo {
    pub is_open: bool,
    pub deadline: DateTime<Utc>,
    #[serde(rename = "time_remaining_secs", with = "duration_secs")]
    pub time_remaining: Duration,
}

/// Why a user may not report a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportRefusal {
    NotAuthenticated,
    MatchNotFound,
    NoResult,
    AlreadyResolved,
    WindowClosed,
    NotParticipant,
    AlreadyReported,
}

impl ReportRefusal {
    pub fn message(self) -> &'static str {
        match self {
            ReportRefusal::NotAuthenticated => "You must be signed in to report a match",
            ReportRefusal::MatchNotFound => "Match not found",
            ReportRefusal::NoResult => "This match has no recorded result to report",
            ReportRefusal::AlreadyResolved => "This match result has already been resolved",
            ReportRefusal::WindowClosed => "The reporting window for this match has closed",
            ReportRefusal::NotParticipant => "Only players in this match can report it",
            ReportRefusal::AlreadyReported => "You have already reported this match",
        }
    }
}

impl std::fmt::Display for ReportRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "eligibility", content = "refusal", rename_all = "snake_case")]
pub enum ReportEligibility {
    Allowed,
    Refused(ReportRefusal),
}

impl ReportEligibility {
    pub fn is_allowed(&self) -> bool {
        matches!(self, ReportEligibility::Allowed)
    }

    pub fn refusal(&self) -> Option<ReportRefusal> {
        match self {
            ReportEligibility::Allowed => None,
            ReportEligibility::Refused(reason) => Some(*reason),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitReportRequest {
    pub reason: ReportReason,
    #[validate(length(max = 500))]
    pub additional_details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReportOutcome {
    Accepted {
        report: MatchReport,
        report_count: u32,
        validation_status: ValidationStatus,
    },
    Refused {
        refusal: ReportRefusal,
        message: String,
    },
}

impl ReportOutcome {
    pub fn refused(refusal: ReportRefusal) -> Self {
        ReportOutcome::Refused {
            refusal,
            message: refusal.message().to_string(),
        }
    }
}

/// Everything a client needs to render a match's validation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchValidationSnapshot {
    #[serde(rename = "match")]
    pub match_record: MatchRecord,
    pub window: Option<ValidationWindowInfo>,
    pub reports: Vec<MatchReport>,
    pub eligibility: ReportEligibility,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorErrorEntry {
    pub at: DateTime<Utc>,
    pub match_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorStatusDto {
    pub is_active: bool,
    pub is_running: bool,
    pub is_healthy: bool,
    pub total_runs: u64,
    pub total_processed: u64,
    pub total_succeeded: u64,
    pub total_failed: u64,
    pub consecutive_failures: u32,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub recent_errors: Vec<ProcessorErrorEntry>,
}
