pub mod models {
    pub mod match_record;
    pub mod rating;
    pub mod report;
}

pub mod dto {
    pub mod validation;
}

pub mod error;

// Re-export commonly used items
pub use error::{Result, SharedError};

// Re-export models
pub use models::{
    match_record::{MatchRecord, MatchStatus, SetScore, ValidationStatus},
    rating::GlickoRating,
    report::{MatchReport, ReportReason},
};

// Re-export DTOs
pub use dto::validation::{
    MatchValidationSnapshot, ProcessorErrorEntry, ProcessorStatusDto, ReportEligibility,
    ReportOutcome, ReportRefusal, SubmitReportRequest, ValidationWindowInfo,
};
