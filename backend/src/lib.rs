pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod middleware;

pub mod ratings {
    pub mod engine;
    pub mod glicko;

    pub use engine::{MatchRatings, RatingEngine};
    pub use glicko::Glicko2Params;

    #[cfg(test)]
    mod engine_tests;
    #[cfg(test)]
    mod glicko_test;
}

pub mod validation {
    pub mod clock;
    pub mod controller;
    pub mod events;
    pub mod memory;
    pub mod processor;
    pub mod reporting;
    pub mod repository;
    pub mod window;

    pub use clock::{Clock, ManualClock, SystemClock};
    pub use events::{ValidationEvent, ValidationEvents};
    pub use processor::{BackgroundValidationProcessor, RunSummary};
    pub use reporting::MatchReportingService;
    pub use repository::{MatchStore, RatingStore, ReportStore};

    #[cfg(test)]
    mod controller_tests;
    #[cfg(test)]
    mod processor_tests;
    #[cfg(test)]
    mod reporting_tests;
}
