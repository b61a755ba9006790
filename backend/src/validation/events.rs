use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::ValidationStatus;
use tokio::sync::broadcast;

/// Published whenever a match's validation state changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationEvent {
    pub match_id: String,
    pub status: ValidationStatus,
    pub report_count: u32,
    pub at: DateTime<Utc>,
}

/// Optional push channel for status changes. Clients that prefer polling use
/// `MatchReportingService::refresh` instead; nothing here assumes a transport.
#[derive(Debug, Clone)]
pub struct ValidationEvents {
    sender: broadcast::Sender<ValidationEvent>,
}

impl ValidationEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ValidationEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: ValidationEvent) {
        // No subscribers is the normal case for headless deployments
        if self.sender.send(event).is_err() {
            log::debug!("Validation event dropped: no subscribers");
        }
    }
}

impl Default for ValidationEvents {
    fn default() -> Self {
        Self::new(256)
    }
}
