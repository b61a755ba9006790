use chrono::{DateTime, Duration, Utc};
use shared::{MatchRecord, ValidationWindowInfo};

use super::clock::Clock;

/// Dispute window for a result completed at `completed_at`.
///
/// The window is half-open: a report at exactly `deadline` is too late.
pub fn compute_window(
    completed_at: DateTime<Utc>,
    dispute_window: Duration,
    now: DateTime<Utc>,
) -> ValidationWindowInfo {
    let deadline = completed_at + dispute_window;
    ValidationWindowInfo {
        is_open: now < deadline,
        deadline,
        time_remaining: (deadline - now).max(Duration::zero()),
    }
}

/// Window for a stored match, or `None` when it has no completion time.
/// A stamped `validation_deadline` wins over the configured length.
pub fn window_for_match(
    record: &MatchRecord,
    dispute_window: Duration,
    clock: &dyn Clock,
) -> Option<ValidationWindowInfo> {
    let completed_at = record.completed_at?;
    let now = clock.now();
    let info = match record.validation_deadline {
        Some(deadline) => compute_window(completed_at, deadline - completed_at, now),
        None => compute_window(completed_at, dispute_window, now),
    };
    Some(info)
}
