use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of the match itself, independent of result validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

/// Trust state of a recorded result.
///
/// `Pending` is entered when a completed result is first recorded. The other
/// three states are terminal: nothing transitions out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Pending,
    Validated,
    Disputed,
    Expired,
}

impl ValidationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ValidationStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValidationStatus::Pending => "pending",
            ValidationStatus::Validated => "validated",
            ValidationStatus::Disputed => "disputed",
            ValidationStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Games won by each team in a single set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetScore {
    pub team1: u32,
    pub team2: u32,
}

impl SetScore {
    pub fn new(team1: u32, team2: u32) -> Self {
        Self { team1, team2 }
    }

    /// 1 or 2 for the team that took the set, `None` for a level set.
    pub fn winner(&self) -> Option<u8> {
        match self.team1.cmp(&self.team2) {
            std::cmp::Ordering::Greater => Some(1),
            std::cmp::Ordering::Less => Some(2),
            std::cmp::Ordering::Equal => None,
        }
    }
}

pub const MAX_SETS: usize = 3;

/// A doubles match: team 1 is `player1`/`player2`, team 2 is `player3`/`player4`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: String,
    pub player1: String,
    pub player2: String,
    pub player3: String,
    pub player4: String,
    pub sets: Vec<SetScore>,
    pub status: MatchStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub validation_deadline: Option<DateTime<Utc>>,
    pub validation_status: ValidationStatus,
    pub report_count: u32,
    pub rating_applied: bool,
    pub created_at: DateTime<Utc>,
}

impl MatchRecord {
    /// A freshly recorded result awaiting validation.
    pub fn completed(
        id: impl Into<String>,
        players: [&str; 4],
        sets: Vec<SetScore>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let [p1, p2, p3, p4] = players;
        Self {
            id: id.into(),
            player1: p1.to_string(),
            player2: p2.to_string(),
            player3: p3.to_string(),
            player4: p4.to_string(),
            sets,
            status: MatchStatus::Completed,
            completed_at: Some(completed_at),
            validation_deadline: None,
            validation_status: ValidationStatus::Pending,
            report_count: 0,
            rating_applied: false,
            created_at: completed_at,
        }
    }

    /// Stamps `validation_deadline` as `completed_at + window`.
    pub fn with_validation_window(mut self, window: Duration) -> Self {
        self.validation_deadline = self.completed_at.map(|at| at + window);
        self
    }

    /// Reporting deadline: the stamped one, else `completed_at + window`.
    pub fn effective_deadline(&self, window: Duration) -> Option<DateTime<Utc>> {
        self.validation_deadline
            .or_else(|| self.completed_at.map(|at| at + window))
    }

    pub fn players(&self) -> [&str; 4] {
        [
            self.player1.as_str(),
            self.player2.as_str(),
            self.player3.as_str(),
            self.player4.as_str(),
        ]
    }

    pub fn is_participant(&self, player_id: &str) -> bool {
        self.players().contains(&player_id)
    }

    /// Sets won by (team 1, team 2).
    pub fn team_scores(&self) -> (u32, u32) {
        self.sets
            .iter()
            .fold((0, 0), |(t1, t2), set| match set.winner() {
                Some(1) => (t1 + 1, t2),
                Some(_) => (t1, t2 + 1),
                None => (t1, t2),
            })
    }

    /// Whether a result has been recorded that the rating engine can use.
    pub fn has_result(&self) -> bool {
        self.status == MatchStatus::Completed
            && self.completed_at.is_some()
            && !self.sets.is_empty()
            && self.sets.len() <= MAX_SETS
    }
}
