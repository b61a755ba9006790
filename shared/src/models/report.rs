use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportReason {
    IncorrectScore,
    WrongPlayers,
    MatchNotPlayed,
    Other,
}

impl ReportReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportReason::IncorrectScore => "incorrect_score",
            ReportReason::WrongPlayers => "wrong_players",
            ReportReason::MatchNotPlayed => "match_not_played",
            ReportReason::Other => "other",
        }
    }
}

impl std::str::FromStr for ReportReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "incorrect_score" => Ok(ReportReason::IncorrectScore),
            "wrong_players" => Ok(ReportReason::WrongPlayers),
            "match_not_played" => Ok(ReportReason::MatchNotPlayed),
            "other" => Ok(ReportReason::Other),
            _ => Err(format!("Unknown report reason: {}", s)),
        }
    }
}

/// One participant's formal objection to a recorded result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    pub id: Uuid,
    pub match_id: String,
    pub reporter_id: String,
    pub reason: ReportReason,
    pub additional_details: Option<String>,
    pub created_at: DateTime<Utc>,
}
