//! Match model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Local identifier of a match row.
///
/// Local ids are plain integers assigned by the store; `0` means "not yet
/// stored".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MatchId(pub i64);

impl MatchId {
    /// Raw integer value
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// True when this id has been assigned by the store
    #[must_use]
    pub const fn is_assigned(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MatchId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl From<i64> for MatchId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Lifecycle state of a match
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MatchStatus {
    /// Seeded fixture that has not been started
    Template,
    /// Scheduled but not started
    Scheduled,
    /// Scoring in progress
    #[default]
    Live,
    /// Match over
    Finished,
    /// Any other status string, kept verbatim
    Other(String),
}

impl MatchStatus {
    /// Wire representation
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Template => "template",
            Self::Scheduled => "scheduled",
            Self::Live => "live",
            Self::Finished => "finished",
            Self::Other(value) => value,
        }
    }
}

impl From<String> for MatchStatus {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "template" => Self::Template,
            "scheduled" => Self::Scheduled,
            "live" | "" => Self::Live,
            "finished" | "final" | "ended" => Self::Finished,
            _ => Self::Other(value),
        }
    }
}

impl From<MatchStatus> for String {
    fn from(value: MatchStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coin toss outcome recorded before the first set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinToss {
    /// Whether officials confirmed the toss
    #[serde(default)]
    pub confirmed: bool,
    /// Which side (`home`/`away`) is team A on the scoresheet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_a: Option<String>,
    /// Which side is team B
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_b: Option<String>,
    /// Which team serves first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_serve: Option<String>,
    /// Anything else recorded with the toss
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CoinToss {
    /// True when team A of the scoresheet is the home side (team 1)
    #[must_use]
    pub fn team_a_is_home(&self) -> bool {
        self.team_a.as_deref() == Some("home")
    }
}

/// One logical contest between two teams
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    /// Local identity
    #[serde(default)]
    pub id: MatchId,
    /// Identity shared with the cloud copy; immutable once set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default)]
    pub status: MatchStatus,
    /// Home team
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team1_id: Option<i64>,
    /// Away team
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team2_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_number: Option<i64>,
    /// Access secret for remote sessions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_pin: Option<String>,
    /// Current exclusive-edit claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Test fixture flag
    #[serde(default)]
    pub test: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coin_toss: Option<CoinToss>,
    /// Fields without a typed home (officials, signatures, results, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Match {
    /// Create an unsaved live match between two teams
    #[must_use]
    pub fn new(team1_id: Option<i64>, team2_id: Option<i64>) -> Self {
        Self {
            team1_id,
            team2_id,
            ..Self::default()
        }
    }

    /// Whether the coin toss has been confirmed
    #[must_use]
    pub fn coin_toss_confirmed(&self) -> bool {
        self.coin_toss.as_ref().is_some_and(|toss| toss.confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn match_id_parses_and_displays() {
        let id: MatchId = " 42 ".parse().unwrap();
        assert_eq!(id, MatchId(42));
        assert_eq!(id.to_string(), "42");
        assert!(id.is_assigned());
        assert!(!MatchId::default().is_assigned());
    }

    #[test]
    fn status_accepts_legacy_spellings() {
        assert_eq!(MatchStatus::from("final".to_string()), MatchStatus::Finished);
        assert_eq!(MatchStatus::from("LIVE".to_string()), MatchStatus::Live);
        assert_eq!(
            MatchStatus::from("paused".to_string()),
            MatchStatus::Other("paused".to_string())
        );
    }

    #[test]
    fn unknown_fields_round_trip_through_extra() {
        let value = json!({
            "id": 1,
            "externalId": "m-1",
            "status": "live",
            "gamePin": "123456",
            "test": false,
            "officials": [{"role": "referee", "lastName": "Rossi"}],
            "hall": "Centre Court"
        });

        let parsed: Match = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(parsed.external_id.as_deref(), Some("m-1"));
        assert_eq!(parsed.extra.get("hall"), Some(&json!("Centre Court")));

        let back = serde_json::to_value(&parsed).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn coin_toss_confirmation_defaults_to_false() {
        let game = Match::new(Some(1), Some(2));
        assert!(!game.coin_toss_confirmed());

        let game = Match {
            coin_toss: Some(CoinToss {
                confirmed: true,
                team_a: Some("home".to_string()),
                ..CoinToss::default()
            }),
            ..game
        };
        assert!(game.coin_toss_confirmed());
        assert!(game.coin_toss.as_ref().unwrap().team_a_is_home());
    }
}
