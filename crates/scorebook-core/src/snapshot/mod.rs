//! Backup document codec.
//!
//! A snapshot is one self-describing JSON document holding a match, both
//! teams with their rosters, every set and every event. Encoding reads the
//! normalized rows; decoding validates the document and fails closed before
//! anything touches the store.

mod canonical;
pub mod naming;

use libsql::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::{LibSqlMatchRepository, LibSqlScoringRepository, LibSqlTeamRepository, MatchRepository};
use crate::error::{Error, Result};
use crate::models::{sort_events, EventRecord, Match, MatchId, Player, SetRecord, Team};
use crate::util::iso_now;

pub use canonical::canonicalize_match;

/// Document version written by this build; newer documents are rejected
pub const SCHEMA_VERSION: u32 = 1;

/// A versioned, self-contained copy of one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub schema_version: u32,
    #[serde(default)]
    pub last_updated: String,
    #[serde(rename = "match")]
    pub game: Match,
    #[serde(default)]
    pub team1: Option<Team>,
    #[serde(default)]
    pub team2: Option<Team>,
    #[serde(default)]
    pub team1_players: Vec<Player>,
    #[serde(default)]
    pub team2_players: Vec<Player>,
    #[serde(default)]
    pub sets: Vec<SetRecord>,
    #[serde(default)]
    pub events: Vec<EventRecord>,
}

impl Snapshot {
    /// Cloud identity of the match, if it has one
    pub fn external_id(&self) -> Option<&str> {
        self.game
            .external_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
    }

    /// Pretty JSON as written to backup files
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Read a match and everything attached to it into a snapshot
pub async fn encode(conn: &Connection, match_id: MatchId) -> Result<Snapshot> {
    let game = LibSqlMatchRepository::new(conn)
        .get(match_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("match {match_id}")))?;

    let teams = LibSqlTeamRepository::new(conn);
    let (team1, team1_players) = load_team(&teams, game.team1_id).await?;
    let (team2, team2_players) = load_team(&teams, game.team2_id).await?;

    let scoring = LibSqlScoringRepository::new(conn);
    let sets = scoring.list_sets(match_id).await?;
    let mut events = scoring.list_events(match_id).await?;
    sort_events(&mut events);

    Ok(Snapshot {
        schema_version: SCHEMA_VERSION,
        last_updated: iso_now(),
        game,
        team1,
        team2,
        team1_players,
        team2_players,
        sets,
        events,
    })
}

async fn load_team(
    teams: &LibSqlTeamRepository<'_>,
    team_id: Option<i64>,
) -> Result<(Option<Team>, Vec<Player>)> {
    let Some(team_id) = team_id else {
        return Ok((None, Vec::new()));
    };
    let team = teams.get(team_id).await?;
    let players = if team.is_some() {
        teams.list_players(team_id).await?
    } else {
        Vec::new()
    };
    Ok((team, players))
}

/// Validate and parse a backup document
pub fn decode(document: Value) -> Result<Snapshot> {
    let Value::Object(mut doc) = document else {
        return Err(Error::Validation(
            "backup document must be a JSON object".to_string(),
        ));
    };
    canonical::canonicalize_document(&mut doc);

    let version = doc
        .get("schemaVersion")
        .and_then(Value::as_u64)
        .filter(|version| *version > 0)
        .ok_or_else(|| Error::Validation("missing schemaVersion".to_string()))?;
    if version > u64::from(SCHEMA_VERSION) {
        return Err(Error::Validation(format!(
            "unsupported schema version {version} (this build reads up to {SCHEMA_VERSION})"
        )));
    }
    if !doc.get("match").is_some_and(Value::is_object) {
        return Err(Error::Validation("missing match".to_string()));
    }

    serde_json::from_value(Value::Object(doc)).map_err(|error| Error::Validation(error.to_string()))
}

/// Parse backup document text
pub fn decode_str(text: &str) -> Result<Snapshot> {
    let value: Value =
        serde_json::from_str(text).map_err(|error| Error::Validation(error.to_string()))?;
    decode(value)
}

/// Parse backup document bytes
pub fn decode_slice(bytes: &[u8]) -> Result<Snapshot> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|error| Error::Validation(error.to_string()))?;
    decode(value)
}
