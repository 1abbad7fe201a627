//! Row shapes of the cloud row-store (snake_case columns).

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;
use crate::models::{CoinToss, Sequence};

const fn first_set() -> i64 {
    1
}

// Cloud columns are nullable; a null reads like a missing column.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_first_set<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or(1))
}

/// Columns of the cloud `matches` table that a restore may write
pub const MATCH_COLUMN_ALLOW_LIST: &[&str] = &[
    "external_id",
    "sport_type",
    "game_pin",
    "game_n",
    "status",
    "connections",
    "connection_pins",
    "scheduled_at",
    "match_info",
    "officials",
    "home_team",
    "players_home",
    "bench_home",
    "away_team",
    "players_away",
    "bench_away",
    "coin_toss",
    "results",
    "signatures",
    "approval",
    "test",
    "created_at",
    "updated_at",
    "manual_changes",
    "current_set",
    "set_results",
    "final_score",
    "sanctions",
    "winner",
];

/// Keep only allow-listed match columns; everything else is dropped silently
pub fn filter_match_columns(columns: Map<String, Value>) -> Map<String, Value> {
    columns
        .into_iter()
        .filter(|(key, _)| MATCH_COLUMN_ALLOW_LIST.contains(&key.as_str()))
        .collect()
}

/// A cloud match row.
///
/// Team, roster, officials and coin-toss data live in JSON columns, so the
/// row is kept as a column map with typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CloudMatchRow(pub Map<String, Value>);

impl CloudMatchRow {
    pub fn column(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|value| !value.is_null())
    }

    pub fn text(&self, name: &str) -> Option<String> {
        match self.column(name)? {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.column(name)? {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn object(&self, name: &str) -> Option<&Map<String, Value>> {
        self.column(name).and_then(Value::as_object)
    }

    pub fn array(&self, name: &str) -> &[Value] {
        self.column(name)
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice)
    }

    pub fn external_id(&self) -> Option<String> {
        self.text("external_id")
    }

    /// Coin toss from the JSON column, falling back to legacy flat columns
    pub fn coin_toss(&self) -> CoinToss {
        let nested = self.object("coin_toss");
        let pick = |key: &str, legacy: &str| {
            nested
                .and_then(|toss| toss.get(key))
                .filter(|value| !value.is_null())
                .or_else(|| self.column(legacy))
                .cloned()
        };
        let text = |value: Option<Value>| value.and_then(|v| v.as_str().map(str::to_string));

        let mut extra = Map::new();
        if let Some(nested) = nested {
            for (key, value) in nested {
                if !matches!(key.as_str(), "confirmed" | "team_a" | "team_b" | "first_serve") {
                    extra.insert(key.clone(), value.clone());
                }
            }
        }
        CoinToss {
            confirmed: pick("confirmed", "coin_toss_confirmed")
                .and_then(|value| value.as_bool())
                .unwrap_or(false),
            team_a: text(pick("team_a", "coin_toss_team_a")),
            team_b: text(pick("team_b", "coin_toss_team_b")),
            first_serve: text(pick("first_serve", "first_serve")),
            extra,
        }
    }
}

/// A cloud set row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudSetRow {
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default = "first_set", deserialize_with = "null_as_first_set")]
    pub index: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub home_points: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub away_points: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub finished: bool,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

/// A cloud event row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudEventRow {
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default = "first_set", deserialize_with = "null_as_first_set")]
    pub set_index: i64,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub seq: Sequence,
    /// Raw court lineup on the left side when the event was recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineup_left: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineup_right: Option<Value>,
}

impl CloudEventRow {
    pub const fn has_raw_lineup(&self) -> bool {
        self.lineup_left.is_some() || self.lineup_right.is_some()
    }
}

/// Live scoreboard row, one per match
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveStateRow {
    #[serde(default = "first_set", deserialize_with = "null_as_first_set")]
    pub current_set: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub points_a: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub points_b: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sets_won_a: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sets_won_b: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineup_a: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineup_b: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Payload of a queued `restore` job: delete-then-upsert the whole match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestorePayload {
    #[serde(rename = "match")]
    pub game: Map<String, Value>,
    pub sets: Vec<CloudSetRow>,
    pub events: Vec<CloudEventRow>,
    #[serde(rename = "liveState")]
    pub live_state: LiveStateRow,
}

impl RestorePayload {
    pub fn external_id(&self) -> Option<&str> {
        self.game.get("external_id").and_then(Value::as_str)
    }

    /// Sets and events are upserted on `external_id` in one batch each, so a
    /// key may appear only once per table.
    pub fn ensure_unique_child_keys(&self) -> crate::Result<()> {
        let set_keys = self.sets.iter().filter_map(|set| set.external_id.as_deref());
        let event_keys = self.events.iter().filter_map(|event| event.external_id.as_deref());
        first_repeat(set_keys)
            .map(|key| ("set", key))
            .or_else(|| first_repeat(event_keys).map(|key| ("event", key)))
            .map_or(Ok(()), |(kind, key)| {
                Err(Error::Validation(format!(
                    "restore payload repeats {kind} external_id {key}"
                )))
            })
    }
}

fn first_repeat<'a>(mut keys: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = HashSet::new();
    keys.find(|key| !seen.insert(*key))
}

/// Everything the row-store holds for one match
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudMatchBundle {
    #[serde(rename = "match")]
    pub game: CloudMatchRow,
    #[serde(default)]
    pub sets: Vec<CloudSetRow>,
    #[serde(default)]
    pub events: Vec<CloudEventRow>,
    #[serde(default, rename = "liveState")]
    pub live_state: Option<LiveStateRow>,
}
