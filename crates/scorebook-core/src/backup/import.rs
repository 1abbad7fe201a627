//! Turns a cloud match bundle into local rows.
//!
//! The cloud keeps teams and rosters as JSON columns on the match row and may
//! be missing rows the scorer needs to resume: a first set, or the lineup
//! events. Both are reconstructed here.

use serde_json::{json, Map, Value};

use crate::cloud::{CloudEventRow, CloudMatchBundle, CloudMatchRow, LiveStateRow};
use crate::models::{
    sort_events, CoinToss, EventRecord, Match, MatchStatus, Player, Sequence, SetRecord, Team,
    LINEUP, SET_START,
};
use crate::snapshot::{Snapshot, SCHEMA_VERSION};
use crate::util::iso_now;

const COURT_POSITIONS: [&str; 6] = ["I", "II", "III", "IV", "V", "VI"];

/// Columns with a typed home on the local match; everything else goes to extras
const MAPPED_MATCH_COLUMNS: &[&str] = &[
    "id",
    "external_id",
    "sport_type",
    "status",
    "scheduled_at",
    "game_n",
    "game_pin",
    "test",
    "coin_toss",
    "coin_toss_confirmed",
    "coin_toss_team_a",
    "coin_toss_team_b",
    "first_serve",
    "home_team",
    "away_team",
    "players_home",
    "players_away",
    "session_id",
];

/// What an import reconstructed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub sets: usize,
    pub events: usize,
    pub lineup_events: usize,
    /// Set 1 was created because the cloud had none
    pub synthesized_set: bool,
}

/// Build a local snapshot from a cloud bundle
pub fn snapshot_from_cloud(bundle: &CloudMatchBundle) -> (Snapshot, ImportSummary) {
    let row = &bundle.game;
    let toss = row.coin_toss();
    let game = local_match(row, &toss);

    let (team1, team1_players) = local_team(row, "home_team", "players_home");
    let (team2, team2_players) = local_team(row, "away_team", "players_away");

    let mut sets: Vec<SetRecord> = bundle
        .sets
        .iter()
        .map(|set| SetRecord {
            index: set.index,
            team1_points: set.home_points,
            team2_points: set.away_points,
            finished: set.finished,
            start_time: set.start_time.clone(),
            end_time: set.end_time.clone(),
            external_id: set.external_id.clone(),
            ..SetRecord::default()
        })
        .collect();
    let synthesized_set = sets.is_empty() && (toss.confirmed || !bundle.events.is_empty());
    if synthesized_set {
        tracing::info!("Cloud match has no sets; creating set 1");
        sets.push(SetRecord::new(1));
    }

    let mut events: Vec<EventRecord> = bundle.events.iter().map(local_event).collect();
    if !events.iter().any(EventRecord::is_lineup) {
        let lineups = synthesize_lineups(&bundle.events, bundle.live_state.as_ref(), &toss, &events);
        events.extend(lineups);
    }
    sort_events(&mut events);

    let summary = ImportSummary {
        sets: sets.len(),
        events: events.len(),
        lineup_events: events.iter().filter(|event| event.is_lineup()).count(),
        synthesized_set,
    };
    let snapshot = Snapshot {
        schema_version: SCHEMA_VERSION,
        last_updated: iso_now(),
        game,
        team1,
        team2,
        team1_players,
        team2_players,
        sets,
        events,
    };
    (snapshot, summary)
}

fn local_match(row: &CloudMatchRow, toss: &CoinToss) -> Match {
    let mut extra: Map<String, Value> = row
        .0
        .iter()
        .filter(|(key, value)| !MAPPED_MATCH_COLUMNS.contains(&key.as_str()) && !value.is_null())
        .map(|(key, value)| (snake_to_camel(key), value.clone()))
        .collect();
    extra.insert("importedAt".to_string(), json!(iso_now()));

    let has_toss = *toss != CoinToss::default();
    Match {
        external_id: row.external_id(),
        status: row
            .text("status")
            .map_or(MatchStatus::Live, MatchStatus::from),
        scheduled_at: row.text("scheduled_at"),
        game_number: row.integer("game_n"),
        game_pin: row.text("game_pin"),
        test: row.column("test").and_then(Value::as_bool).unwrap_or(false),
        coin_toss: has_toss.then(|| toss.clone()),
        extra,
        ..Match::default()
    }
}

fn local_team(row: &CloudMatchRow, team_column: &str, roster_column: &str) -> (Option<Team>, Vec<Player>) {
    let Some(data) = row.object(team_column) else {
        return (None, Vec::new());
    };
    let Some(name) = data.get("name").and_then(Value::as_str).filter(|name| !name.is_empty()) else {
        return (None, Vec::new());
    };

    let text = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);
    let team = Team {
        name: name.to_string(),
        short_name: text("short_name"),
        color: text("color"),
        country: text("country"),
        extra: data
            .iter()
            .filter(|(key, value)| {
                !matches!(key.as_str(), "id" | "name" | "short_name" | "color" | "country")
                    && !value.is_null()
            })
            .map(|(key, value)| (snake_to_camel(key), value.clone()))
            .collect(),
        ..Team::default()
    };

    let players = row
        .array(roster_column)
        .iter()
        .filter_map(Value::as_object)
        .map(local_player)
        .collect();
    (Some(team), players)
}

fn local_player(data: &Map<String, Value>) -> Player {
    let text = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);
    let number = data.get("number").and_then(|value| match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    });
    Player {
        number,
        first_name: text("first_name"),
        last_name: text("last_name"),
        dob: text("dob"),
        is_captain: data
            .get("is_captain")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        extra: data
            .iter()
            .filter(|(key, value)| {
                !matches!(
                    key.as_str(),
                    "id" | "team_id" | "number" | "first_name" | "last_name" | "dob" | "is_captain"
                ) && !value.is_null()
            })
            .map(|(key, value)| (snake_to_camel(key), value.clone()))
            .collect(),
        ..Player::default()
    }
}

fn local_event(event: &CloudEventRow) -> EventRecord {
    EventRecord {
        set_index: event.set_index,
        sequence: event.seq,
        ts: event.ts.clone(),
        event_type: event.event_type.clone(),
        payload: event.payload.clone(),
        external_id: event.external_id.clone(),
        ..EventRecord::default()
    }
}

/// Rebuild initial lineups when the cloud has no `lineup` events.
///
/// The newest event carrying raw court lineups wins; otherwise the live-state
/// lineups are used. Lineups are placed at `N.5` (team 1) and `N.6` (team 2),
/// where `N` is the whole part of the set's `set_start` sequence, or 0.
fn synthesize_lineups(
    cloud_events: &[CloudEventRow],
    live_state: Option<&LiveStateRow>,
    toss: &CoinToss,
    local_events: &[EventRecord],
) -> Vec<EventRecord> {
    let team_a_is_home = toss.team_a_is_home();

    let newest_with_lineup = cloud_events
        .iter()
        .filter(|event| event.has_raw_lineup())
        .max_by_key(|event| (event.set_index, event.seq));

    let (set_index, team1_raw, team2_raw, ts) = if let Some(event) = newest_with_lineup {
        // Teams swap sides every set; team A starts on the left.
        let left_is_team1 = if event.set_index % 2 == 1 {
            team_a_is_home
        } else {
            !team_a_is_home
        };
        let (team1_raw, team2_raw) = if left_is_team1 {
            (event.lineup_left.as_ref(), event.lineup_right.as_ref())
        } else {
            (event.lineup_right.as_ref(), event.lineup_left.as_ref())
        };
        (event.set_index, team1_raw, team2_raw, event.ts.clone())
    } else if let Some(state) = live_state {
        let (team1_raw, team2_raw) = if team_a_is_home {
            (state.lineup_a.as_ref(), state.lineup_b.as_ref())
        } else {
            (state.lineup_b.as_ref(), state.lineup_a.as_ref())
        };
        (state.current_set, team1_raw, team2_raw, state.updated_at.clone())
    } else {
        return Vec::new();
    };

    let base = local_events
        .iter()
        .filter(|event| event.set_index == set_index && event.event_type == SET_START)
        .map(|event| event.sequence.whole())
        .min()
        .unwrap_or(0);
    let ts = ts.unwrap_or_else(iso_now);

    let mut lineups = Vec::new();
    for (team, raw, millionths) in [("team1", team1_raw, 500_000), ("team2", team2_raw, 600_000)] {
        let Some(raw) = raw else { continue };
        let Some(numbers) = lineup_numbers(raw) else {
            continue;
        };
        let mut payload = json!({"team": team, "lineup": numbers, "isInitial": true});
        if let Some(substitution) = libero_substitution(raw) {
            payload["liberoSubstitution"] = substitution;
        }
        lineups.push(EventRecord {
            set_index,
            sequence: Sequence::new(base, millionths),
            ts: Some(ts.clone()),
            event_type: LINEUP.to_string(),
            payload,
            ..EventRecord::default()
        });
    }
    if !lineups.is_empty() {
        tracing::info!(set_index, count = lineups.len(), "Synthesized lineup events");
    }
    lineups
}

/// Player numbers by court position; rich entries carry `{ number, ... }`
fn lineup_numbers(raw: &Value) -> Option<Value> {
    let raw = raw.as_object()?;
    let mut numbers = Map::new();
    for position in COURT_POSITIONS {
        let Some(entry) = raw.get(position).filter(|entry| !entry.is_null()) else {
            continue;
        };
        let number = entry
            .as_object()
            .and_then(|rich| rich.get("number"))
            .unwrap_or(entry);
        numbers.insert(position.to_string(), number.clone());
    }
    (!numbers.is_empty()).then_some(Value::Object(numbers))
}

/// First libero standing in for a player, if any
fn libero_substitution(raw: &Value) -> Option<Value> {
    let raw = raw.as_object()?;
    COURT_POSITIONS.iter().find_map(|position| {
        let entry = raw.get(*position)?.as_object()?;
        let is_libero = entry.get("isLibero").and_then(Value::as_bool).unwrap_or(false);
        let replaced = entry.get("replacedNumber").filter(|value| !value.is_null())?;
        is_libero.then(|| {
            json!({
                "position": position,
                "liberoNumber": entry.get("number"),
                "playerNumber": replaced,
                "liberoType": entry.get("liberoType"),
            })
        })
    })
}

fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for ch in key.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            out.push(ch.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::CloudSetRow;
    use pretty_assertions::assert_eq;

    fn bundle(game: Value) -> CloudMatchBundle {
        CloudMatchBundle {
            game: serde_json::from_value(game).unwrap(),
            ..CloudMatchBundle::default()
        }
    }

    fn point(set_index: i64, seq: i64) -> CloudEventRow {
        CloudEventRow {
            set_index,
            event_type: "point".to_string(),
            seq: Sequence::from_integer(seq),
            ..CloudEventRow::default()
        }
    }

    #[test]
    fn confirmed_coin_toss_without_sets_gets_set_one() {
        let cloud = bundle(json!({
            "external_id": "m-1",
            "coin_toss": {"confirmed": true, "team_a": "home"}
        }));
        let (snapshot, summary) = snapshot_from_cloud(&cloud);

        assert!(summary.synthesized_set);
        assert_eq!(snapshot.sets, vec![SetRecord::new(1)]);
    }

    #[test]
    fn no_sets_and_no_toss_stays_empty() {
        let (snapshot, summary) = snapshot_from_cloud(&bundle(json!({"external_id": "m-1"})));
        assert!(!summary.synthesized_set);
        assert!(snapshot.sets.is_empty());
    }

    #[test]
    fn existing_sets_are_kept_as_is() {
        let mut cloud = bundle(json!({"coin_toss_confirmed": true}));
        cloud.sets.push(CloudSetRow {
            index: 1,
            home_points: 10,
            away_points: 8,
            ..CloudSetRow::default()
        });
        let (snapshot, summary) = snapshot_from_cloud(&cloud);
        assert!(!summary.synthesized_set);
        assert_eq!(snapshot.sets[0].team1_points, 10);
    }

    #[test]
    fn teams_and_rosters_come_from_json_columns() {
        let cloud = bundle(json!({
            "external_id": "m-1",
            "game_n": 3,
            "game_pin": 123456,
            "home_team": {"name": "Sharks", "short_name": "SHK"},
            "away_team": {"name": ""},
            "players_home": [{"number": "4", "first_name": "Ana", "is_captain": true, "libero": false}],
            "officials": [{"role": "referee"}],
            "bench_home": []
        }));
        let (snapshot, _) = snapshot_from_cloud(&cloud);

        assert_eq!(snapshot.game.game_number, Some(3));
        assert_eq!(snapshot.game.game_pin.as_deref(), Some("123456"));
        assert_eq!(snapshot.team1.as_ref().unwrap().short_name.as_deref(), Some("SHK"));
        assert!(snapshot.team2.is_none());
        let player = &snapshot.team1_players[0];
        assert_eq!(player.number, Some(4));
        assert!(player.is_captain);
        assert_eq!(player.extra.get("libero"), Some(&json!(false)));
        assert!(snapshot.game.extra.contains_key("officials"));
        assert!(snapshot.game.extra.contains_key("benchHome"));
    }

    #[test]
    fn lineups_come_from_newest_event_with_raw_lineup() {
        let mut cloud = bundle(json!({"coin_toss": {"confirmed": true, "team_a": "away"}}));
        cloud.events = vec![
            CloudEventRow {
                event_type: SET_START.to_string(),
                seq: Sequence::from_integer(3),
                set_index: 2,
                ..CloudEventRow::default()
            },
            CloudEventRow {
                lineup_left: Some(json!({"I": 1, "II": 2})),
                lineup_right: Some(json!({"I": 9})),
                ..point(1, 2)
            },
            CloudEventRow {
                lineup_left: Some(json!({"I": {"number": 5}, "II": {"number": 12, "isLibero": true, "replacedNumber": 6}})),
                lineup_right: Some(json!({"I": {"number": 7}})),
                ts: Some("2025-06-01T10:00:00.000Z".to_string()),
                ..point(2, 4)
            },
        ];

        let (snapshot, summary) = snapshot_from_cloud(&cloud);
        assert_eq!(summary.lineup_events, 2);

        let lineups: Vec<&EventRecord> = snapshot.events.iter().filter(|e| e.is_lineup()).collect();
        // Set 2 with team A away: the left side is team 1.
        assert_eq!(lineups[0].payload["team"], json!("team1"));
        assert_eq!(lineups[0].payload["lineup"], json!({"I": 5, "II": 12}));
        assert_eq!(
            lineups[0].payload["liberoSubstitution"],
            json!({"position": "II", "liberoNumber": 12, "playerNumber": 6, "liberoType": null})
        );
        assert_eq!(lineups[0].sequence, Sequence::new(3, 500_000));
        assert_eq!(lineups[1].payload["team"], json!("team2"));
        assert_eq!(lineups[1].sequence, Sequence::new(3, 600_000));
        assert_eq!(lineups[1].set_index, 2);
        assert_eq!(lineups[1].ts.as_deref(), Some("2025-06-01T10:00:00.000Z"));
    }

    #[test]
    fn lineups_fall_back_to_live_state() {
        let mut cloud = bundle(json!({"coin_toss": {"team_a": "home"}}));
        cloud.events = vec![point(1, 1)];
        cloud.live_state = Some(LiveStateRow {
            current_set: 1,
            points_a: 1,
            points_b: 0,
            sets_won_a: 0,
            sets_won_b: 0,
            status: "live".to_string(),
            lineup_a: Some(json!({"I": 3})),
            lineup_b: None,
            updated_at: None,
        });

        let (snapshot, summary) = snapshot_from_cloud(&cloud);
        assert_eq!(summary.lineup_events, 1);
        let lineup = snapshot.events.iter().find(|e| e.is_lineup()).unwrap();
        assert_eq!(lineup.payload["team"], json!("team1"));
        assert_eq!(lineup.sequence, Sequence::new(0, 500_000));
        // sorted ahead of the first point
        assert!(snapshot.events[0].is_lineup());
    }

    #[test]
    fn existing_lineup_events_suppress_synthesis() {
        let mut cloud = bundle(json!({}));
        cloud.events = vec![
            CloudEventRow {
                event_type: LINEUP.to_string(),
                ..point(1, 1)
            },
            CloudEventRow {
                lineup_left: Some(json!({"I": 1})),
                ..point(1, 2)
            },
        ];
        let (_, summary) = snapshot_from_cloud(&cloud);
        assert_eq!(summary.lineup_events, 1);
    }
}
