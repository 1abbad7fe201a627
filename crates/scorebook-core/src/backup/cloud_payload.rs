//! Shapes a snapshot into the cloud row-store's schema.

use serde_json::{json, Map, Value};

use crate::cloud::{filter_match_columns, CloudEventRow, CloudSetRow, LiveStateRow, RestorePayload};
use crate::models::{latest_set, CoinToss, Player, SetRecord, Team};
use crate::snapshot::Snapshot;
use crate::util::to_snake_case;

/// Match-info keys that older documents kept at the top level of the match
const LOOSE_MATCH_INFO_KEYS: &[&str] = &["hall", "city", "league", "championship_type"];

/// Build the payload of a `restore` job for `external_id`
pub fn restore_payload(snapshot: &Snapshot, external_id: &str, sport_type: &str) -> RestorePayload {
    RestorePayload {
        game: match_columns(snapshot, external_id, sport_type),
        sets: snapshot
            .sets
            .iter()
            .map(|set| set_row(set, external_id))
            .collect(),
        events: snapshot
            .events
            .iter()
            .map(|event| CloudEventRow {
                external_id: Some(event.external_id.clone().unwrap_or_else(|| {
                    format!("{external_id}_set{}_event_{}", event.set_index, event.sequence)
                })),
                set_index: event.set_index,
                event_type: event.event_type.clone(),
                payload: event.payload.clone(),
                ts: event.ts.clone(),
                seq: event.sequence,
                lineup_left: None,
                lineup_right: None,
            })
            .collect(),
        live_state: live_state(&snapshot.sets, snapshot.game.status.as_str()),
    }
}

/// Live scoreboard derived from the sets.
///
/// A set counts as won only when finished with strictly more points; ties
/// count for neither team.
pub fn live_state(sets: &[SetRecord], status: &str) -> LiveStateRow {
    let latest = latest_set(sets);
    let won = |side: fn(&SetRecord) -> bool| {
        i64::try_from(sets.iter().filter(|set| side(set)).count()).unwrap_or(i64::MAX)
    };
    LiveStateRow {
        current_set: latest.map_or(1, |set| set.index.max(1)),
        points_a: latest.map_or(0, |set| set.team1_points),
        points_b: latest.map_or(0, |set| set.team2_points),
        sets_won_a: won(SetRecord::won_by_team1),
        sets_won_b: won(SetRecord::won_by_team2),
        status: status.to_string(),
        lineup_a: None,
        lineup_b: None,
        updated_at: None,
    }
}

fn set_row(set: &SetRecord, external_id: &str) -> CloudSetRow {
    CloudSetRow {
        external_id: Some(
            set.external_id
                .clone()
                .unwrap_or_else(|| format!("{external_id}_set_{}", set.index)),
        ),
        index: set.index,
        home_points: set.team1_points,
        away_points: set.team2_points,
        finished: set.finished,
        start_time: set.start_time.clone(),
        end_time: set.end_time.clone(),
    }
}

/// Match columns: extras first, typed fields on top, then the allow-list
fn match_columns(snapshot: &Snapshot, external_id: &str, sport_type: &str) -> Map<String, Value> {
    let game = &snapshot.game;
    let mut columns: Map<String, Value> = game
        .extra
        .iter()
        .map(|(key, value)| (to_snake_case(key), value.clone()))
        .collect();

    let match_info = collect_match_info(&mut columns);
    if !match_info.is_empty() {
        columns.insert("match_info".to_string(), Value::Object(match_info));
    }

    columns.insert("external_id".to_string(), json!(external_id));
    columns.insert("sport_type".to_string(), json!(sport_type));
    columns.insert("status".to_string(), json!(game.status.as_str()));
    columns.insert("test".to_string(), json!(game.test));
    if let Some(pin) = &game.game_pin {
        columns.insert("game_pin".to_string(), json!(pin));
    }
    if let Some(number) = game.game_number {
        columns.insert("game_n".to_string(), json!(number));
    }
    if let Some(scheduled_at) = &game.scheduled_at {
        columns.insert("scheduled_at".to_string(), json!(scheduled_at));
    }
    if let Some(toss) = &game.coin_toss {
        columns.insert("coin_toss".to_string(), coin_toss_column(toss));
    }

    if let Some(team) = &snapshot.team1 {
        columns.insert("home_team".to_string(), team_column(team));
        columns.insert("players_home".to_string(), roster_column(&snapshot.team1_players));
    }
    if let Some(team) = &snapshot.team2 {
        columns.insert("away_team".to_string(), team_column(team));
        columns.insert("players_away".to_string(), roster_column(&snapshot.team2_players));
    }
    for key in ["players_home", "players_away"] {
        columns.entry(key).or_insert_with(|| json!([]));
    }

    filter_match_columns(columns)
}

/// Gather loose hall/city/league keys plus any nested match info object
fn collect_match_info(columns: &mut Map<String, Value>) -> Map<String, Value> {
    let mut info = Map::new();
    for key in LOOSE_MATCH_INFO_KEYS {
        if let Some(value) = columns.remove(*key) {
            if !value.is_null() {
                info.insert((*key).to_string(), value);
            }
        }
    }
    if let Some(Value::Object(nested)) = columns.remove("match_info") {
        info.extend(nested);
    }
    info
}

fn coin_toss_column(toss: &CoinToss) -> Value {
    let mut column = Map::new();
    column.insert("confirmed".to_string(), json!(toss.confirmed));
    if let Some(team_a) = &toss.team_a {
        column.insert("team_a".to_string(), json!(team_a));
    }
    if let Some(team_b) = &toss.team_b {
        column.insert("team_b".to_string(), json!(team_b));
    }
    if let Some(first_serve) = &toss.first_serve {
        column.insert("first_serve".to_string(), json!(first_serve));
    }
    for (key, value) in &toss.extra {
        column.insert(to_snake_case(key), value.clone());
    }
    Value::Object(column)
}

fn team_column(team: &Team) -> Value {
    json!({
        "name": team.name,
        "short_name": team.short_name,
        "color": team.color,
    })
}

fn roster_column(players: &[Player]) -> Value {
    Value::Array(players.iter().map(player_column).collect())
}

/// Cloud roster entry; extras come along in snake_case
pub fn player_column(player: &Player) -> Value {
    let mut column: Map<String, Value> = player
        .extra
        .iter()
        .map(|(key, value)| (to_snake_case(key), value.clone()))
        .collect();
    column.insert("number".to_string(), json!(player.number));
    column.insert("first_name".to_string(), json!(player.first_name));
    column.insert("last_name".to_string(), json!(player.last_name));
    column.insert("dob".to_string(), json!(player.dob));
    column.insert("is_captain".to_string(), json!(player.is_captain));
    Value::Object(column)
}
