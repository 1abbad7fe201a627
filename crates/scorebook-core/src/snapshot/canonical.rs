//! Rewrites legacy field spellings into the canonical document shape.
//!
//! Older backups and cloud rows spell the same field several ways
//! (`seed_key`, `homePoints`, `seq`, ...). Everything is normalized here once
//! so the typed models only ever see one spelling.

use serde_json::{Map, Number, Value};

type Object = Map<String, Value>;

/// Normalize a whole backup document in place
pub fn canonicalize_document(doc: &mut Object) {
    rename_first(doc, "schemaVersion", &["version", "schema_version"]);
    rename_first(doc, "lastUpdated", &["last_updated"]);
    rename_first(doc, "team1", &["homeTeam", "home_team"]);
    rename_first(doc, "team2", &["awayTeam", "away_team"]);
    rename_first(doc, "team1Players", &["homePlayers", "players_home"]);
    rename_first(doc, "team2Players", &["awayPlayers", "players_away"]);

    if let Some(Value::Object(game)) = doc.get_mut("match") {
        canonicalize_match(game);
    }
    for key in ["team1", "team2"] {
        if let Some(Value::Object(team)) = doc.get_mut(key) {
            canonicalize_team(team);
        }
    }
    for key in ["team1Players", "team2Players"] {
        for_each_object(doc, key, |_, player| canonicalize_player(player));
    }
    for_each_object(doc, "sets", |_, set| canonicalize_set(set));
    for_each_object(doc, "events", canonicalize_event);
}

/// Normalize a match object
pub fn canonicalize_match(game: &mut Object) {
    rename_first(game, "externalId", &["seed_key", "seedKey", "external_id"]);
    rename_first(game, "gameNumber", &["gameN", "game_n", "game_number"]);
    rename_first(game, "gamePin", &["game_pin"]);
    rename_first(game, "team1Id", &["homeTeamId", "home_team_id"]);
    rename_first(game, "team2Id", &["awayTeamId", "away_team_id"]);
    rename_first(game, "scheduledAt", &["scheduled_at"]);
    rename_first(game, "sessionId", &["session_id"]);

    coerce_int(game, "id");
    coerce_int(game, "gameNumber");
    coerce_int(game, "team1Id");
    coerce_int(game, "team2Id");
    coerce_text(game, "gamePin");
    coerce_text(game, "externalId");
    coerce_bool(game, "test");
    if game.get("status").is_some_and(|status| !status.is_string()) {
        game.remove("status");
    }

    let toss = collect_coin_toss(game);
    if toss.is_empty() {
        game.remove("coinToss");
    } else {
        game.insert("coinToss".to_string(), Value::Object(toss));
    }
}

/// Merge flat legacy coin-toss columns with the nested object.
///
/// Values in the nested object win over the flat ones.
fn collect_coin_toss(game: &mut Object) -> Object {
    let mut toss = Object::new();
    let flat = [
        ("confirmed", &["coinTossConfirmed", "coin_toss_confirmed"][..]),
        ("teamA", &["coinTossTeamA", "coin_toss_team_a"][..]),
        ("teamB", &["coinTossTeamB", "coin_toss_team_b"][..]),
        ("firstServe", &["firstServe", "first_serve"][..]),
        ("serveA", &["coinTossServeA", "coin_toss_serve_a"][..]),
    ];
    for (target, aliases) in flat {
        for alias in aliases {
            if let Some(value) = game.remove(*alias) {
                if !value.is_null() && !toss.contains_key(target) {
                    toss.insert(target.to_string(), value);
                }
            }
        }
    }

    for key in ["coinToss", "coin_toss"] {
        if let Some(Value::Object(nested)) = game.remove(key) {
            for (name, value) in nested {
                if !value.is_null() {
                    toss.insert(snake_to_camel(&name), value);
                }
            }
        }
    }

    coerce_bool(&mut toss, "confirmed");
    toss
}

/// Normalize a team object
pub fn canonicalize_team(team: &mut Object) {
    rename_first(team, "shortName", &["short_name"]);
    coerce_int(team, "id");
    coerce_text(team, "name");
}

/// Normalize a player object
pub fn canonicalize_player(player: &mut Object) {
    rename_first(player, "firstName", &["first_name"]);
    rename_first(player, "lastName", &["last_name"]);
    rename_first(player, "isCaptain", &["is_captain", "captain"]);
    rename_first(player, "teamId", &["team_id"]);
    coerce_int(player, "id");
    coerce_int(player, "teamId");
    coerce_bool(player, "isCaptain");

    match player.get("number") {
        Some(Value::String(text)) => match text.trim().parse::<i64>() {
            Ok(number) => {
                player.insert("number".to_string(), Value::from(number));
            }
            Err(_) => {
                if let Some(raw) = player.remove("number") {
                    player.insert("numberText".to_string(), raw);
                }
            }
        },
        Some(_) => coerce_int(player, "number"),
        None => {}
    }
}

/// Normalize a set object
pub fn canonicalize_set(set: &mut Object) {
    rename_first(set, "index", &["set_index", "setIndex"]);
    rename_first(set, "team1Points", &["homePoints", "home_points"]);
    rename_first(set, "team2Points", &["awayPoints", "away_points"]);
    rename_first(set, "matchId", &["match_id"]);
    rename_first(set, "startTime", &["start_time"]);
    rename_first(set, "endTime", &["end_time"]);
    rename_first(set, "externalId", &["external_id"]);
    for key in ["id", "matchId", "index", "team1Points", "team2Points"] {
        coerce_int(set, key);
    }
    coerce_bool(set, "finished");
}

/// Normalize an event object; `position` fills a missing sequence
pub fn canonicalize_event(position: usize, event: &mut Object) {
    rename_first(event, "sequence", &["seq"]);
    rename_first(event, "setIndex", &["set_index"]);
    rename_first(event, "matchId", &["match_id"]);
    rename_first(event, "externalId", &["external_id"]);
    for key in ["id", "matchId", "setIndex"] {
        coerce_int(event, key);
    }
    if matches!(event.get("sequence"), None | Some(Value::Null)) {
        event.insert("sequence".to_string(), Value::from(position + 1));
    }
}

fn for_each_object(doc: &mut Object, key: &str, mut apply: impl FnMut(usize, &mut Object)) {
    if let Some(Value::Array(items)) = doc.get_mut(key) {
        for (position, item) in items.iter_mut().enumerate() {
            if let Value::Object(object) = item {
                apply(position, object);
            }
        }
    }
}

/// Move the first non-null alias into `target` unless `target` already holds
/// a value. All aliases are removed either way.
fn rename_first(object: &mut Object, target: &str, aliases: &[&str]) {
    let mut chosen = object.remove(target).filter(|value| !value.is_null());
    for alias in aliases {
        if let Some(value) = object.remove(*alias) {
            if chosen.is_none() && !value.is_null() {
                chosen = Some(value);
            }
        }
    }
    if let Some(value) = chosen {
        object.insert(target.to_string(), value);
    }
}

#[allow(clippy::cast_possible_truncation)]
fn coerce_int(object: &mut Object, key: &str) {
    let coerced = match object.get(key) {
        None => return,
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Some(Value::String(text)) => text.trim().parse::<i64>().ok(),
        Some(_) => None,
    };
    match coerced {
        Some(number) => {
            object.insert(key.to_string(), Value::Number(Number::from(number)));
        }
        None => {
            object.remove(key);
        }
    }
}

fn coerce_bool(object: &mut Object, key: &str) {
    let coerced = match object.get(key) {
        None => return,
        Some(Value::Bool(flag)) => Some(*flag),
        Some(Value::Number(number)) => Some(number.as_f64().is_some_and(|n| n != 0.0)),
        Some(Value::String(text)) => Some(matches!(
            text.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes"
        )),
        Some(_) => None,
    };
    match coerced {
        Some(flag) => {
            object.insert(key.to_string(), Value::Bool(flag));
        }
        None => {
            object.remove(key);
        }
    }
}

fn coerce_text(object: &mut Object, key: &str) {
    let coerced = match object.get(key) {
        None => return,
        Some(Value::String(_)) => return,
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(_) => None,
    };
    match coerced {
        Some(text) => {
            object.insert(key.to_string(), Value::String(text));
        }
        None => {
            object.remove(key);
        }
    }
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
