//! Object key grammar for backups and logs.
//!
//! ```text
//! backups/backup_g<game>/backup_g<game>_set<set>_scoreleft<l>_scoreright<r>_<yyyymmdd>_<hhmmss>_<ms>.json
//! logs/<game_N | match_ID | general>/logs.txt
//! ```
//!
//! Names say which match and which moment they hold. Within one set and
//! score they sort lexicographically in chronological order; listings order
//! by the embedded timestamp.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use super::Snapshot;
use crate::models::{latest_set, MatchId};

/// Root prefix of snapshot objects
pub const BACKUP_ROOT: &str = "backups";
/// Root prefix of log objects
pub const LOG_ROOT: &str = "logs";
/// File name of the append-only log object
pub const LOG_FILE: &str = "logs.txt";

static BACKUP_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^backup_g(\d+)_set(\d+)_scoreleft(\d+)_scoreright(\d+)_(\d{8})_(\d{6})_(\d{3})\.json$")
        .expect("Invalid backup name pattern")
});

/// Fields encoded in a backup file name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupName {
    pub game_number: i64,
    pub set_index: i64,
    /// Team 1 points in the latest set
    pub left_score: i64,
    /// Team 2 points in the latest set
    pub right_score: i64,
    /// `yyyymmdd`
    pub date: String,
    /// `hhmmss`
    pub time: String,
    pub millis: u32,
}

/// Game number used in names; missing or non-positive numbers become 1
pub fn game_number_of(snapshot: &Snapshot) -> i64 {
    snapshot.game.game_number.filter(|n| *n > 0).unwrap_or(1)
}

/// Folder holding every snapshot of one game
pub fn backup_folder(game_number: i64) -> String {
    format!("{BACKUP_ROOT}/backup_g{game_number}")
}

/// File name for `snapshot` taken at `at`
pub fn backup_file_name(snapshot: &Snapshot, at: DateTime<Utc>) -> String {
    let game = game_number_of(snapshot);
    let (set_index, left, right) = latest_set(&snapshot.sets).map_or((1, 0, 0), |set| {
        (set.index.max(1), set.team1_points, set.team2_points)
    });
    format!(
        "backup_g{game}_set{set_index}_scoreleft{left}_scoreright{right}_{}_{:03}.json",
        at.format("%Y%m%d_%H%M%S"),
        at.timestamp_subsec_millis().min(999)
    )
}

/// Full object key for `snapshot` taken at `at`
pub fn backup_object_key(snapshot: &Snapshot, at: DateTime<Utc>) -> String {
    format!(
        "{}/{}",
        backup_folder(game_number_of(snapshot)),
        backup_file_name(snapshot, at)
    )
}

/// Parse a backup file name (without folder); `None` when it does not follow
/// the grammar
pub fn parse_backup_name(name: &str) -> Option<BackupName> {
    let captures = BACKUP_NAME.captures(name)?;
    Some(BackupName {
        game_number: captures[1].parse().ok()?,
        set_index: captures[2].parse().ok()?,
        left_score: captures[3].parse().ok()?,
        right_score: captures[4].parse().ok()?,
        date: captures[5].to_string(),
        time: captures[6].to_string(),
        millis: captures[7].parse().ok()?,
    })
}

/// Log folder: by game number, else by local match id, else `general`
pub fn log_folder(game_number: Option<i64>, match_id: Option<MatchId>) -> String {
    match (game_number.filter(|n| *n > 0), match_id) {
        (Some(game), _) => format!("game_{game}"),
        (None, Some(id)) if id.is_assigned() => format!("match_{id}"),
        _ => "general".to_string(),
    }
}

/// Key of the append-only log object
pub fn log_object_key(game_number: Option<i64>, match_id: Option<MatchId>) -> String {
    format!("{LOG_ROOT}/{}/{LOG_FILE}", log_folder(game_number, match_id))
}
