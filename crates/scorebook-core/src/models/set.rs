//! Set model

use serde::{Deserialize, Serialize};

use super::MatchId;

/// One set of a match
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRecord {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub match_id: MatchId,
    /// One-based ordinal
    pub index: i64,
    #[serde(default)]
    pub team1_points: i64,
    #[serde(default)]
    pub team2_points: i64,
    #[serde(default)]
    pub finished: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl SetRecord {
    /// Empty, unfinished set with the given ordinal
    #[must_use]
    pub fn new(index: i64) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    /// Team 1 won this set (finished and strictly ahead)
    #[must_use]
    pub const fn won_by_team1(&self) -> bool {
        self.finished && self.team1_points > self.team2_points
    }

    /// Team 2 won this set (finished and strictly ahead)
    #[must_use]
    pub const fn won_by_team2(&self) -> bool {
        self.finished && self.team2_points > self.team1_points
    }
}

/// Latest set by ordinal, if any
pub fn latest_set(sets: &[SetRecord]) -> Option<&SetRecord> {
    sets.iter().max_by_key(|set| set.index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tied_finished_set_counts_for_nobody() {
        let set = SetRecord {
            team1_points: 21,
            team2_points: 21,
            finished: true,
            ..SetRecord::new(1)
        };
        assert!(!set.won_by_team1());
        assert!(!set.won_by_team2());
    }

    #[test]
    fn unfinished_set_counts_for_nobody() {
        let set = SetRecord {
            team1_points: 18,
            team2_points: 3,
            ..SetRecord::new(2)
        };
        assert!(!set.won_by_team1());
    }

    #[test]
    fn latest_set_uses_index_not_position() {
        let sets = vec![SetRecord::new(2), SetRecord::new(3), SetRecord::new(1)];
        assert_eq!(latest_set(&sets).map(|set| set.index), Some(3));
        assert!(latest_set(&[]).is_none());
    }
}
