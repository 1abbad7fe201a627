//! Scoring event model

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{MatchId, Sequence};

/// Event type that opens a set
pub const SET_START: &str = "set_start";
/// Event type carrying a team's on-court lineup
pub const LINEUP: &str = "lineup";

const fn first_set() -> i64 {
    1
}

/// Append-only scoring event, ordered by `(set_index, sequence)`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub match_id: MatchId,
    #[serde(default = "first_set")]
    pub set_index: i64,
    #[serde(default)]
    pub sequence: Sequence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl EventRecord {
    /// Unsaved event for the given set; the store assigns the sequence
    #[must_use]
    pub fn new(set_index: i64, event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            set_index,
            event_type: event_type.into(),
            payload,
            ..Self::default()
        }
    }

    /// Total-order key
    #[must_use]
    pub const fn order_key(&self) -> (i64, Sequence) {
        (self.set_index, self.sequence)
    }

    #[must_use]
    pub fn is_lineup(&self) -> bool {
        self.event_type == LINEUP
    }
}

/// Event handed to the store by the scoring path
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub set_index: i64,
    pub event_type: String,
    pub payload: Value,
    /// Explicit position; the store picks the next whole number when unset
    pub sequence: Option<Sequence>,
    /// Defaults to the time of the append
    pub ts: Option<String>,
}

impl NewEvent {
    #[must_use]
    pub fn new(set_index: i64, event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            set_index,
            event_type: event_type.into(),
            payload,
            sequence: None,
            ts: None,
        }
    }

    /// Insert at an explicit (possibly fractional) position
    #[must_use]
    pub const fn at(mut self, sequence: Sequence) -> Self {
        self.sequence = Some(sequence);
        self
    }
}

/// Sort events into replay order
pub fn sort_events(events: &mut [EventRecord]) {
    events.sort_by_key(EventRecord::order_key);
}
