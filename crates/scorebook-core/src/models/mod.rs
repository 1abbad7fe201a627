//! Data models for Scorebook

mod event;
mod match_record;
mod sequence;
mod set;
mod sync_job;
mod team;

pub use event::{sort_events, EventRecord, NewEvent, LINEUP, SET_START};
pub use match_record::{CoinToss, Match, MatchId, MatchStatus};
pub use sequence::Sequence;
pub use set::{latest_set, SetRecord};
pub use sync_job::{SyncJob, SyncStatus, MATCH_RESOURCE, RESTORE_ACTION};
pub use team::{Player, Team};
