//! Database layer for Scorebook

mod connection;
mod current_match;
mod match_repository;
mod migrations;
mod scoring_repository;
mod settings_repository;
mod sync_queue;
mod team_repository;
pub mod transaction;
pub(crate) mod values;

pub use connection::Database;
pub use current_match::CurrentMatchSlot;
pub use match_repository::{LibSqlMatchRepository, MatchRepository};
pub use scoring_repository::LibSqlScoringRepository;
pub use settings_repository::{LibSqlSettingsRepository, SettingsRepository, SESSION_ID_KEY};
pub use sync_queue::LibSqlSyncQueue;
pub use team_repository::LibSqlTeamRepository;
