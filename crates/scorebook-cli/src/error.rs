use std::io;

use scorebook_core::FailureCategory;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] scorebook_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No current match. Pass a match id")]
    NoCurrentMatch,
    #[error("Match not found: {0}")]
    MatchNotFound(i64),
    #[error("Match {match_id} is being edited on another device (session {session_id}). Use --force to override")]
    MatchLocked { match_id: i64, session_id: String },
    #[error("PIN rejected for match {0}")]
    PinRejected(i64),
    #[error("Invalid event: {0}")]
    InvalidEvent(String),
    #[error("No backups found for game {0}")]
    NoBackups(i64),
    #[error("Could not claim match {0}")]
    LockFailed(i64),
}

impl CliError {
    /// Next step for the user, keyed on what kind of failure this was
    pub fn hint(&self) -> Option<&'static str> {
        let Self::Core(error) = self else {
            return None;
        };
        match error.category() {
            FailureCategory::BadFile => {
                Some("The file is not a valid Scorebook backup. Nothing was changed.")
            }
            FailureCategory::Network => {
                Some("The cloud could not be reached. Check your connection and configuration, then retry.")
            }
            FailureCategory::StorageFull => Some("The device is out of space. Free some space and retry."),
            FailureCategory::Storage => Some("The local database rejected the change. Nothing was written."),
            FailureCategory::Other => None,
        }
    }
}
