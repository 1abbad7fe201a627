//! Outbound sync queue job

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Resource name for match-level jobs
pub const MATCH_RESOURCE: &str = "match";
/// Delete-then-upsert action
pub const RESTORE_ACTION: &str = "restore";

/// Delivery state of a queued job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Queued,
    Sent,
    Failed,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" => Ok(Self::Queued),
            "sent" => Ok(Self::Sent),
            "failed" | "error" => Ok(Self::Failed),
            other => Err(format!("unknown sync status: {other}")),
        }
    }
}

/// A pending mutation for the cloud row-store.
///
/// `payload` is already shaped to the destination columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: i64,
    pub resource: String,
    pub action: String,
    pub payload: Value,
    pub ts: String,
    pub status: SyncStatus,
}

impl SyncJob {
    #[must_use]
    pub fn is_restore(&self) -> bool {
        self.resource == MATCH_RESOURCE && self.action == RESTORE_ACTION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_reads_as_failed() {
        assert_eq!("error".parse::<SyncStatus>().unwrap(), SyncStatus::Failed);
        assert_eq!(" Sent ".parse::<SyncStatus>().unwrap(), SyncStatus::Sent);
        assert!("pending".parse::<SyncStatus>().is_err());
    }
}
