//! Cloud backup index: snapshots and logs laid out by name in an object store.
//!
//! Nothing but the object keys is needed to enumerate backups; see
//! [`crate::snapshot::naming`] for the key grammar.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::{ObjectStore, PutMode};
use crate::error::{Error, Result};
use crate::models::MatchId;
use crate::snapshot::naming::{
    backup_folder, backup_object_key, log_object_key, parse_backup_name, BackupName,
};
use crate::snapshot::{self, Snapshot};

/// Create-only collisions are retried this many times, one millisecond apart
const MAX_NAME_ATTEMPTS: u32 = 5;

/// One stored snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEntry {
    pub key: String,
    pub file_name: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    /// Fields decoded from the file name; `None` for foreign names
    pub parsed: Option<BackupName>,
}

#[derive(Debug, Clone)]
pub struct BackupIndex<S> {
    store: S,
}

impl<S: ObjectStore> BackupIndex<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Upload a snapshot under a fresh, never-overwritten key
    pub async fn upload_snapshot(&self, snapshot: &Snapshot) -> Result<String> {
        self.upload_snapshot_at(snapshot, Utc::now()).await
    }

    /// Upload using `at` as the name timestamp, moving forward one
    /// millisecond per collision
    pub async fn upload_snapshot_at(&self, snapshot: &Snapshot, at: DateTime<Utc>) -> Result<String> {
        let body = snapshot.to_json_pretty()?.into_bytes();
        let mut at = at;
        for _ in 0..MAX_NAME_ATTEMPTS {
            let key = backup_object_key(snapshot, at);
            match self
                .store
                .put_object(&key, body.clone(), Some("application/json"), PutMode::CreateOnly)
                .await
            {
                Ok(()) => {
                    tracing::debug!(%key, "Snapshot uploaded");
                    return Ok(key);
                }
                Err(Error::AlreadyExists(_)) => at += Duration::milliseconds(1),
                Err(error) => return Err(error),
            }
        }
        Err(Error::AlreadyExists(backup_object_key(snapshot, at)))
    }

    /// Backups of one game, newest first; only `.json` objects are listed.
    ///
    /// Names that do not follow the backup grammar are kept and sort last.
    pub async fn list_backups(&self, game_number: i64) -> Result<Vec<BackupEntry>> {
        let folder = format!("{}/", backup_folder(game_number));
        let mut entries: Vec<BackupEntry> = self
            .store
            .list_objects(&folder)
            .await?
            .into_iter()
            .filter(|object| object.key.ends_with(".json"))
            .map(|object| {
                let file_name = object
                    .key
                    .rsplit('/')
                    .next()
                    .unwrap_or(object.key.as_str())
                    .to_string();
                BackupEntry {
                    parsed: parse_backup_name(&file_name),
                    file_name,
                    key: object.key,
                    size: object.size,
                    last_modified: object.last_modified,
                }
            })
            .collect();
        entries.sort_by(|a, b| sort_key(b).cmp(&sort_key(a)));
        Ok(entries)
    }

    /// Most recent backup of one game
    pub async fn latest_backup(&self, game_number: i64) -> Result<Option<BackupEntry>> {
        Ok(self.list_backups(game_number).await?.into_iter().next())
    }

    /// Download and decode one backup
    pub async fn fetch_backup(&self, key: &str) -> Result<Snapshot> {
        let bytes = self
            .store
            .get_object(key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("backup {key}")))?;
        snapshot::decode_slice(&bytes)
    }

    /// Append lines to the match's log object (download, concatenate, upload)
    pub async fn append_logs(
        &self,
        game_number: Option<i64>,
        match_id: Option<MatchId>,
        lines: &[String],
    ) -> Result<String> {
        let key = log_object_key(game_number, match_id);
        if lines.is_empty() {
            return Ok(key);
        }

        let mut content = self.store.get_object(&key).await?.unwrap_or_default();
        if !content.is_empty() && !content.ends_with(b"\n") {
            content.push(b'\n');
        }
        for line in lines {
            content.extend_from_slice(line.trim_end_matches('\n').as_bytes());
            content.push(b'\n');
        }

        self.store
            .put_object(&key, content, Some("text/plain"), PutMode::Overwrite)
            .await?;
        Ok(key)
    }
}

/// Name timestamp first, so scores embedded earlier in the name do not
/// affect the order
fn sort_key(entry: &BackupEntry) -> (Option<(&str, &str, u32)>, &str) {
    (
        entry
            .parsed
            .as_ref()
            .map(|name| (name.date.as_str(), name.time.as_str(), name.millis)),
        entry.file_name.as_str(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Match, SetRecord};
    use crate::snapshot::SCHEMA_VERSION;
    use crate::storage::MemoryObjectStore;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn snapshot(points: i64) -> Snapshot {
        Snapshot {
            schema_version: SCHEMA_VERSION,
            last_updated: String::new(),
            game: Match {
                game_number: Some(4),
                external_id: Some("m-4".to_string()),
                ..Match::default()
            },
            team1: None,
            team2: None,
            team1_players: Vec::new(),
            team2_players: Vec::new(),
            sets: vec![SetRecord {
                team1_points: points,
                ..SetRecord::new(1)
            }],
            events: Vec::new(),
        }
    }

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).single().unwrap()
    }

    #[tokio::test]
    async fn same_millisecond_uploads_get_distinct_keys() {
        let index = BackupIndex::new(MemoryObjectStore::new());
        let first = index.upload_snapshot_at(&snapshot(3), at(1_700_000_000_000)).await.unwrap();
        let second = index.upload_snapshot_at(&snapshot(3), at(1_700_000_000_000)).await.unwrap();

        assert_ne!(first, second);
        assert!(second.ends_with("_001.json"));
        assert_eq!(index.list_backups(4).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn listing_is_newest_first_and_json_only() {
        let store = MemoryObjectStore::new();
        let index = BackupIndex::new(store.clone());
        index.upload_snapshot_at(&snapshot(1), at(1_700_000_000_000)).await.unwrap();
        index.upload_snapshot_at(&snapshot(2), at(1_700_000_100_000)).await.unwrap();
        store
            .put_object("backups/backup_g4/notes.txt", Vec::new(), None, PutMode::Overwrite)
            .await
            .unwrap();
        store
            .put_object("backups/backup_g4/manual.json", b"{}".to_vec(), None, PutMode::Overwrite)
            .await
            .unwrap();
        store
            .put_object("backups/backup_g40/backup_g40_x.json", Vec::new(), None, PutMode::Overwrite)
            .await
            .unwrap();

        let entries = index.list_backups(4).await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "backup_g4_set1_scoreleft2_scoreright0_20231114_221500_000.json",
                "backup_g4_set1_scoreleft1_scoreright0_20231114_221320_000.json",
                "manual.json",
            ]
        );
        assert_eq!(entries[0].parsed.as_ref().unwrap().left_score, 2);
        assert!(entries[2].parsed.is_none());
    }

    #[tokio::test]
    async fn fetch_decodes_the_stored_snapshot() {
        let index = BackupIndex::new(MemoryObjectStore::new());
        let key = index.upload_snapshot(&snapshot(7)).await.unwrap();

        let fetched = index.fetch_backup(&key).await.unwrap();
        assert_eq!(fetched.sets[0].team1_points, 7);
        assert_eq!(fetched.external_id(), Some("m-4"));

        let missing = index.fetch_backup("backups/backup_g4/none.json").await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn logs_append_to_one_object() {
        let index = BackupIndex::new(MemoryObjectStore::new());
        let key = index
            .append_logs(Some(4), None, &["first".to_string()])
            .await
            .unwrap();
        index
            .append_logs(Some(4), None, &["second\n".to_string(), "third".to_string()])
            .await
            .unwrap();

        let content = index.store().get_object(&key).await.unwrap().unwrap();
        assert_eq!(key, "logs/game_4/logs.txt");
        assert_eq!(String::from_utf8(content).unwrap(), "first\nsecond\nthird\n");
    }
}
