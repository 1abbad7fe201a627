//! Shared database service wrapper used by the engine, scheduler and CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::db::{
    CurrentMatchSlot, Database, LibSqlMatchRepository, LibSqlScoringRepository,
    LibSqlSettingsRepository, LibSqlSyncQueue, LibSqlTeamRepository, MatchRepository,
    SettingsRepository,
};
use crate::models::{EventRecord, Match, MatchId, NewEvent, Player, SetRecord, SyncJob, SyncStatus, Team};
use crate::Result;

/// Thread-safe service for DB and repository operations.
///
/// Every call holds the connection lock for its whole duration, so
/// transactions never interleave.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    ///
    /// A file that is not a database is moved aside and a fresh store is
    /// created in its place.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::open(&db_path).await {
            Ok(db) => db,
            Err(error) if looks_corrupt(&error) => {
                tracing::warn!(path = %db_path.display(), %error, "Scorebook file is unreadable");
                set_aside(&db_path)?;
                Database::open(&db_path).await?
            }
            Err(error) => return Err(error),
        };

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Path of the backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Exclusive access to the connection for multi-statement work.
    pub async fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().await
    }

    /// Fetch a match by id.
    pub async fn get_match(&self, id: MatchId) -> Result<Option<Match>> {
        let db = self.db.lock().await;
        LibSqlMatchRepository::new(db.connection()).get(id).await
    }

    /// List all stored matches.
    pub async fn list_matches(&self) -> Result<Vec<Match>> {
        let db = self.db.lock().await;
        LibSqlMatchRepository::new(db.connection()).list().await
    }

    /// Create a match; it takes the current slot only when the slot is vacant.
    pub async fn create_match(&self, game: &Match) -> Result<MatchId> {
        let db = self.db.lock().await;
        let id = LibSqlMatchRepository::new(db.connection()).insert(game).await?;
        CurrentMatchSlot::new(db.connection()).set_if_vacant(id).await?;
        Ok(id)
    }

    /// Match occupying the current slot.
    pub async fn current_match(&self) -> Result<Option<MatchId>> {
        let db = self.db.lock().await;
        CurrentMatchSlot::new(db.connection()).get().await
    }

    /// Set or clear the exclusive-edit claim of a match.
    pub async fn set_match_session(&self, id: MatchId, session_id: Option<&str>) -> Result<bool> {
        let db = self.db.lock().await;
        LibSqlMatchRepository::new(db.connection())
            .set_session(id, session_id)
            .await
    }

    /// Fetch a team by id.
    pub async fn get_team(&self, id: i64) -> Result<Option<Team>> {
        let db = self.db.lock().await;
        LibSqlTeamRepository::new(db.connection()).get(id).await
    }

    /// Create or update a team by exact name.
    pub async fn upsert_team(&self, team: &Team) -> Result<i64> {
        let db = self.db.lock().await;
        LibSqlTeamRepository::new(db.connection())
            .upsert_by_name(team)
            .await
    }

    /// Roster of a team.
    pub async fn list_players(&self, team_id: i64) -> Result<Vec<Player>> {
        let db = self.db.lock().await;
        LibSqlTeamRepository::new(db.connection())
            .list_players(team_id)
            .await
    }

    /// Sets of a match, ordered by index.
    pub async fn list_sets(&self, match_id: MatchId) -> Result<Vec<SetRecord>> {
        let db = self.db.lock().await;
        LibSqlScoringRepository::new(db.connection())
            .list_sets(match_id)
            .await
    }

    /// Add a set to a match.
    pub async fn add_set(&self, match_id: MatchId, set: &SetRecord) -> Result<i64> {
        let db = self.db.lock().await;
        LibSqlScoringRepository::new(db.connection())
            .insert_set(match_id, set)
            .await
    }

    /// Events of a match in replay order.
    pub async fn list_events(&self, match_id: MatchId) -> Result<Vec<EventRecord>> {
        let db = self.db.lock().await;
        LibSqlScoringRepository::new(db.connection())
            .list_events(match_id)
            .await
    }

    /// Append a scoring event to a match.
    pub async fn append_event(&self, match_id: MatchId, event: NewEvent) -> Result<EventRecord> {
        let db = self.db.lock().await;
        LibSqlScoringRepository::new(db.connection())
            .append_event(match_id, event)
            .await
    }

    /// List sync queue jobs.
    pub async fn list_sync_jobs(&self, status: Option<SyncStatus>) -> Result<Vec<SyncJob>> {
        let db = self.db.lock().await;
        LibSqlSyncQueue::new(db.connection()).list(status).await
    }

    /// Record the delivery outcome of a sync job.
    pub async fn mark_sync_job(&self, id: i64, status: SyncStatus) -> Result<bool> {
        let db = self.db.lock().await;
        LibSqlSyncQueue::new(db.connection()).mark(id, status).await
    }

    /// Read a device setting.
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.lock().await;
        LibSqlSettingsRepository::new(db.connection()).get(key).await
    }

    /// Write a device setting.
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlSettingsRepository::new(db.connection())
            .set(key, value)
            .await
    }

    /// Remove a device setting.
    pub async fn remove_setting(&self, key: &str) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlSettingsRepository::new(db.connection())
            .remove(key)
            .await
    }
}

fn looks_corrupt(error: &crate::Error) -> bool {
    let message = error.to_string().to_ascii_lowercase();
    ["file is not a database", "malformed"]
        .iter()
        .any(|needle| message.contains(needle))
}

/// Renames an unreadable store to `<name>.corrupt-<millis>` and drops its
/// WAL/SHM companions so the next open starts clean.
fn set_aside(db_path: &Path) -> Result<()> {
    let (Some(dir), Some(name)) = (db_path.parent(), db_path.file_name()) else {
        return Ok(());
    };
    let name = name.to_string_lossy().into_owned();

    if db_path.is_file() {
        let parked = dir.join(format!("{name}.corrupt-{}", crate::util::unix_millis_now()));
        std::fs::rename(db_path, &parked)?;
        tracing::warn!(from = %db_path.display(), to = %parked.display(), "Parked unreadable database");
    }

    let companions = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|file| file.to_str())
                .and_then(|file| file.strip_prefix(name.as_str()))
                .is_some_and(|rest| rest.starts_with('-'))
        });
    for path in companions {
        std::fs::remove_file(&path)?;
        tracing::debug!(path = %path.display(), "Removed stale companion file");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn in_memory_match_and_event_roundtrip() {
        let service = DatabaseService::open_in_memory().await.unwrap();

        let id = service.create_match(&Match::default()).await.unwrap();
        assert_eq!(service.current_match().await.unwrap(), Some(id));

        service
            .append_event(id, NewEvent::new(1, "point", json!({"team": "team1"})))
            .await
            .unwrap();
        let events = service.list_events(id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "point");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn second_match_does_not_evict_current_slot() {
        let service = DatabaseService::open_in_memory().await.unwrap();
        let first = service.create_match(&Match::default()).await.unwrap();
        service.create_match(&Match::default()).await.unwrap();
        assert_eq!(service.current_match().await.unwrap(), Some(first));
    }

    #[test]
    fn only_format_errors_count_as_corruption() {
        assert!(looks_corrupt(&crate::Error::Database(
            "SQLite failure: file is not a database".to_string()
        )));
        assert!(!looks_corrupt(&crate::Error::InvalidInput("bad pin".to_string())));
    }

    #[test]
    fn set_aside_parks_the_file_and_clears_companions() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("games.db");
        std::fs::write(&store, b"garbage").unwrap();
        std::fs::write(dir.path().join("games.db-wal"), b"w").unwrap();
        std::fs::write(dir.path().join("games.db-shm"), b"s").unwrap();
        std::fs::write(dir.path().join("other.db-wal"), b"keep").unwrap();

        set_aside(&store).unwrap();

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names.len(), 2);
        assert!(names[0].starts_with("games.db.corrupt-"));
        assert_eq!(names[1], "other.db-wal");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_path_creates_parent_directories() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("scorebook.db");

        let service = DatabaseService::open_path(&db_path).await.unwrap();
        assert_eq!(service.path(), Some(db_path.as_path()));
        assert!(db_path.exists());
    }
}
