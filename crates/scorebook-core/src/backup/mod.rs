//! Backup and restore engine.
//!
//! Three ways to bring a match onto this device: a full wipe-and-replace
//! restore from a backup document, an in-place restore into an existing
//! match, and an import from the cloud row-store. Every local write happens
//! in one transaction; restores also queue a job that pushes the restored
//! state back to the cloud.

mod cloud_payload;
mod import;

use libsql::Connection;
use serde_json::Value;

use crate::cloud::{CloudMatchBundle, CloudRowStore, DEFAULT_SPORT_TYPE};
use crate::db::{
    transaction, CurrentMatchSlot, LibSqlMatchRepository, LibSqlScoringRepository,
    LibSqlSyncQueue, LibSqlTeamRepository, MatchRepository,
};
use crate::error::{Error, Result};
use crate::models::{Match, MatchId, Player, Team, MATCH_RESOURCE, RESTORE_ACTION};
use crate::services::DatabaseService;
use crate::snapshot::{self, Snapshot};

pub use cloud_payload::{live_state, player_column, restore_payload};
pub use import::{snapshot_from_cloud, ImportSummary};

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Written into cloud payloads as `sport_type`
    pub sport_type: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sport_type: DEFAULT_SPORT_TYPE.to_string(),
        }
    }
}

/// What a restore or import wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub match_id: MatchId,
    pub sets: usize,
    pub events: usize,
    pub lineup_events: usize,
    /// Queued cloud job, when the match has an external id
    pub sync_job_id: Option<i64>,
}

#[derive(Clone)]
pub struct BackupEngine {
    db: DatabaseService,
    config: EngineConfig,
}

impl BackupEngine {
    pub fn new(db: DatabaseService, config: EngineConfig) -> Self {
        Self { db, config }
    }

    pub const fn database(&self) -> &DatabaseService {
        &self.db
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Snapshot of one match. Read only.
    pub async fn export_match_data(&self, match_id: MatchId) -> Result<Snapshot> {
        let db = self.db.lock().await;
        snapshot::encode(db.connection(), match_id).await
    }

    /// Wipe the match store and replace it with `document`.
    ///
    /// The document is validated before anything is touched. Teams are kept
    /// and matched by exact name; every match, set, event and queued job is
    /// removed.
    pub async fn restore_match_from_json(&self, document: Value) -> Result<RestoreOutcome> {
        let snapshot = snapshot::decode(document)?;
        self.restore_snapshot(&snapshot).await
    }

    /// Wipe-and-replace restore of an already decoded snapshot
    pub async fn restore_snapshot(&self, snapshot: &Snapshot) -> Result<RestoreOutcome> {
        if snapshot.external_id().is_none() {
            tracing::warn!("Backup has no external id; the cloud will not be updated");
        }

        let db = self.db.lock().await;
        let conn = db.connection();
        transaction::begin(conn).await?;
        let result: Result<RestoreOutcome> = async {
            LibSqlScoringRepository::new(conn).clear().await?;
            LibSqlMatchRepository::new(conn).clear().await?;
            LibSqlSyncQueue::new(conn).clear().await?;

            let teams = LibSqlTeamRepository::new(conn);
            let team1_id = upsert_team(&teams, snapshot.team1.as_ref(), &snapshot.team1_players).await?;
            let team2_id = upsert_team(&teams, snapshot.team2.as_ref(), &snapshot.team2_players).await?;

            let game = Match {
                id: MatchId::default(),
                team1_id,
                team2_id,
                session_id: None,
                ..snapshot.game.clone()
            };
            let match_id = LibSqlMatchRepository::new(conn).insert(&game).await?;
            CurrentMatchSlot::new(conn).set(match_id).await?;

            insert_scoring(conn, match_id, snapshot).await?;
            let sync_job_id = self.queue_restore_job(conn, match_id).await?;
            Ok(outcome(match_id, snapshot, sync_job_id))
        }
        .await;
        let outcome = transaction::finish(conn, result).await?;

        tracing::info!(
            match_id = %outcome.match_id,
            sets = outcome.sets,
            events = outcome.events,
            lineup_events = outcome.lineup_events,
            "Match restored from backup"
        );
        Ok(outcome)
    }

    /// Replace one match's fields, sets and events with `document`.
    ///
    /// The match keeps its local id, teams, rosters, session claim and
    /// stored external id.
    pub async fn restore_match_in_place(
        &self,
        match_id: MatchId,
        document: Value,
    ) -> Result<RestoreOutcome> {
        let snapshot = snapshot::decode(document)?;

        let db = self.db.lock().await;
        let conn = db.connection();
        transaction::begin(conn).await?;
        let result: Result<RestoreOutcome> = async {
            let matches = LibSqlMatchRepository::new(conn);
            let existing = matches
                .get(match_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("match {match_id}")))?;

            let updated = Match {
                id: existing.id,
                external_id: existing.external_id.clone().or_else(|| snapshot.game.external_id.clone()),
                team1_id: existing.team1_id,
                team2_id: existing.team2_id,
                session_id: existing.session_id.clone(),
                ..snapshot.game.clone()
            };
            matches.update(&updated).await?;

            LibSqlScoringRepository::new(conn).delete_for_match(match_id).await?;
            insert_scoring(conn, match_id, &snapshot).await?;

            let sync_job_id = self.queue_restore_job(conn, match_id).await?;
            Ok(outcome(match_id, &snapshot, sync_job_id))
        }
        .await;
        let outcome = transaction::finish(conn, result).await?;

        tracing::info!(
            match_id = %outcome.match_id,
            sets = outcome.sets,
            events = outcome.events,
            "Match restored in place"
        );
        Ok(outcome)
    }

    /// Bring a cloud match onto this device as new local rows.
    ///
    /// Teams and players are always created fresh. The match only becomes
    /// the current match when no other match holds the slot.
    pub async fn import_match_from_cloud(&self, bundle: &CloudMatchBundle) -> Result<RestoreOutcome> {
        let (snapshot, summary) = snapshot_from_cloud(bundle);

        let db = self.db.lock().await;
        let conn = db.connection();
        transaction::begin(conn).await?;
        let result: Result<MatchId> = async {
            let matches = LibSqlMatchRepository::new(conn);
            if let Some(external_id) = snapshot.external_id() {
                if let Some(existing) = matches.find_by_external_id(external_id).await? {
                    return Err(Error::InvalidInput(format!(
                        "Match {external_id} is already on this device as local match {}",
                        existing.id
                    )));
                }
            }

            let teams = LibSqlTeamRepository::new(conn);
            let team1_id = insert_team(&teams, snapshot.team1.as_ref(), &snapshot.team1_players).await?;
            let team2_id = insert_team(&teams, snapshot.team2.as_ref(), &snapshot.team2_players).await?;

            let game = Match {
                team1_id,
                team2_id,
                ..snapshot.game.clone()
            };
            let match_id = matches.insert(&game).await?;
            if !CurrentMatchSlot::new(conn).set_if_vacant(match_id).await? {
                tracing::info!(%match_id, "Current match slot is taken; imported match left unselected");
            }

            insert_scoring(conn, match_id, &snapshot).await?;
            Ok(match_id)
        }
        .await;
        let match_id = transaction::finish(conn, result).await?;

        tracing::info!(
            %match_id,
            sets = summary.sets,
            events = summary.events,
            lineup_events = summary.lineup_events,
            synthesized_set = summary.synthesized_set,
            "Match imported from cloud"
        );
        Ok(RestoreOutcome {
            match_id,
            sets: summary.sets,
            events: summary.events,
            lineup_events: summary.lineup_events,
            sync_job_id: None,
        })
    }

    /// Fetch a match by PIN from the row store and import it
    pub async fn import_match_by_pin<S: CloudRowStore>(
        &self,
        store: &S,
        pin: &str,
        game_number: Option<i64>,
    ) -> Result<RestoreOutcome> {
        let bundle = store
            .fetch_match_bundle(pin.trim(), game_number)
            .await?
            .ok_or_else(|| Error::NotFound("No match found with this game number and PIN".to_string()))?;
        self.import_match_from_cloud(&bundle).await
    }

    /// Queue a cloud restore job built from the stored rows of `match_id`
    async fn queue_restore_job(&self, conn: &Connection, match_id: MatchId) -> Result<Option<i64>> {
        let stored = snapshot::encode(conn, match_id).await?;
        let Some(external_id) = stored.external_id() else {
            tracing::warn!(%match_id, "Skipping cloud sync job: match has no external id");
            return Ok(None);
        };

        let payload = restore_payload(&stored, external_id, &self.config.sport_type);
        let job = LibSqlSyncQueue::new(conn)
            .enqueue(MATCH_RESOURCE, RESTORE_ACTION, &serde_json::to_value(&payload)?)
            .await?;
        tracing::info!(job_id = job.id, %external_id, "Restore job queued");
        Ok(Some(job.id))
    }
}

fn outcome(match_id: MatchId, snapshot: &Snapshot, sync_job_id: Option<i64>) -> RestoreOutcome {
    RestoreOutcome {
        match_id,
        sets: snapshot.sets.len(),
        events: snapshot.events.len(),
        lineup_events: snapshot.events.iter().filter(|event| event.is_lineup()).count(),
        sync_job_id,
    }
}

async fn upsert_team(
    teams: &LibSqlTeamRepository<'_>,
    team: Option<&Team>,
    players: &[Player],
) -> Result<Option<i64>> {
    let Some(team) = team.filter(|team| !team.name.trim().is_empty()) else {
        return Ok(None);
    };
    let team_id = teams.upsert_by_name(team).await?;
    teams.replace_players(team_id, players).await?;
    Ok(Some(team_id))
}

async fn insert_team(
    teams: &LibSqlTeamRepository<'_>,
    team: Option<&Team>,
    players: &[Player],
) -> Result<Option<i64>> {
    let Some(team) = team else {
        return Ok(None);
    };
    let team_id = teams.insert(team).await?;
    for player in players {
        teams.insert_player(team_id, player).await?;
    }
    Ok(Some(team_id))
}

async fn insert_scoring(conn: &Connection, match_id: MatchId, snapshot: &Snapshot) -> Result<()> {
    let scoring = LibSqlScoringRepository::new(conn);
    for set in &snapshot.sets {
        scoring.insert_set(match_id, set).await?;
    }
    for event in &snapshot.events {
        scoring.insert_event(match_id, event).await?;
    }
    Ok(())
}
