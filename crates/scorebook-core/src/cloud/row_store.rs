use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::rows::{CloudEventRow, CloudMatchBundle, CloudMatchRow, CloudSetRow, LiveStateRow, RestorePayload};
use super::DEFAULT_SPORT_TYPE;
use crate::error::{Error, Result};
use crate::models::SyncStatus;
use crate::services::DatabaseService;

/// Consumer side of the sync queue plus the read used by cloud import
#[allow(async_fn_in_trait)]
pub trait CloudRowStore {
    /// Replace one match in the cloud.
    ///
    /// Deletes the match's sets and events, upserts the match by external id,
    /// inserts the payload's sets and events and upserts the live state.
    /// Applying the same payload twice leaves the same rows as applying it once.
    async fn apply_restore(&self, payload: &RestorePayload) -> Result<()>;

    /// Look a match up by PIN (and game number when given)
    async fn fetch_match_bundle(
        &self,
        pin: &str,
        game_number: Option<i64>,
    ) -> Result<Option<CloudMatchBundle>>;
}

/// Outcome of draining the sync queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushReport {
    pub sent: usize,
    pub failed: usize,
}

/// Deliver every queued `restore` job, marking each `sent` or `failed`
pub async fn push_restore_jobs<S: CloudRowStore>(
    db: &DatabaseService,
    store: &S,
) -> Result<PushReport> {
    let mut report = PushReport::default();
    for job in db.list_sync_jobs(Some(SyncStatus::Queued)).await? {
        if !job.is_restore() {
            continue;
        }

        let outcome = match serde_json::from_value::<RestorePayload>(job.payload.clone()) {
            Ok(payload) => store.apply_restore(&payload).await,
            Err(error) => Err(Error::Validation(format!(
                "restore job {} has an invalid payload: {error}",
                job.id
            ))),
        };

        match outcome {
            Ok(()) => {
                db.mark_sync_job(job.id, SyncStatus::Sent).await?;
                report.sent += 1;
            }
            Err(error) => {
                tracing::warn!(job_id = job.id, "Restore job failed: {}", error);
                db.mark_sync_job(job.id, SyncStatus::Failed).await?;
                report.failed += 1;
            }
        }
    }
    tracing::info!(sent = report.sent, failed = report.failed, "Sync queue pushed");
    Ok(report)
}

#[derive(Debug, Clone)]
struct StoredMatch {
    id: i64,
    columns: Map<String, Value>,
    sets: Vec<CloudSetRow>,
    events: Vec<CloudEventRow>,
    live_state: Option<LiveStateRow>,
}

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    matches: Vec<StoredMatch>,
}

/// In-process row store
#[derive(Debug)]
pub struct MemoryRowStore {
    sport_type: String,
    tables: Mutex<Tables>,
}

impl Default for MemoryRowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRowStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sport_type: DEFAULT_SPORT_TYPE.to_string(),
            tables: Mutex::new(Tables::default()),
        }
    }

    #[must_use]
    pub fn with_sport_type(mut self, sport_type: impl Into<String>) -> Self {
        self.sport_type = sport_type.into();
        self
    }

    /// Seed a match as another device would have written it
    pub async fn insert_bundle(&self, bundle: CloudMatchBundle) -> i64 {
        let mut tables = self.tables.lock().await;
        tables.next_id += 1;
        let id = tables.next_id;
        tables.matches.push(StoredMatch {
            id,
            columns: bundle.game.0,
            sets: bundle.sets,
            events: bundle.events,
            live_state: bundle.live_state,
        });
        id
    }

    /// Everything stored for `external_id`
    pub async fn bundle_by_external_id(&self, external_id: &str) -> Option<CloudMatchBundle> {
        let tables = self.tables.lock().await;
        tables
            .matches
            .iter()
            .find(|stored| stored_external_id(stored) == Some(external_id))
            .map(to_bundle)
    }

    pub async fn match_count(&self) -> usize {
        self.tables.lock().await.matches.len()
    }
}

fn stored_external_id(stored: &StoredMatch) -> Option<&str> {
    stored.columns.get("external_id").and_then(Value::as_str)
}

/// Replace the row sharing `row`'s key, or append when it is new or keyless
fn upsert_by_key<T>(rows: &mut Vec<T>, row: T, key: impl Fn(&T) -> Option<&str>) {
    let existing = key(&row).and_then(|wanted| rows.iter().position(|held| key(held) == Some(wanted)));
    match existing {
        Some(index) => rows[index] = row,
        None => rows.push(row),
    }
}

fn to_bundle(stored: &StoredMatch) -> CloudMatchBundle {
    CloudMatchBundle {
        game: CloudMatchRow(stored.columns.clone()),
        sets: stored.sets.clone(),
        events: stored.events.clone(),
        live_state: stored.live_state.clone(),
    }
}

impl CloudRowStore for MemoryRowStore {
    async fn apply_restore(&self, payload: &RestorePayload) -> Result<()> {
        let external_id = payload
            .external_id()
            .ok_or_else(|| Error::Validation("restore payload has no external_id".to_string()))?
            .to_string();
        payload.ensure_unique_child_keys()?;

        let mut tables = self.tables.lock().await;
        let position = tables
            .matches
            .iter()
            .position(|stored| stored_external_id(stored) == Some(external_id.as_str()));
        let index = if let Some(index) = position {
            index
        } else {
            tables.next_id += 1;
            let id = tables.next_id;
            tables.matches.push(StoredMatch {
                id,
                columns: Map::new(),
                sets: Vec::new(),
                events: Vec::new(),
                live_state: None,
            });
            tables.matches.len() - 1
        };

        let stored = &mut tables.matches[index];
        stored.sets.clear();
        stored.events.clear();
        stored.columns.extend(payload.game.clone());
        for set in &payload.sets {
            upsert_by_key(&mut stored.sets, set.clone(), |row| row.external_id.as_deref());
        }
        for event in &payload.events {
            upsert_by_key(&mut stored.events, event.clone(), |row| row.external_id.as_deref());
        }
        stored.live_state = Some(payload.live_state.clone());
        tracing::debug!(match_id = stored.id, %external_id, "Applied restore payload");
        Ok(())
    }

    async fn fetch_match_bundle(
        &self,
        pin: &str,
        game_number: Option<i64>,
    ) -> Result<Option<CloudMatchBundle>> {
        let tables = self.tables.lock().await;
        let mut found = tables.matches.iter().filter(|stored| {
            let row = CloudMatchRow(stored.columns.clone());
            row.text("game_pin").as_deref() == Some(pin)
                && row.text("sport_type").as_deref() == Some(self.sport_type.as_str())
                && game_number.map_or(true, |number| row.integer("game_n") == Some(number))
        });
        let first = found.next();
        if found.next().is_some() {
            return Err(Error::InvalidInput(format!(
                "More than one match uses PIN {pin}; pass a game number"
            )));
        }
        Ok(first.map(to_bundle))
    }
}
