use std::env;
use std::path::{Path, PathBuf};

use scorebook_core::backup::{BackupEngine, RestoreOutcome};
use scorebook_core::config::AppConfig;
use scorebook_core::models::SyncJob;
use scorebook_core::scheduler::LogBuffer;
use scorebook_core::services::DatabaseService;
use scorebook_core::session::SessionManager;
use scorebook_core::storage::{BackupEntry, BackupIndex, ObjectStoreBackend};
use scorebook_core::MatchId;
use serde_json::Value;

use crate::error::CliError;

/// Everything a command needs, opened once per invocation
pub struct AppContext {
    pub config: AppConfig,
    pub db: DatabaseService,
    pub logs: LogBuffer,
}

impl AppContext {
    pub async fn open(config: AppConfig, db_path: &Path, logs: LogBuffer) -> Result<Self, CliError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = DatabaseService::open_path(db_path).await?;
        Ok(Self { config, db, logs })
    }

    pub fn engine(&self) -> BackupEngine {
        BackupEngine::new(self.db.clone(), self.config.engine_config())
    }

    pub fn sessions(&self) -> SessionManager {
        SessionManager::new(self.db.clone())
    }

    pub fn backup_index(&self) -> Result<BackupIndex<ObjectStoreBackend>, CliError> {
        let store = self.config.object_store()?;
        tracing::debug!(backend = store.label(), "Using backup storage");
        Ok(BackupIndex::new(store))
    }

    /// The given match, or the current one when no id is passed
    pub async fn resolve_match(&self, match_id: Option<i64>) -> Result<MatchId, CliError> {
        match match_id {
            Some(id) => {
                let id = MatchId(id);
                if self.db.get_match(id).await?.is_none() {
                    return Err(CliError::MatchNotFound(id.get()));
                }
                Ok(id)
            }
            None => self
                .db
                .current_match()
                .await?
                .ok_or(CliError::NoCurrentMatch),
        }
    }

    /// Refuse to write a match another device has claimed
    pub async fn ensure_writable(&self, match_id: MatchId, force: bool) -> Result<(), CliError> {
        let status = self.sessions().check_match_session(Some(match_id)).await;
        if !status.locked {
            return Ok(());
        }
        let session_id = status.session_id.unwrap_or_default();
        if force {
            tracing::warn!(%match_id, %session_id, "Overriding another device's claim");
            return Ok(());
        }
        Err(CliError::MatchLocked {
            match_id: match_id.get(),
            session_id,
        })
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>, config: &AppConfig) -> PathBuf {
    cli_db_path
        .or_else(|| config.db_path.clone())
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
        .join("scorebook")
        .join("scorebook.db")
}

/// Read a file as JSON; anything unparseable counts as a bad backup
pub fn read_document(path: &Path) -> Result<Value, CliError> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|error| {
        scorebook_core::Error::Validation(format!("{} is not JSON: {error}", path.display())).into()
    })
}

pub fn write_output(rendered: &str, output: Option<&Path>) -> Result<(), CliError> {
    if let Some(path) = output {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }
    Ok(())
}

pub fn format_outcome(verb: &str, outcome: &RestoreOutcome) -> String {
    let job = outcome
        .sync_job_id
        .map_or_else(|| "no cloud job".to_string(), |id| format!("cloud job {id} queued"));
    format!(
        "{verb} match {}: {} sets, {} events ({} lineup), {job}",
        outcome.match_id, outcome.sets, outcome.events, outcome.lineup_events
    )
}

pub fn format_backup_lines(entries: &[BackupEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let modified = entry
                .last_modified
                .map_or_else(String::new, |at| at.format("%Y-%m-%d %H:%M:%S").to_string());
            format!("{:<72}  {:>8} B  {modified}", entry.file_name, entry.size)
        })
        .collect()
}

pub fn format_job_lines(jobs: &[SyncJob]) -> Vec<String> {
    jobs.iter()
        .map(|job| {
            format!(
                "{:>5}  {:<6}  {}/{}  {}",
                job.id, job.status.as_str(), job.resource, job.action, job.ts
            )
        })
        .collect()
}
