//! Continuous backup: throttled, best-effort uploads after scoring changes.
//!
//! A trigger never fails the caller. At most one upload runs at a time and a
//! new attempt starts at most once per throttle interval; anything skipped is
//! picked up by the next mutation's snapshot.

mod log_buffer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::backup::BackupEngine;
use crate::models::MatchId;
use crate::storage::{BackupIndex, ObjectStore};

pub use log_buffer::{LogBuffer, LogBufferWriter, PendingLogs, DEFAULT_LOG_CAPACITY};

/// Minimum spacing between two upload attempts
pub const BACKUP_THROTTLE: Duration = Duration::from_secs(2);

/// What a trigger did
#[derive(Debug)]
pub enum BackupTrigger {
    /// Uploads are running on this task
    Started(JoinHandle<()>),
    InFlight,
    Throttled,
    /// The snapshot could not be built; nothing was uploaded
    ExportFailed,
}

impl BackupTrigger {
    pub const fn is_started(&self) -> bool {
        matches!(self, Self::Started(_))
    }

    /// Wait for the spawned uploads, if any
    pub async fn finished(self) {
        if let Self::Started(handle) = self {
            if let Err(error) = handle.await {
                tracing::warn!("Backup task ended abnormally: {}", error);
            }
        }
    }
}

/// Attempt gate over `tokio::time::Instant`
#[derive(Debug)]
struct Throttle {
    interval: Duration,
    last_attempt: Mutex<Option<Instant>>,
}

impl Throttle {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_attempt: Mutex::new(None),
        }
    }

    /// Record an attempt now unless the previous one is too recent
    async fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut last = self.last_attempt.lock().await;
        if last.is_some_and(|at| now.duration_since(at) < self.interval) {
            return false;
        }
        *last = Some(now);
        true
    }
}

#[derive(Debug)]
struct State {
    in_flight: AtomicBool,
    throttle: Throttle,
}

/// Clears the in-flight flag when the upload task ends, however it ends
struct InFlightGuard(Arc<State>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::SeqCst);
    }
}

pub struct ContinuousBackup<S> {
    engine: BackupEngine,
    index: Arc<BackupIndex<S>>,
    logs: LogBuffer,
    state: Arc<State>,
}

impl<S> Clone for ContinuousBackup<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            index: Arc::clone(&self.index),
            logs: self.logs.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<S: ObjectStore + 'static> ContinuousBackup<S> {
    pub fn new(engine: BackupEngine, index: BackupIndex<S>, logs: LogBuffer) -> Self {
        Self::with_throttle(engine, index, logs, BACKUP_THROTTLE)
    }

    pub fn with_throttle(
        engine: BackupEngine,
        index: BackupIndex<S>,
        logs: LogBuffer,
        interval: Duration,
    ) -> Self {
        Self {
            engine,
            index: Arc::new(index),
            logs,
            state: Arc::new(State {
                in_flight: AtomicBool::new(false),
                throttle: Throttle::new(interval),
            }),
        }
    }

    pub fn index(&self) -> &BackupIndex<S> {
        &self.index
    }

    pub const fn logs(&self) -> &LogBuffer {
        &self.logs
    }

    pub fn is_in_flight(&self) -> bool {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    /// Call after every scoring mutation of `match_id`
    pub async fn trigger(&self, match_id: MatchId) -> BackupTrigger {
        if self.is_in_flight() {
            tracing::debug!(%match_id, "Backup skipped: upload in flight");
            return BackupTrigger::InFlight;
        }
        if !self.state.throttle.try_acquire().await {
            tracing::debug!(%match_id, "Backup skipped: throttled");
            return BackupTrigger::Throttled;
        }
        if self.state.in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!(%match_id, "Backup skipped: upload in flight");
            return BackupTrigger::InFlight;
        }
        let guard = InFlightGuard(Arc::clone(&self.state));

        let snapshot = match self.engine.export_match_data(match_id).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::warn!(%match_id, "Backup skipped: snapshot failed: {}", error);
                return BackupTrigger::ExportFailed;
            }
        };

        let index = Arc::clone(&self.index);
        let logs = self.logs.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            let game_number = snapshot.game.game_number;

            let upload_snapshot = async {
                match index.upload_snapshot(&snapshot).await {
                    Ok(key) => tracing::debug!(%key, "Continuous backup stored"),
                    Err(error) => tracing::warn!(%match_id, "Continuous backup failed: {}", error),
                }
            };
            let upload_logs = async {
                let pending = logs.pending();
                if pending.lines.is_empty() {
                    return;
                }
                match index
                    .append_logs(game_number, Some(match_id), &pending.lines)
                    .await
                {
                    Ok(_) => logs.acknowledge(&pending),
                    Err(error) => tracing::warn!(%match_id, "Log upload failed: {}", error),
                }
            };
            tokio::join!(upload_snapshot, upload_logs);
        });
        BackupTrigger::Started(handle)
    }
}
