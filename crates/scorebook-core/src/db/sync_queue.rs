//! Local outbox of cloud mutations

use libsql::{Connection, Row, Value};
use serde_json::Value as Json;

use super::values::{self, json_column};
use crate::error::{Error, Result};
use crate::models::{SyncJob, SyncStatus};
use crate::util::iso_now;

/// Append-only queue of jobs for the cloud row-store
pub struct LibSqlSyncQueue<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSyncQueue<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_job(row: &Row) -> Result<SyncJob> {
        let status = values::text(row, 5)?;
        Ok(SyncJob {
            id: values::int(row, 0)?,
            resource: values::text(row, 1)?,
            action: values::text(row, 2)?,
            payload: values::json(row, 3)?,
            ts: values::text(row, 4)?,
            status: status.parse().map_err(Error::Database)?,
        })
    }

    /// Queue a job with status `queued`
    pub async fn enqueue(&self, resource: &str, action: &str, payload: &Json) -> Result<SyncJob> {
        let ts = iso_now();
        self.conn
            .execute(
                "INSERT INTO sync_queue (resource, action, payload, ts, status)
                 VALUES (?, ?, ?, ?, ?)",
                vec![
                    Value::Text(resource.to_string()),
                    Value::Text(action.to_string()),
                    json_column(payload)?,
                    Value::Text(ts.clone()),
                    Value::Text(SyncStatus::Queued.as_str().to_string()),
                ],
            )
            .await?;
        Ok(SyncJob {
            id: self.conn.last_insert_rowid(),
            resource: resource.to_string(),
            action: action.to_string(),
            payload: payload.clone(),
            ts,
            status: SyncStatus::Queued,
        })
    }

    /// Jobs in insertion order, optionally filtered by status
    pub async fn list(&self, status: Option<SyncStatus>) -> Result<Vec<SyncJob>> {
        let mut rows = match status {
            Some(status) => {
                self.conn
                    .query(
                        "SELECT id, resource, action, payload, ts, status FROM sync_queue
                         WHERE status = ? ORDER BY id",
                        vec![Value::Text(status.as_str().to_string())],
                    )
                    .await?
            }
            None => {
                self.conn
                    .query(
                        "SELECT id, resource, action, payload, ts, status FROM sync_queue ORDER BY id",
                        (),
                    )
                    .await?
            }
        };
        let mut jobs = Vec::new();
        while let Some(row) = rows.next().await? {
            jobs.push(Self::parse_job(&row)?);
        }
        Ok(jobs)
    }

    /// Record a delivery outcome; `false` when the job no longer exists
    pub async fn mark(&self, id: i64, status: SyncStatus) -> Result<bool> {
        let affected = self
            .conn
            .execute(
                "UPDATE sync_queue SET status = ? WHERE id = ?",
                vec![
                    Value::Text(status.as_str().to_string()),
                    Value::Integer(id),
                ],
            )
            .await?;
        Ok(affected > 0)
    }

    pub async fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM sync_queue", ()).await?;
        Ok(())
    }
}
