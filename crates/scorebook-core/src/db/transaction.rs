//! Explicit transaction boundaries over a single connection

use libsql::Connection;

use crate::error::Result;

/// Start a write transaction.
///
/// `IMMEDIATE` takes the write lock up front so a later statement cannot fail
/// with `SQLITE_BUSY` half way through.
pub async fn begin(conn: &Connection) -> Result<()> {
    conn.execute("BEGIN IMMEDIATE", ()).await?;
    Ok(())
}

/// Commit on success, roll back on failure, and hand the result back.
pub async fn finish<T>(conn: &Connection, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            if let Err(error) = conn.execute("COMMIT", ()).await {
                conn.execute("ROLLBACK", ()).await.ok();
                return Err(error.into());
            }
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = conn.execute("ROLLBACK", ()).await {
                tracing::warn!("Rollback after failed transaction also failed: {rollback_error}");
            }
            Err(error)
        }
    }
}
