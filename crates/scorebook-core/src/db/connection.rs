//! The on-device libSQL store

use std::path::Path;

use libsql::{Builder, Connection};

use super::migrations;
use crate::error::Result;

const IN_MEMORY: &str = ":memory:";

/// Pragmas applied to every connection. Failures on the optional ones are
/// tolerated because `:memory:` rejects WAL.
const PRAGMAS: [(&str, bool); 4] = [
    ("PRAGMA journal_mode = WAL;", false),
    ("PRAGMA synchronous = NORMAL;", false),
    ("PRAGMA foreign_keys = ON;", true),
    ("PRAGMA busy_timeout = 5000;", false),
];

pub struct Database {
    conn: Connection,
    path: Option<String>,
}

impl Database {
    /// Opens (or creates) the store at `path` and brings its schema up to date.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let target = path.as_ref().to_string_lossy().into_owned();
        Self::connect(&target, Some(target.clone())).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        Self::connect(IN_MEMORY, None).await
    }

    async fn connect(target: &str, path: Option<String>) -> Result<Self> {
        let conn = Builder::new_local(target).build().await?.connect()?;
        for (pragma, required) in PRAGMAS {
            let applied = conn.execute(pragma, ()).await;
            if required {
                applied?;
            }
        }
        migrations::run(&conn).await?;
        Ok(Self { conn, path })
    }

    /// `None` for in-memory stores
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn memory_store_has_no_path() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(db.path().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn file_store_survives_reopening() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("device.db");

        {
            let db = Database::open(&file).await.unwrap();
            assert_eq!(db.path(), Some(file.to_string_lossy().as_ref()));
            db.connection()
                .execute("INSERT INTO settings (key, value) VALUES ('device', 'tablet')", ())
                .await
                .unwrap();
        }

        let reopened = Database::open(&file).await.unwrap();
        let mut rows = reopened
            .connection()
            .query("SELECT value FROM settings WHERE key = 'device'", ())
            .await
            .unwrap();
        let stored: String = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(stored, "tablet");
    }
}
