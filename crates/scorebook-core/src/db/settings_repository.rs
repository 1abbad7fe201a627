//! Device-local key/value settings

use crate::error::Result;
use libsql::Connection;

/// Key holding this device's session identity
pub const SESSION_ID_KEY: &str = "device.session_id";

/// Per-device settings, one string value per key
#[allow(async_fn_in_trait)]
pub trait SettingsRepository {
    /// Read one setting
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write one setting, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove one setting
    async fn remove(&self, key: &str) -> Result<()>;
}

pub struct LibSqlSettingsRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSettingsRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SettingsRepository for LibSqlSettingsRepository<'_> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM settings WHERE key = ?1", [key])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<String>(0)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                [key, value],
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM settings WHERE key = ?1", [key])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn store() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_keys_read_as_none() {
        let db = store().await;
        let repo = LibSqlSettingsRepository::new(db.connection());

        assert_eq!(repo.get(SESSION_ID_KEY).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn later_writes_replace_and_remove_clears() {
        let db = store().await;
        let repo = LibSqlSettingsRepository::new(db.connection());

        repo.set(SESSION_ID_KEY, "a-b-c").await.unwrap();
        repo.set(SESSION_ID_KEY, "d-e-f").await.unwrap();
        assert_eq!(
            repo.get(SESSION_ID_KEY).await.unwrap().as_deref(),
            Some("d-e-f")
        );

        repo.remove(SESSION_ID_KEY).await.unwrap();
        assert_eq!(repo.get(SESSION_ID_KEY).await.unwrap(), None);
    }
}
