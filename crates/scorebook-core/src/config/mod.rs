//! Environment-driven runtime configuration.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use crate::backup::EngineConfig;
use crate::cloud::{SupabaseConfig, SupabaseRowStore, DEFAULT_SPORT_TYPE};
use crate::storage::{FsObjectStore, ObjectStoreBackend, R2Config, R2Storage};
use crate::util::normalize_text_option;
use crate::{Error, Result};

const ENV_DB_PATH: &str = "SCOREBOOK_DB_PATH";
const ENV_BACKUP_DIR: &str = "SCOREBOOK_BACKUP_DIR";
const ENV_SPORT_TYPE: &str = "SCOREBOOK_SPORT_TYPE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Local database file; the caller picks a default when unset
    pub db_path: Option<PathBuf>,
    /// Directory used as the object store when R2 is not configured
    pub backup_dir: Option<PathBuf>,
    pub sport_type: String,
    pub r2: Option<R2Config>,
    pub supabase: Option<SupabaseConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = normalize_text_option(lookup(ENV_DB_PATH)).map(PathBuf::from);
        let backup_dir = normalize_text_option(lookup(ENV_BACKUP_DIR)).map(PathBuf::from);
        let sport_type = normalize_text_option(lookup(ENV_SPORT_TYPE))
            .unwrap_or_else(|| DEFAULT_SPORT_TYPE.to_string());

        Ok(Self {
            db_path,
            backup_dir,
            sport_type,
            r2: R2Config::from_lookup(&lookup)?,
            supabase: SupabaseConfig::from_lookup(&lookup)?,
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            sport_type: self.sport_type.clone(),
        }
    }

    /// R2 when configured, otherwise the local backup directory
    pub fn object_store(&self) -> Result<ObjectStoreBackend> {
        if let Some(r2) = &self.r2 {
            return Ok(ObjectStoreBackend::R2(R2Storage::new(r2.clone())));
        }
        if let Some(dir) = &self.backup_dir {
            return Ok(ObjectStoreBackend::Fs(FsObjectStore::new(dir)));
        }
        Err(Error::InvalidInput(format!(
            "No backup storage configured. Set the R2_* variables or {ENV_BACKUP_DIR}"
        )))
    }

    pub fn row_store(&self) -> Result<SupabaseRowStore> {
        let config = self.supabase.as_ref().ok_or_else(|| {
            Error::InvalidInput(
                "Cloud database not configured. Set SUPABASE_URL and SUPABASE_ANON_KEY".to_string(),
            )
        })?;
        Ok(SupabaseRowStore::new(config)?.with_sport_type(self.sport_type.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_string())
        }
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.db_path, None);
        assert_eq!(config.sport_type, DEFAULT_SPORT_TYPE);
        assert!(config.r2.is_none());
        assert!(config.supabase.is_none());
        assert!(matches!(config.object_store(), Err(Error::InvalidInput(_))));
        assert!(matches!(config.row_store(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn backup_dir_selects_the_filesystem_store() {
        let config = AppConfig::from_lookup(lookup(&[
            ("SCOREBOOK_BACKUP_DIR", " /tmp/scorebook-backups "),
            ("SCOREBOOK_SPORT_TYPE", "indoor"),
        ]))
        .unwrap();

        assert_eq!(config.sport_type, "indoor");
        assert_eq!(config.engine_config().sport_type, "indoor");
        assert_eq!(config.object_store().unwrap().label(), "filesystem");
    }

    #[test]
    fn r2_wins_over_the_backup_dir() {
        let config = AppConfig::from_lookup(lookup(&[
            ("SCOREBOOK_BACKUP_DIR", "/tmp/scorebook-backups"),
            ("R2_ACCOUNT_ID", "account"),
            ("R2_BUCKET", "bucket"),
            ("R2_ACCESS_KEY_ID", "key"),
            ("R2_SECRET_ACCESS_KEY", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.object_store().unwrap().label(), "r2");
    }

    #[test]
    fn partial_cloud_configuration_is_rejected() {
        let result = AppConfig::from_lookup(lookup(&[("R2_BUCKET", "bucket")]));
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        let result = AppConfig::from_lookup(lookup(&[("SUPABASE_URL", "https://x.supabase.co")]));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
