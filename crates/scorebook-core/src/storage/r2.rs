//! Backup bucket on Cloudflare R2, spoken to through the S3 API.

use std::env;
use std::fmt;

use aws_credential_types::Credentials;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use chrono::DateTime;

use super::{normalize_object_key, ObjectInfo, ObjectStore, PutMode};
use crate::util::normalize_text_option;
use crate::{Error, Result};

/// Variables read by [`R2Config::from_env`], in field order
const R2_VARS: [&str; 4] = [
    "R2_ACCOUNT_ID",
    "R2_BUCKET",
    "R2_ACCESS_KEY_ID",
    "R2_SECRET_ACCESS_KEY",
];

#[derive(Clone, PartialEq, Eq)]
pub struct R2Config {
    pub account_id: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for R2Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("R2Config")
            .field("account_id", &self.account_id)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

impl R2Config {
    /// `Ok(None)` when none of the `R2_*` variables is set; an error naming
    /// the missing ones when only some are.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>> {
        let values = R2_VARS.map(|name| normalize_text_option(lookup(name)));
        if values.iter().all(Option::is_none) {
            return Ok(None);
        }

        let missing: Vec<&str> = R2_VARS
            .iter()
            .zip(&values)
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Backup bucket settings are incomplete, set {}",
                missing.join(", ")
            )));
        }

        let [account_id, bucket, access_key_id, secret_access_key] =
            values.map(Option::unwrap_or_default);
        Ok(Some(Self {
            account_id,
            bucket,
            access_key_id,
            secret_access_key,
        }))
    }

    /// Account-scoped S3 endpoint
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        format!("https://{}.r2.cloudflarestorage.com", self.account_id)
    }
}

#[derive(Clone, Debug)]
pub struct R2Storage {
    config: R2Config,
    client: Client,
}

impl R2Storage {
    #[must_use]
    pub fn new(config: R2Config) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "scorebook-backups",
        );
        let s3_config = aws_sdk_s3::config::Builder::new()
            .region(Region::new("auto"))
            .endpoint_url(config.endpoint_url())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &R2Config {
        &self.config
    }

    fn failure(&self, action: &str, key: &str, error: impl fmt::Display) -> Error {
        Error::Storage(format!(
            "{action} {}/{key} on R2 failed: {error}",
            self.config.bucket
        ))
    }
}

impl ObjectStore for R2Storage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
        mode: PutMode,
    ) -> Result<()> {
        let key = normalize_object_key(key)?;
        let content_type = content_type.map(str::trim).filter(|value| !value.is_empty());

        let result = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .set_content_type(content_type.map(str::to_string))
            .set_if_none_match((mode == PutMode::CreateOnly).then(|| "*".to_string()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(error)
                if error.code() == Some("PreconditionFailed")
                    || error
                        .raw_response()
                        .is_some_and(|response| response.status().as_u16() == 412) =>
            {
                Err(Error::AlreadyExists(key))
            }
            Err(error) => Err(self.failure("upload", &key, error)),
        }
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = normalize_object_key(key)?;

        let output = match self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(error)
                if error
                    .as_service_error()
                    .is_some_and(GetObjectError::is_no_such_key) =>
            {
                return Ok(None);
            }
            Err(error) => return Err(self.failure("download", &key, error)),
        };

        let body = output
            .body
            .collect()
            .await
            .map_err(|error| self.failure("read body of", &key, error))?;
        Ok(Some(body.into_bytes().to_vec()))
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let prefix = prefix.trim().trim_start_matches('/');
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.config.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|error| self.failure("list", prefix, error))?;

            objects.extend(page.contents().iter().filter_map(|object| {
                Some(ObjectInfo {
                    key: object.key()?.to_string(),
                    size: object
                        .size()
                        .and_then(|size| u64::try_from(size).ok())
                        .unwrap_or_default(),
                    last_modified: object.last_modified().and_then(|at| {
                        DateTime::from_timestamp(at.secs(), at.subsec_nanos())
                    }),
                })
            }));

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lookup<'a>(pairs: &'a [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_string())
        }
    }

    const FULL: [(&str, &str); 4] = [
        ("R2_ACCOUNT_ID", "acct-9"),
        ("R2_BUCKET", "scorebook-backups"),
        ("R2_ACCESS_KEY_ID", "key-id"),
        ("R2_SECRET_ACCESS_KEY", "very-secret"),
    ];

    #[test]
    fn unset_environment_means_no_bucket() {
        assert_eq!(R2Config::from_lookup(lookup(&[])).unwrap(), None);
    }

    #[test]
    fn partial_settings_name_what_is_missing() {
        let Err(Error::InvalidInput(message)) =
            R2Config::from_lookup(lookup(&[("R2_BUCKET", "b"), ("R2_ACCOUNT_ID", " ")]))
        else {
            panic!("expected an incomplete-settings error");
        };
        assert!(message.contains("R2_ACCOUNT_ID"));
        assert!(message.contains("R2_SECRET_ACCESS_KEY"));
        assert!(!message.contains("R2_BUCKET"));
    }

    #[test]
    fn complete_settings_build_the_endpoint_and_hide_the_secret() {
        let config = R2Config::from_lookup(lookup(&FULL)).unwrap().unwrap();
        assert_eq!(config.bucket, "scorebook-backups");
        assert_eq!(config.endpoint_url(), "https://acct-9.r2.cloudflarestorage.com");
        assert!(!format!("{config:?}").contains("very-secret"));
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "Requires local R2 env vars plus network access"]
    async fn create_only_upload_keeps_the_first_copy() {
        let _ = dotenvy::dotenv();
        let Some(config) = R2Config::from_env().unwrap() else {
            panic!("R2_* variables are not set");
        };
        let storage = R2Storage::new(config);
        let key = format!("integration/create-only-{}.txt", crate::util::unix_millis_now());

        storage
            .put_object(&key, b"first".to_vec(), Some("text/plain"), PutMode::CreateOnly)
            .await
            .unwrap();
        let second = storage
            .put_object(&key, b"second".to_vec(), Some("text/plain"), PutMode::CreateOnly)
            .await;
        assert!(matches!(second, Err(Error::AlreadyExists(_))));

        let listed = storage.list_objects("integration/").await.unwrap();
        assert!(listed.iter().any(|object| object.key == key));
        assert_eq!(storage.get_object(&key).await.unwrap().as_deref(), Some(&b"first"[..]));
    }
}
