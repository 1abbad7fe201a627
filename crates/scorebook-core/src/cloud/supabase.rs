//! Supabase (PostgREST) row-store.

use std::env;

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::row_store::CloudRowStore;
use super::rows::{CloudEventRow, CloudMatchBundle, CloudMatchRow, CloudSetRow, LiveStateRow, RestorePayload};
use super::DEFAULT_SPORT_TYPE;
use crate::error::{Error, Result};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const ENV_URL: &str = "SUPABASE_URL";
const ENV_ANON_KEY: &str = "SUPABASE_ANON_KEY";

const MATCHES: &str = "matches";
const SETS: &str = "sets";
const EVENTS: &str = "events";
const LIVE_STATE: &str = "match_live_state";

const UPSERT_PREFERENCE: &str = "resolution=merge-duplicates,return=representation";

/// Supabase project endpoint and public key
#[derive(Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("anon_key", &"[REDACTED]")
            .finish()
    }
}

impl SupabaseConfig {
    /// Load from `SUPABASE_URL` / `SUPABASE_ANON_KEY`.
    ///
    /// `Ok(None)` when neither is set; an error when only one is.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>> {
        let url = normalize_text_option(lookup(ENV_URL));
        let anon_key = normalize_text_option(lookup(ENV_ANON_KEY));

        match (url, anon_key) {
            (None, None) => Ok(None),
            (Some(url), Some(anon_key)) => {
                if !is_http_url(&url) {
                    return Err(Error::InvalidInput(format!(
                        "{ENV_URL} must include http:// or https://"
                    )));
                }
                Ok(Some(Self { url, anon_key }))
            }
            (None, Some(_)) => Err(Error::InvalidInput(format!(
                "Supabase configuration is incomplete. Missing: {ENV_URL}"
            ))),
            (Some(_), None) => Err(Error::InvalidInput(format!(
                "Supabase configuration is incomplete. Missing: {ENV_ANON_KEY}"
            ))),
        }
    }

    /// PostgREST base URL
    #[must_use]
    pub fn rest_url(&self) -> String {
        let trimmed = self.url.trim().trim_end_matches('/');
        if trimmed.ends_with("/rest/v1") {
            trimmed.to_string()
        } else {
            format!("{trimmed}/rest/v1")
        }
    }
}

/// Row store backed by the Supabase REST API
#[derive(Clone)]
pub struct SupabaseRowStore {
    rest_url: String,
    anon_key: String,
    sport_type: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: Value,
}

impl SupabaseRowStore {
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        Ok(Self {
            rest_url: config.rest_url(),
            anon_key: config.anon_key.clone(),
            sport_type: DEFAULT_SPORT_TYPE.to_string(),
            client: Client::builder().build()?,
        })
    }

    #[must_use]
    pub fn with_sport_type(mut self, sport_type: impl Into<String>) -> Self {
        self.sport_type = sport_type.into();
        self
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{table}", self.rest_url))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> Result<reqwest::Response> {
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network(format!(
                "Supabase {operation} failed ({status}): {}",
                compact_text(&body)
            )));
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<T> {
        Ok(self.send(request, operation).await?.json::<T>().await?)
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, match_id: &str) -> Result<Vec<T>> {
        let request = self
            .request(Method::GET, table)
            .query(&[("select", "*".to_string()), ("match_id", format!("eq.{match_id}"))]);
        self.send_json(request, &format!("select {table}")).await
    }

    async fn upsert_children<T: serde::Serialize>(
        &self,
        table: &str,
        conflict: &str,
        match_id: &Value,
        rows: &[T],
    ) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let rows = rows
            .iter()
            .map(|row| -> Result<Value> {
                let mut value = serde_json::to_value(row)?;
                if let Value::Object(columns) = &mut value {
                    columns.insert("match_id".to_string(), match_id.clone());
                }
                Ok(value)
            })
            .collect::<Result<Vec<_>>>()?;
        let request = self
            .request(Method::POST, table)
            .query(&[("on_conflict", conflict)])
            .header("Prefer", UPSERT_PREFERENCE)
            .json(&rows);
        self.send(request, &format!("upsert {table}")).await?;
        Ok(())
    }
}

/// Render a row id for a PostgREST `eq.` filter
fn filter_value(id: &Value) -> String {
    match id {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

impl CloudRowStore for SupabaseRowStore {
    async fn apply_restore(&self, payload: &RestorePayload) -> Result<()> {
        let external_id = payload
            .external_id()
            .ok_or_else(|| Error::Validation("restore payload has no external_id".to_string()))?;
        payload.ensure_unique_child_keys()?;

        let existing: Vec<IdRow> = self
            .send_json(
                self.request(Method::GET, MATCHES).query(&[
                    ("select", "id".to_string()),
                    ("external_id", format!("eq.{external_id}")),
                ]),
                "find match",
            )
            .await?;
        if let Some(row) = existing.first() {
            let filter = format!("eq.{}", filter_value(&row.id));
            for table in [EVENTS, SETS] {
                let request = self
                    .request(Method::DELETE, table)
                    .query(&[("match_id", filter.as_str())]);
                self.send(request, &format!("delete {table}")).await?;
            }
        }

        let upserted: Vec<IdRow> = self
            .send_json(
                self.request(Method::POST, MATCHES)
                    .query(&[("on_conflict", "external_id")])
                    .header("Prefer", UPSERT_PREFERENCE)
                    .json(&payload.game),
                "upsert match",
            )
            .await?;
        let match_id = upserted
            .into_iter()
            .next()
            .map(|row| row.id)
            .ok_or_else(|| Error::Network("Supabase upsert match returned no row".to_string()))?;

        self.upsert_children(SETS, "external_id", &match_id, &payload.sets)
            .await?;
        self.upsert_children(EVENTS, "external_id", &match_id, &payload.events)
            .await?;
        self.upsert_children(
            LIVE_STATE,
            "match_id",
            &match_id,
            std::slice::from_ref(&payload.live_state),
        )
        .await?;

        tracing::info!(%external_id, sets = payload.sets.len(), events = payload.events.len(), "Restore applied to Supabase");
        Ok(())
    }

    async fn fetch_match_bundle(
        &self,
        pin: &str,
        game_number: Option<i64>,
    ) -> Result<Option<CloudMatchBundle>> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("game_pin", format!("eq.{pin}")),
            ("sport_type", format!("eq.{}", self.sport_type)),
        ];
        if let Some(number) = game_number {
            query.push(("game_n", format!("eq.{number}")));
        }
        let rows: Vec<CloudMatchRow> = self
            .send_json(self.request(Method::GET, MATCHES).query(&query), "find match by PIN")
            .await?;
        if rows.len() > 1 {
            return Err(Error::InvalidInput(format!(
                "More than one match uses PIN {pin}; pass a game number"
            )));
        }
        let Some(game) = rows.into_iter().next() else {
            return Ok(None);
        };
        let match_id = game
            .column("id")
            .map(filter_value)
            .ok_or_else(|| Error::Network("Supabase match row has no id".to_string()))?;

        let (sets, events, live_state) = tokio::try_join!(
            self.select::<CloudSetRow>(SETS, &match_id),
            self.select::<CloudEventRow>(EVENTS, &match_id),
            self.select::<LiveStateRow>(LIVE_STATE, &match_id),
        )?;
        tracing::info!(
            %match_id,
            sets = sets.len(),
            events = events.len(),
            has_live_state = !live_state.is_empty(),
            "Fetched match from Supabase"
        );

        Ok(Some(CloudMatchBundle {
            game,
            sets,
            events,
            live_state: live_state.into_iter().next(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use serde_json::json;

    fn parse(map: &HashMap<&str, &str>) -> Result<Option<SupabaseConfig>> {
        SupabaseConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn config_absent_is_none() {
        assert!(parse(&HashMap::new()).unwrap().is_none());
    }

    #[test]
    fn config_requires_both_values() {
        let map = HashMap::from([(ENV_URL, "https://abc.supabase.co")]);
        match parse(&map).unwrap_err() {
            Error::InvalidInput(message) => assert!(message.contains(ENV_ANON_KEY)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn config_rejects_non_http_url() {
        let map = HashMap::from([(ENV_URL, "abc.supabase.co"), (ENV_ANON_KEY, "key")]);
        assert!(matches!(parse(&map), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn rest_url_appends_rest_path_once() {
        let config = SupabaseConfig {
            url: "https://abc.supabase.co/".to_string(),
            anon_key: "key".to_string(),
        };
        assert_eq!(config.rest_url(), "https://abc.supabase.co/rest/v1");

        let config = SupabaseConfig {
            url: "https://abc.supabase.co/rest/v1".to_string(),
            anon_key: "key".to_string(),
        };
        assert_eq!(config.rest_url(), "https://abc.supabase.co/rest/v1");
    }

    #[test]
    fn debug_redacts_anon_key() {
        let config = SupabaseConfig {
            url: "https://abc.supabase.co".to_string(),
            anon_key: "secret-key".to_string(),
        };
        assert!(!format!("{config:?}").contains("secret-key"));
    }

    #[test]
    fn filter_values_render_without_quotes() {
        assert_eq!(filter_value(&json!("5f0c")), "5f0c");
        assert_eq!(filter_value(&json!(42)), "42");
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "Requires SUPABASE_URL / SUPABASE_ANON_KEY plus network access"]
    async fn fetch_unknown_pin_returns_none() {
        let _ = dotenvy::dotenv();
        let config = SupabaseConfig::from_env()
            .expect("Supabase env parsing should not error")
            .expect("Supabase config should be present");
        let store = SupabaseRowStore::new(&config).unwrap();

        let bundle = store.fetch_match_bundle("000000000", Some(999_999)).await.unwrap();
        assert!(bundle.is_none());
    }
}
