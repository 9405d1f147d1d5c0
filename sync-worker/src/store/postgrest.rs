//! Supabase / PostgREST user store over HTTP.
//!
//! Rows are addressed with a `user_id=eq.<id>` filter on the configured table.
//! The service role key is sent both as `apikey` and as a bearer token.
//! Lookups and updates only read back `user_id,updated_at`, so rows with
//! nulls in other columns never fail to decode.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, info};
use url::Url;

use super::{StoreError, UserStore};
use crate::sync::record::SNAPSHOT_COLUMNS;
use crate::sync::{UserRecord, UserSnapshot, UserUpdate};
use crate::Config;

/// Longest slice of an error body kept in a `StoreError`.
const MAX_ERROR_BODY: usize = 512;

#[derive(Clone)]
pub struct PostgrestStore {
    client: Client,
    table_url: Url,
    service_key: String,
}

impl PostgrestStore {
    pub fn new(base_url: &str, service_key: String, table: &str, timeout: Duration) -> Result<Self> {
        let table_url = table_url(base_url, table)?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        info!(table_url = %table_url, timeout_ms = timeout.as_millis() as u64, "postgrest_store_created");

        Ok(Self {
            client,
            table_url,
            service_key,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let base_url = config
            .supabase_url
            .as_deref()
            .context("SUPABASE_URL is required for the postgrest store")?;
        let service_key = config
            .supabase_service_key
            .clone()
            .context("SUPABASE_SERVICE_ROLE_KEY is required for the postgrest store")?;

        Self::new(
            base_url,
            service_key,
            &config.users_table,
            Duration::from_millis(config.store_timeout_ms),
        )
    }

    fn filter(external_user_id: &str) -> [(&'static str, String); 1] {
        [("user_id", format!("eq.{external_user_id}"))]
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }
}

/// `{base}/rest/v1/{table}`, tolerating a missing trailing slash on `base`.
fn table_url(base_url: &str, table: &str) -> Result<Url> {
    if table.is_empty() || table.contains('/') {
        bail!("invalid table name: {table:?}");
    }

    let mut base = Url::parse(base_url).with_context(|| format!("Invalid store URL: {base_url}"))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    base.join(&format!("rest/v1/{table}"))
        .context("Failed to build table URL")
}

/// Status line plus the start of the body, for error messages.
async fn describe_failure(response: Response) -> String {
    let status = response.status();
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    format!("status {status}: {body}")
}

#[async_trait]
impl UserStore for PostgrestStore {
    async fn find_by_external_id(
        &self,
        external_user_id: &str,
    ) -> Result<Option<UserSnapshot>, StoreError> {
        let response = self
            .authed(self.client.get(self.table_url.clone()))
            .query(&Self::filter(external_user_id))
            .query(&[("select", SNAPSHOT_COLUMNS), ("limit", "1")])
            .send()
            .await
            .map_err(|e| StoreError::Lookup(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Lookup(describe_failure(response).await));
        }

        let rows: Vec<UserSnapshot> = response
            .json()
            .await
            .map_err(|e| StoreError::Lookup(format!("decode: {e}")))?;

        debug!(user_id = %external_user_id, found = !rows.is_empty(), "postgrest_lookup_complete");

        Ok(rows.into_iter().next())
    }

    async fn insert(&self, record: &UserRecord) -> Result<(), StoreError> {
        let response = self
            .authed(self.client.post(self.table_url.clone()))
            .header("Prefer", "return=minimal")
            .json(&[record])
            .send()
            .await
            .map_err(|e| StoreError::Insert(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(StoreError::Conflict(record.user_id.clone())),
            _ => Err(StoreError::Insert(describe_failure(response).await)),
        }
    }

    async fn update(&self, external_user_id: &str, update: &UserUpdate) -> Result<(), StoreError> {
        let response = self
            .authed(self.client.patch(self.table_url.clone()))
            .query(&Self::filter(external_user_id))
            .query(&[("select", SNAPSHOT_COLUMNS)])
            .header("Prefer", "return=representation")
            .json(update)
            .send()
            .await
            .map_err(|e| StoreError::Update(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Update(describe_failure(response).await));
        }

        // A filter that matched nothing is still a 200, with an empty array.
        let rows: Vec<UserSnapshot> = response
            .json()
            .await
            .map_err(|e| StoreError::Update(format!("decode: {e}")))?;
        if rows.is_empty() {
            return Err(StoreError::NotFound(external_user_id.to_string()));
        }

        debug!(user_id = %external_user_id, rows = rows.len(), "postgrest_update_complete");
        Ok(())
    }
}
