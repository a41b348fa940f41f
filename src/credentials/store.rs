use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::Duration;

use super::CredentialStore;
use crate::config::StoreConfig;
use crate::Result;

/// Credential store backed by a PostgREST table (Supabase-style REST API).
///
/// One row per scope: `key_column` holds the scope name, `data_column` the cookie jar.
pub struct RestCredentialStore {
    client: Client,
    base_url: String,
    api_key: String,
    table: String,
    key_column: String,
    data_column: String,
}

impl RestCredentialStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build credential store HTTP client")?;

        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &StoreConfig) -> Self {
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            table: config.table.clone(),
            key_column: config.key_column.clone(),
            data_column: config.data_column.clone(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    /// Insert or overwrite the row for `scope`
    pub async fn upsert(&self, scope: &str, payload: &str) -> Result<()> {
        let mut row = Map::new();
        row.insert(self.key_column.clone(), Value::String(scope.to_string()));
        row.insert(self.data_column.clone(), Value::String(payload.to_string()));

        let response = self
            .client
            .post(self.table_url())
            .query(&[("on_conflict", self.key_column.as_str())])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&vec![Value::Object(row)])
            .send()
            .await
            .context("Failed to reach credential store")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Credential store rejected upsert: HTTP {} {}", status, body.trim());
        }

        tracing::info!(scope, bytes = payload.len(), "Uploaded credential");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for RestCredentialStore {
    async fn fetch(&self, scope: &str) -> Result<Option<String>> {
        let filter = format!("eq.{}", scope);
        let response = self
            .client
            .get(self.table_url())
            .query(&[
                ("select", self.data_column.as_str()),
                (self.key_column.as_str(), filter.as_str()),
                ("limit", "1"),
            ])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to reach credential store")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Credential store returned HTTP {}", status);
        }

        let rows: Vec<Map<String, Value>> = response
            .json()
            .await
            .context("Credential store returned an unexpected payload")?;

        let payload = rows
            .into_iter()
            .next()
            .and_then(|mut row| row.remove(&self.data_column))
            .and_then(|value| match value {
                Value::String(text) if !text.trim().is_empty() => Some(text),
                _ => None,
            });

        Ok(payload)
    }

    fn name(&self) -> &'static str {
        "rest"
    }
}

/// Store that serves one fixed cookie jar for every scope (e.g. from `COOKIES`)
pub struct StaticCredentialStore {
    payload: String,
}

impl StaticCredentialStore {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn fetch(&self, _scope: &str) -> Result<Option<String>> {
        if self.payload.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(self.payload.clone()))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
