use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use super::download::download_capped;
use super::AcquisitionStrategy;
use crate::config::ResolverConfig;
use crate::errors::StrategyError;
use crate::pipeline::Request;
use crate::profile::RetrievalProfile;
use crate::workspace::Workspace;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolveRequest<'a> {
    url: &'a str,
    video_quality: &'a str,
    is_audio_only: bool,
}

#[derive(Debug, Deserialize)]
struct ResolveResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    filename: Option<String>,
}

/// Delegates URL resolution to an external HTTP service, then streams the returned
/// direct media URL into the workspace under the size ceiling.
///
/// Platform-agnostic and best-effort: every failure is a soft failure that sends the
/// chain on to the next strategy.
pub struct RemoteResolverStrategy {
    client: Client,
    media_client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl RemoteResolverStrategy {
    pub fn new(endpoint: impl Into<String>, config: &ResolverConfig) -> crate::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build resolver HTTP client")?;

        // The media body can take far longer than the resolver call
        let media_client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .build()
            .context("Failed to build media download HTTP client")?;

        Ok(Self {
            client,
            media_client,
            endpoint: endpoint.into(),
            api_key: config.api_key.clone(),
        })
    }

    /// Ask the resolver for a direct media URL
    async fn resolve_media_url(&self, request: &Request, profile: &RetrievalProfile) -> Result<Url, StrategyError> {
        let body = ResolveRequest {
            url: &request.url,
            video_quality: &profile.video_quality,
            is_audio_only: false,
        };

        let mut call = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            call = call.header("Authorization", format!("Api-Key {}", key));
        }

        let response = call.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StrategyError::Http {
                status: status.as_u16(),
            });
        }

        let payload: ResolveResponse = response
            .json()
            .await
            .map_err(|e| StrategyError::Malformed(e.to_string()))?;

        if payload.status.as_deref() == Some("error") {
            return Err(StrategyError::Malformed("resolver reported an error".to_string()));
        }

        let media_url = payload
            .url
            .ok_or_else(|| StrategyError::Malformed("response has no media url".to_string()))?;
        let parsed = Url::parse(&media_url).map_err(|e| StrategyError::Malformed(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(StrategyError::Malformed(format!("unexpected media url scheme: {}", parsed.scheme())));
        }

        tracing::debug!(
            status = payload.status.as_deref().unwrap_or("-"),
            filename = payload.filename.as_deref().unwrap_or("-"),
            "Resolver returned media url"
        );
        Ok(parsed)
    }
}

#[async_trait]
impl AcquisitionStrategy for RemoteResolverStrategy {
    fn name(&self) -> &'static str {
        "remote-resolver"
    }

    async fn acquire(
        &self,
        request: &Request,
        profile: &RetrievalProfile,
        workspace: &Workspace,
    ) -> Result<PathBuf, StrategyError> {
        let media_url = self.resolve_media_url(request, profile).await?;
        let dest = workspace.path().join("remote.mp4");

        let written = download_capped(
            &self.media_client,
            media_url.as_str(),
            &profile.http_headers,
            &dest,
            profile.max_size_bytes,
        )
        .await?;

        tracing::debug!(bytes = written, "Remote download complete");
        Ok(dest)
    }
}
