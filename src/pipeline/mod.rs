use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{Config, CredentialsConfig};
use crate::credentials::{CredentialCache, CredentialStore, RestCredentialStore, StaticCredentialStore};
use crate::errors::PipelineError;
use crate::extractors::{LocalExtractorStrategy, RemoteResolverStrategy, StrategyChain};
use crate::platform::{self, Platform};
use crate::profile::ProfileResolver;
use crate::workspace::{Artifact, Workspace};
use crate::Result;

/// One incoming acquisition command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub id: Uuid,
}

impl Request {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            id: Uuid::new_v4(),
        }
    }
}

/// A video materialized on local disk.
///
/// The file lives inside the request's workspace and stays valid until the value is
/// released or dropped, whichever comes first.
#[derive(Debug)]
pub struct AcquiredVideo {
    request: Request,
    platform: Platform,
    artifact: Artifact,
    workspace: Workspace,
}

impl AcquiredVideo {
    pub fn path(&self) -> &Path {
        &self.artifact.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.artifact.size_bytes
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Signal that the caller is done with the file and delete the workspace
    pub async fn release(self) -> io::Result<()> {
        let request_id = self.request.id;
        close_workspace(self.workspace).await?;
        tracing::debug!(request_id = %request_id, "Released workspace");
        Ok(())
    }
}

// Directory creation and recursive removal go through the blocking pool. A
// cancelled request still removes its workspace synchronously in `Drop`.
async fn create_workspace(root: Option<PathBuf>, request_id: Uuid) -> io::Result<Workspace> {
    tokio::task::spawn_blocking(move || Workspace::create(root.as_deref(), &request_id))
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

async fn close_workspace(workspace: Workspace) -> io::Result<()> {
    tokio::task::spawn_blocking(move || workspace.close())
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

/// Classify, resolve a profile, run the strategy chain in a fresh workspace and hand
/// back the artifact.
pub struct VideoPipeline {
    profiles: ProfileResolver,
    chain: StrategyChain,
    workspace_root: Option<PathBuf>,
}

impl VideoPipeline {
    pub fn new(profiles: ProfileResolver, chain: StrategyChain, workspace_root: Option<PathBuf>) -> Self {
        Self {
            profiles,
            chain,
            workspace_root,
        }
    }

    /// Build the full pipeline from configuration: the remote resolver when an
    /// endpoint is configured, then the local extractor with credential injection.
    pub fn from_config(config: &Config) -> Result<Self> {
        let profiles = ProfileResolver::new(config.pipeline.max_size_bytes, config.resolver.video_quality.clone());

        let mut chain = StrategyChain::new();
        if let Some(endpoint) = &config.resolver.endpoint {
            chain.register(Box::new(RemoteResolverStrategy::new(endpoint.clone(), &config.resolver)?));
        }

        let mut local = LocalExtractorStrategy::new(&config.extractor);
        if let Some(cache) = credential_cache(&config.credentials)? {
            local = local.with_credentials(cache, config.credentials.scope.clone());
        }
        chain.register(Box::new(local));

        tracing::debug!(strategies = ?chain.list_strategies(), "Built acquisition chain");
        Ok(Self::new(profiles, chain, config.pipeline.workspace_root.clone()))
    }

    pub fn strategies(&self) -> Vec<&'static str> {
        self.chain.list_strategies()
    }

    /// Acquire the video behind `url`.
    ///
    /// On success the caller owns the returned [`AcquiredVideo`] and must release or
    /// drop it. On failure nothing is left on disk.
    pub async fn acquire_video(&self, url: &str) -> std::result::Result<AcquiredVideo, PipelineError> {
        let (platform, supported) = platform::classify(url);
        let parsed = match platform::parse_input(url) {
            Some(parsed) => parsed,
            None => {
                tracing::info!("Rejected input that is not a URL");
                return Err(PipelineError::InvalidUrl(url.trim().to_string()));
            }
        };
        if !supported {
            tracing::info!(host = parsed.host_str().unwrap_or_default(), "Rejected unsupported URL");
            return Err(PipelineError::Unsupported(parsed.host_str().unwrap_or_default().to_string()));
        }

        let request = Request::new(parsed.as_str());
        let span = tracing::info_span!("acquire", request_id = %request.id, platform = %platform);

        self.run(request, platform).instrument(span).await
    }

    async fn run(&self, request: Request, platform: Platform) -> std::result::Result<AcquiredVideo, PipelineError> {
        let profile = self.profiles.resolve(platform);
        let workspace = create_workspace(self.workspace_root.clone(), request.id)
            .await
            .map_err(|e| PipelineError::Internal(format!("failed to create workspace: {}", e)))?;

        tracing::info!(needs_credential = profile.needs_credential, "Starting acquisition");

        let artifact = match self.chain.acquire(&request, &profile, &workspace).await {
            Ok(artifact) => artifact,
            Err(e) => {
                if let Err(close_err) = close_workspace(workspace).await {
                    tracing::warn!(error = %close_err, "Failed to remove workspace");
                }
                return Err(e);
            }
        };

        tracing::info!(size_bytes = artifact.size_bytes, "Acquired video");
        Ok(AcquiredVideo {
            request,
            platform,
            artifact,
            workspace,
        })
    }

    /// Acquire, hand the file path to `consume`, then release the workspace.
    ///
    /// The workspace is removed after `consume` finishes, whether it succeeded or not.
    pub async fn with_video<F, Fut, T>(&self, url: &str, consume: F) -> std::result::Result<T, PipelineError>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = T>,
    {
        let video = self.acquire_video(url).await?;
        let output = consume(video.path().to_path_buf()).await;

        if let Err(e) = video.release().await {
            tracing::warn!(error = %e, "Failed to remove workspace");
        }
        Ok(output)
    }
}

/// Pick the credential source: REST store, then inline cookies, else none
fn credential_cache(config: &CredentialsConfig) -> Result<Option<Arc<CredentialCache>>> {
    let store: Arc<dyn CredentialStore> = match (&config.store, &config.inline_cookies) {
        (Some(store), _) => Arc::new(RestCredentialStore::new(store)?),
        (None, Some(cookies)) => Arc::new(StaticCredentialStore::new(cookies.clone())),
        (None, None) => {
            tracing::debug!("No credential source configured");
            return Ok(None);
        }
    };

    tracing::debug!(store = store.name(), scope = %config.scope, "Using credential store");
    Ok(Some(Arc::new(CredentialCache::new(
        store,
        Duration::from_secs(config.ttl_secs),
    ))))
}
