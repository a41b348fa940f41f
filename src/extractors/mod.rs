use async_trait::async_trait;
use std::path::PathBuf;

pub mod download;
pub mod local;
pub mod remote;

pub use local::LocalExtractorStrategy;
pub use remote::RemoteResolverStrategy;

use crate::errors::{self, PipelineError, StrategyError};
use crate::pipeline::Request;
use crate::profile::RetrievalProfile;
use crate::workspace::{Artifact, Workspace};

/// One concrete way of retrieving a video file for a URL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    /// Name of the strategy (for logging)
    fn name(&self) -> &'static str;

    /// Produce a file inside `workspace`. Size is verified by the chain afterwards.
    async fn acquire(
        &self,
        request: &Request,
        profile: &RetrievalProfile,
        workspace: &Workspace,
    ) -> Result<PathBuf, StrategyError>;
}

/// Ordered list of strategies, tried strictly in sequence until one yields an artifact
pub struct StrategyChain {
    strategies: Vec<Box<dyn AcquisitionStrategy>>,
}

impl StrategyChain {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Append a strategy; earlier registrations get the first chance
    pub fn register(&mut self, strategy: Box<dyn AcquisitionStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn with(mut self, strategy: Box<dyn AcquisitionStrategy>) -> Self {
        self.register(strategy);
        self
    }

    /// Names of registered strategies in execution order
    pub fn list_strategies(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the chain. Each strategy runs at most once; individual failures only
    /// trigger the next strategy, and the last failure is classified once the
    /// chain is exhausted.
    pub async fn acquire(
        &self,
        request: &Request,
        profile: &RetrievalProfile,
        workspace: &Workspace,
    ) -> Result<Artifact, PipelineError> {
        let mut last_error: Option<StrategyError> = None;

        for strategy in &self.strategies {
            tracing::debug!(strategy = strategy.name(), "Trying strategy");

            let outcome = match strategy.acquire(request, profile, workspace).await {
                Ok(path) => workspace.admit(&path, profile.max_size_bytes),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(artifact) => {
                    tracing::info!(
                        strategy = strategy.name(),
                        size_bytes = artifact.size_bytes,
                        "Strategy produced artifact"
                    );
                    return Ok(artifact);
                }
                Err(e) => {
                    tracing::warn!(strategy = strategy.name(), error = %e, "Strategy failed, falling through");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(errors::classify(&e)),
            None => Err(PipelineError::Internal("no acquisition strategies configured".to_string())),
        }
    }
}

impl Default for StrategyChain {
    fn default() -> Self {
        Self::new()
    }
}
