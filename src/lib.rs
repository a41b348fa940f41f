//! clipfetch - video acquisition pipeline for chat bots
//!
//! Given a social-media URL, this library decides whether it is retrievable, runs an
//! ordered chain of retrieval strategies under a hard size ceiling, injects cached
//! cookies when a platform needs them, and hands back a local video file. Every
//! temporary directory, cookie file and partial download is removed on every exit path.

pub mod cli;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod extractors;
pub mod pipeline;
pub mod platform;
pub mod profile;
pub mod utils;
pub mod workspace;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use credentials::{CredentialCache, CredentialStore};
pub use errors::{ErrorKind, PipelineError, StrategyError};
pub use extractors::{AcquisitionStrategy, StrategyChain};
pub use pipeline::{AcquiredVideo, Request, VideoPipeline};
pub use platform::Platform;
pub use profile::{ProfileResolver, RetrievalProfile};
pub use workspace::{Artifact, Workspace};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;
