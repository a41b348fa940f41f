use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

use super::AcquisitionStrategy;
use crate::config::ExtractorConfig;
use crate::credentials::CredentialCache;
use crate::errors::{self, StrategyError};
use crate::pipeline::Request;
use crate::profile::RetrievalProfile;
use crate::workspace::Workspace;

const COOKIE_FILE: &str = "cookies.txt";
const OUTPUT_TEMPLATE: &str = "%(id)s.%(ext)s";
const PATH_REPORT_FILE: &str = "downloaded-path.txt";
const MAX_DIAGNOSTIC_LINES: usize = 20;

/// Runs yt-dlp inside the workspace with the profile's format, headers and ceiling.
///
/// When the profile needs a credential and one is cached, it is written to a
/// private cookie file inside the workspace and removed with it.
pub struct LocalExtractorStrategy {
    binary: String,
    socket_timeout_secs: u64,
    retries: u32,
    fragment_retries: u32,
    timeout: Duration,
    credentials: Option<Arc<CredentialCache>>,
    scope: String,
}

impl LocalExtractorStrategy {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            socket_timeout_secs: config.socket_timeout_secs,
            retries: config.retries,
            fragment_retries: config.fragment_retries,
            timeout: Duration::from_secs(config.timeout_secs),
            credentials: None,
            scope: String::new(),
        }
    }

    /// Attach the credential cache consulted for credential-gated platforms
    pub fn with_credentials(mut self, cache: Arc<CredentialCache>, scope: impl Into<String>) -> Self {
        self.credentials = Some(cache);
        self.scope = scope.into();
        self
    }

    /// Check if the extractor binary is available
    pub async fn check_availability(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    async fn materialize_cookies(
        &self,
        profile: &RetrievalProfile,
        workspace: &Workspace,
    ) -> Result<Option<PathBuf>, StrategyError> {
        if !profile.needs_credential {
            return Ok(None);
        }
        let Some(cache) = &self.credentials else {
            return Ok(None);
        };

        match cache.get_credential(&self.scope).await {
            Some(payload) => {
                let path = workspace.write_private(COOKIE_FILE, &payload).await?;
                tracing::debug!(scope = %self.scope, "Injected cookie file into workspace");
                Ok(Some(path))
            }
            None => {
                tracing::info!(scope = %self.scope, "No credential available, continuing without cookies");
                Ok(None)
            }
        }
    }

    fn build_args(
        &self,
        request: &Request,
        profile: &RetrievalProfile,
        workspace: &Workspace,
        cookie_file: Option<&Path>,
    ) -> Vec<String> {
        let output = workspace.path().join(OUTPUT_TEMPLATE);
        let mut args: Vec<String> = vec![
            "--no-playlist".into(),
            "--no-progress".into(),
            "--no-warnings".into(),
            "--no-cache-dir".into(),
            "--geo-bypass".into(),
            "--format".into(),
            profile.format_spec.clone(),
            "--merge-output-format".into(),
            profile.merge_output_format.clone(),
            "--max-filesize".into(),
            profile.max_size_bytes.to_string(),
            "--socket-timeout".into(),
            self.socket_timeout_secs.to_string(),
            "--retries".into(),
            self.retries.to_string(),
            "--fragment-retries".into(),
            self.fragment_retries.to_string(),
            "--output".into(),
            output.to_string_lossy().into_owned(),
            // Unlike --print, this does not imply --quiet, so the max-filesize
            // refusal still reaches stdout
            "--print-to-file".into(),
            "after_move:filepath".into(),
            workspace.path().join(PATH_REPORT_FILE).to_string_lossy().into_owned(),
            "--no-simulate".into(),
        ];

        for (name, value) in &profile.http_headers {
            args.push("--add-header".into());
            args.push(format!("{}:{}", name, value));
        }
        for extractor_args in &profile.extractor_args {
            args.push("--extractor-args".into());
            args.push(extractor_args.clone());
        }
        if let Some(cookie_file) = cookie_file {
            args.push("--cookies".into());
            args.push(cookie_file.to_string_lossy().into_owned());
        }

        args.push("--".into());
        args.push(request.url.clone());
        args
    }

    async fn run(&self, args: &[String]) -> Result<std::process::Output, StrategyError> {
        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StrategyError::ToolMissing(self.binary.clone()))
            }
            Ok(Err(e)) => Err(StrategyError::Io(e)),
            Err(_) => Err(StrategyError::Network(format!(
                "extractor timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    /// Final file path reported by yt-dlp, else the largest media file in the workspace
    async fn locate_output(workspace: &Workspace) -> Result<Option<PathBuf>, StrategyError> {
        let report = match tokio::fs::read_to_string(workspace.path().join(PATH_REPORT_FILE)).await {
            Ok(report) => report,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let printed = report
            .lines()
            .rev()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .find(|path| path.is_file());
        if printed.is_some() {
            return Ok(printed);
        }
        Ok(workspace.find_media()?)
    }
}

#[async_trait]
impl AcquisitionStrategy for LocalExtractorStrategy {
    fn name(&self) -> &'static str {
        "local-extractor"
    }

    async fn acquire(
        &self,
        request: &Request,
        profile: &RetrievalProfile,
        workspace: &Workspace,
    ) -> Result<PathBuf, StrategyError> {
        let cookie_file = self.materialize_cookies(profile, workspace).await?;
        let args = self.build_args(request, profile, workspace, cookie_file.as_deref());

        tracing::debug!(binary = %self.binary, with_cookies = cookie_file.is_some(), "Running extractor");
        let output = self.run(&args).await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let err = StrategyError::Extractor(diagnostic(&stderr, &stdout));
            if cookie_file.is_some() && errors::is_auth_failure(&err) {
                if let Some(cache) = &self.credentials {
                    cache.invalidate(&self.scope);
                }
            }
            return Err(err);
        }

        if let Some(path) = Self::locate_output(workspace).await? {
            return Ok(path);
        }

        // yt-dlp exits 0 after refusing a file over --max-filesize
        let combined = format!("{}\n{}", stdout, stderr).to_lowercase();
        if combined.contains("max-filesize") {
            return Err(StrategyError::TooLarge {
                size: None,
                limit: profile.max_size_bytes,
            });
        }
        Err(StrategyError::NoArtifact)
    }
}

/// Last meaningful lines of the extractor's output, for classification and logs
fn diagnostic(stderr: &str, stdout: &str) -> String {
    let source = if stderr.trim().is_empty() { stdout } else { stderr };
    let lines: Vec<&str> = source.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(MAX_DIAGNOSTIC_LINES);
    let text = lines[start..].join("\n");
    if text.is_empty() {
        "extractor exited with an error and no output".to_string()
    } else {
        text
    }
}
