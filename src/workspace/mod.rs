use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

use crate::errors::StrategyError;

const MEDIA_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "mov", "m4v", "3gp", "flv"];

/// A locally materialized video file inside a [`Workspace`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Exclusive temporary directory for one in-flight request.
///
/// The directory tree is removed when the workspace is dropped, so every exit path
/// (success, error, panic, or the owning future being cancelled) releases it.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a uniquely named directory under `root`, or the OS temp dir if `None`
    pub fn create(root: Option<&Path>, request_id: &Uuid) -> io::Result<Self> {
        let prefix = format!("clipfetch-{}-", &request_id.simple().to_string()[..8]);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);

        let dir = match root {
            Some(root) => {
                fs_err::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };

        tracing::debug!(path = %dir.path().display(), "Created workspace");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file readable only by the current user, e.g. a cookie jar
    pub async fn write_private(&self, name: &str, contents: &str) -> io::Result<PathBuf> {
        let path = self.path().join(name);
        tokio::fs::write(&path, contents).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        Ok(path)
    }

    /// Accept a strategy's output as the request's artifact.
    ///
    /// The file must live inside this workspace and be non-empty. A file above
    /// `ceiling` is deleted before the error is returned, so oversized bytes never
    /// leave the workspace.
    pub fn admit(&self, path: &Path, ceiling: u64) -> Result<Artifact, StrategyError> {
        let root = fs_err::canonicalize(self.path())?;
        let resolved = match fs_err::canonicalize(path) {
            Ok(resolved) => resolved,
            Err(_) => return Err(StrategyError::NoArtifact),
        };
        if !resolved.starts_with(&root) || !resolved.is_file() {
            tracing::warn!(path = %path.display(), "Strategy output is not a file inside the workspace");
            return Err(StrategyError::NoArtifact);
        }

        let size_bytes = fs_err::metadata(&resolved)?.len();
        if size_bytes == 0 {
            fs_err::remove_file(&resolved)?;
            return Err(StrategyError::NoArtifact);
        }
        if size_bytes > ceiling {
            fs_err::remove_file(&resolved)?;
            tracing::info!(size_bytes, ceiling, "Removed oversized artifact");
            return Err(StrategyError::TooLarge {
                size: Some(size_bytes),
                limit: ceiling,
            });
        }

        Ok(Artifact {
            path: resolved,
            size_bytes,
        })
    }

    /// Largest completed media file in the workspace, if any
    pub fn find_media(&self) -> io::Result<Option<PathBuf>> {
        let mut best: Option<(u64, PathBuf)> = None;

        for entry in fs_err::read_dir(self.path())? {
            let entry = entry?;
            let path = entry.path();
            let is_media = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| MEDIA_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if !is_media || !path.is_file() {
                continue;
            }
            let size = entry.metadata()?.len();
            if best.as_ref().map_or(true, |(best_size, _)| size > *best_size) {
                best = Some((size, path));
            }
        }

        Ok(best.map(|(_, path)| path))
    }

    /// Remove the directory tree now and report any failure
    pub fn close(self) -> io::Result<()> {
        let path = self.path().to_path_buf();
        self.dir.close()?;
        tracing::debug!(path = %path.display(), "Removed workspace");
        Ok(())
    }
}
