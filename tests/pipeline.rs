#![cfg(unix)]

use async_trait::async_trait;
use httpmock::prelude::*;
use httpmock::MockServer;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clipfetch::credentials::{CredentialCache, CredentialStore};
use clipfetch::extractors::LocalExtractorStrategy;
use clipfetch::{Config, ErrorKind, Platform, ProfileResolver, StrategyChain, VideoPipeline};

const LIMIT: u64 = 50 * 1024;

const PREAMBLE: &str = r#"#!/bin/sh
out=""
cookies=""
report=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift ;;
    --cookies) cookies="$2"; shift ;;
    --print-to-file) report="$3"; shift 2 ;;
  esac
  shift
done
dir=$(dirname "$out")
"#;

/// Write an executable stand-in for yt-dlp that runs `body` after parsing its arguments.
///
/// Like the real tool with `--print-to-file`, a successful download reports its final
/// path in the report file rather than on stdout.
fn fake_extractor(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-yt-dlp");
    std::fs::write(&path, format!("{}{}\n", PREAMBLE, body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn writes_video(kib: u64) -> String {
    format!(
        "dd if=/dev/zero of=\"$dir/abc123.mp4\" bs=1024 count={} 2>/dev/null\necho \"$dir/abc123.mp4\" >> \"$report\"",
        kib
    )
}

fn config_for(extractor: &Path, workspace_root: &Path) -> Config {
    let mut config = Config::default();
    config.pipeline.max_size_bytes = LIMIT;
    config.pipeline.workspace_root = Some(workspace_root.to_path_buf());
    config.extractor.binary = extractor.to_string_lossy().into_owned();
    config.extractor.timeout_secs = 30;
    config
}

fn entries(root: &Path) -> usize {
    std::fs::read_dir(root).map(|dir| dir.count()).unwrap_or(0)
}

#[tokio::test]
async fn test_falls_back_from_resolver_to_local_extractor() {
    let server = MockServer::start_async().await;
    let resolver = server.mock(|when, then| {
        when.method(POST).path("/");
        then.status(503);
    });

    let bin = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let mut config = config_for(&fake_extractor(bin.path(), &writes_video(30)), root.path());
    config.resolver.endpoint = Some(server.url("/"));

    let pipeline = VideoPipeline::from_config(&config).unwrap();
    let video = pipeline.acquire_video("https://youtu.be/abc123").await.unwrap();

    resolver.assert();
    assert_eq!(video.platform(), Platform::YouTube);
    assert_eq!(video.size_bytes(), 30 * 1024);
    assert!(video.path().is_file());

    let path = video.path().to_path_buf();
    video.release().await.unwrap();
    assert!(!path.exists());
    assert_eq!(entries(root.path()), 0);
}

#[tokio::test]
async fn test_invalid_and_unsupported_input_never_runs_extractor() {
    let bin = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let marker = bin.path().join("ran");
    let body = format!("touch \"{}\"\n{}", marker.display(), writes_video(1));
    let pipeline = VideoPipeline::from_config(&config_for(&fake_extractor(bin.path(), &body), root.path())).unwrap();

    let err = pipeline.acquire_video("not-a-url").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidUrl);

    let err = pipeline.acquire_video("https://vimeo.com/123456").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);

    assert!(!marker.exists());
    assert_eq!(entries(root.path()), 0);
}

#[tokio::test]
async fn test_login_wall_without_credential_is_auth_required() {
    let bin = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let body = "echo 'ERROR: [Instagram] Cabc123: Requested content is not available, login required' >&2\nexit 1";
    let pipeline = VideoPipeline::from_config(&config_for(&fake_extractor(bin.path(), body), root.path())).unwrap();

    let err = pipeline
        .acquire_video("https://www.instagram.com/reel/Cabc123/")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthRequired);
    assert_eq!(entries(root.path()), 0);
}

#[tokio::test]
async fn test_cached_cookies_are_injected_and_removed() {
    let bin = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let capture = bin.path().join("seen-cookies.txt");
    let body = format!("cp \"$cookies\" \"{}\"\n{}", capture.display(), writes_video(10));

    let mut config = config_for(&fake_extractor(bin.path(), &body), root.path());
    config.credentials.inline_cookies = Some("# Netscape HTTP Cookie File\n.instagram.com\tTRUE\t/\tTRUE\t0\tsessionid\tabc\n".to_string());

    let pipeline = VideoPipeline::from_config(&config).unwrap();
    let video = pipeline
        .acquire_video("https://www.instagram.com/p/Cabc123/")
        .await
        .unwrap();

    let seen = std::fs::read_to_string(&capture).unwrap();
    assert!(seen.starts_with("# Netscape HTTP Cookie File"));

    video.release().await.unwrap();
    assert_eq!(entries(root.path()), 0);
}

#[tokio::test]
async fn test_oversized_output_is_too_large_and_removed() {
    let bin = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let pipeline = VideoPipeline::from_config(&config_for(&fake_extractor(bin.path(), &writes_video(60)), root.path())).unwrap();

    let err = pipeline.acquire_video("https://youtu.be/abc123").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TooLarge);
    assert_eq!(entries(root.path()), 0);
}

#[tokio::test]
async fn test_extractor_refusing_max_filesize_is_too_large() {
    let bin = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let body = "echo '[download] File is larger than max-filesize (62914560 bytes > 51200 bytes). Aborting.'";
    let pipeline = VideoPipeline::from_config(&config_for(&fake_extractor(bin.path(), body), root.path())).unwrap();

    let err = pipeline
        .acquire_video("https://www.tiktok.com/@someone/video/7300000000000000000")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TooLarge);
    assert_eq!(entries(root.path()), 0);
}

#[tokio::test]
async fn test_cancelled_request_removes_workspace() {
    let bin = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let body = format!("dd if=/dev/zero of=\"$dir/abc123.mp4.part\" bs=1024 count=4 2>/dev/null\nsleep 10\n{}", writes_video(4));
    let pipeline = VideoPipeline::from_config(&config_for(&fake_extractor(bin.path(), &body), root.path())).unwrap();

    let outcome = tokio::time::timeout(
        Duration::from_millis(500),
        pipeline.acquire_video("https://fb.watch/abcDEF123/"),
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(entries(root.path()), 0);
}

#[tokio::test]
async fn test_with_video_hands_file_to_consumer() {
    let bin = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let pipeline = VideoPipeline::from_config(&config_for(&fake_extractor(bin.path(), &writes_video(8)), root.path())).unwrap();

    let size = pipeline
        .with_video("https://www.facebook.com/reel/1234567890", |path| async move {
            tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0)
        })
        .await
        .unwrap();

    assert_eq!(size, 8 * 1024);
    assert_eq!(entries(root.path()), 0);
}

/// Store that hands out the same jar and counts how often it was asked
struct CountingStore {
    fetches: AtomicUsize,
}

#[async_trait]
impl CredentialStore for CountingStore {
    async fn fetch(&self, _scope: &str) -> clipfetch::Result<Option<String>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(Some("# Netscape HTTP Cookie File\n".to_string()))
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

#[tokio::test]
async fn test_rejected_cookies_are_invalidated_and_refetched() {
    let bin = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let body = "if [ -n \"$cookies\" ]; then\n  echo 'ERROR: [Instagram] Cabc123: login required. Use --cookies-from-browser' >&2\n  exit 1\nfi\nexit 2";
    let config = config_for(&fake_extractor(bin.path(), body), root.path());

    let store = Arc::new(CountingStore {
        fetches: AtomicUsize::new(0),
    });
    let cache = Arc::new(CredentialCache::new(store.clone(), Duration::from_secs(3600)));
    let local = LocalExtractorStrategy::new(&config.extractor).with_credentials(cache.clone(), "Youtube/Instagram");
    let pipeline = VideoPipeline::new(
        ProfileResolver::new(LIMIT, "720"),
        StrategyChain::new().with(Box::new(local)),
        Some(root.path().to_path_buf()),
    );

    let err = pipeline
        .acquire_video("https://www.instagram.com/reel/Cabc123/")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthRequired);
    assert!(cache.peek("Youtube/Instagram").is_none());
    assert_eq!(store.fetches.load(Ordering::SeqCst), 1);

    let err = pipeline
        .acquire_video("https://www.instagram.com/reel/Cabc123/")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthRequired);
    assert_eq!(store.fetches.load(Ordering::SeqCst), 2);
    assert_eq!(entries(root.path()), 0);
}
