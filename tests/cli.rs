use assert_cmd::Command;
use predicates::prelude::*;

fn clipfetch() -> Command {
    let mut cmd = Command::cargo_bin("clipfetch").unwrap();
    cmd.env_remove("CLIPFETCH_CONFIG")
        .env_remove("CLIPFETCH_RESOLVER_URL")
        .env_remove("SUPABASE_URL")
        .env_remove("SUPABASE_KEY")
        .env_remove("COOKIES");
    cmd
}

#[test]
fn test_platforms_lists_supported_sites() {
    clipfetch()
        .arg("platforms")
        .assert()
        .success()
        .stdout(predicate::str::contains("YouTube"))
        .stdout(predicate::str::contains("TikTok"));
}

#[test]
fn test_fetch_rejects_non_url() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.yaml");
    std::fs::write(&config, "extractor:\n  binary: clipfetch-test-no-such-binary\n").unwrap();

    clipfetch()
        .current_dir(dir.path())
        .args(["--quiet", "--config"])
        .arg(&config)
        .args(["fetch", "not-a-url"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid URL"));
}

#[test]
fn test_config_init_writes_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("clipfetch.yaml");

    clipfetch()
        .arg("--config")
        .arg(&config)
        .args(["config", "--init"])
        .assert()
        .success();

    let written = std::fs::read_to_string(&config).unwrap();
    assert!(written.contains("max_size_bytes: 52428800"));
    assert!(written.contains("Youtube/Instagram"));
}

#[test]
fn test_cookies_upload_requires_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.yaml");
    std::fs::write(&config, "pipeline:\n  max_size_bytes: 1000\n").unwrap();

    clipfetch()
        .current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["cookies", "upload", "-y"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No credential store configured"));
}
