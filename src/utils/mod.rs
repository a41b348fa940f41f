use std::path::{Path, PathBuf};
use std::process::Stdio;

const COOKIE_FILE_NAME: &str = "cookies.txt";

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Sanitize filename for safe filesystem usage
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            c if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' || c == '.' => c,
            _ => '_',
        })
        .collect::<String>()
        .trim()
        .trim_start_matches('.')
        .to_string()
}

/// Default destination for a fetched artifact: its file name in the current directory
pub fn default_output_path(artifact: &Path) -> PathBuf {
    let name = artifact
        .file_name()
        .map(|name| sanitize_filename(&name.to_string_lossy()))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "video.mp4".to_string());
    PathBuf::from(name)
}

/// Locate a cookie file to upload.
///
/// An explicit path wins; otherwise `./cookies.txt`, then `cookies.txt` in the
/// user's downloads folder.
pub fn find_cookie_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.is_file().then(|| path.to_path_buf());
    }

    let mut candidates = vec![PathBuf::from(COOKIE_FILE_NAME)];
    if let Some(downloads) = dirs::download_dir() {
        candidates.push(downloads.join(COOKIE_FILE_NAME));
    }
    candidates.into_iter().find(|path| path.is_file())
}

/// Check if the current environment has required tools
pub async fn check_dependencies(extractor_binary: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(extractor_binary).await {
        missing.push(format!("{} - required for the local extractor fallback", extractor_binary));
    }

    // ffmpeg merges separate video and audio streams
    if !check_command_available("ffmpeg").await {
        missing.push("ffmpeg - recommended for merging video and audio streams".to_string());
    }

    missing
}

/// Check if a command is available in PATH
pub async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    // ffmpeg only knows -version
    let flag = if command == "ffmpeg" { "-version" } else { "--version" };
    Command::new(command)
        .arg(flag)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}
