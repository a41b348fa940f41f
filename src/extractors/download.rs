use futures_util::StreamExt;
use reqwest::Client;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::errors::StrategyError;

/// Stream `url` into `dest`, never writing more than `limit` bytes.
///
/// A `Content-Length` above the limit aborts before any body is read; a body that
/// grows past the limit aborts mid-stream. The partial file is removed on every
/// failure. Returns the number of bytes written.
pub async fn download_capped(
    client: &Client,
    url: &str,
    headers: &BTreeMap<String, String>,
    dest: &Path,
    limit: u64,
) -> Result<u64, StrategyError> {
    let mut request = client.get(url);
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(StrategyError::Http {
            status: status.as_u16(),
        });
    }

    if let Some(reported) = response.content_length() {
        if reported > limit {
            tracing::debug!(reported, limit, "Reported size exceeds ceiling, not downloading");
            return Err(StrategyError::TooLarge {
                size: Some(reported),
                limit,
            });
        }
    }

    let result = write_stream(response, dest, limit).await;
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(dest).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %dest.display(), error = %e, "Failed to remove partial download");
            }
        }
    }
    result
}

async fn write_stream(response: reqwest::Response, dest: &Path, limit: u64) -> Result<u64, StrategyError> {
    let mut file = File::create(dest).await?;
    let mut written = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        written += chunk.len() as u64;
        if written > limit {
            return Err(StrategyError::TooLarge { size: None, limit });
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(written)
}
