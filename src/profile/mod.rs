use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::platform::Platform;

/// Default size ceiling: 50 MiB, the chat transport's upload limit
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 50 * 1024 * 1024;

const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 10; K) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";

const YOUTUBE_FORMAT: &str = "bestvideo[ext=mp4][vcodec^=avc1][height<=720]+bestaudio[ext=m4a]\
     /best[ext=mp4][height<=720]/best[height<=720]/best";

const GENERIC_FORMAT: &str = "best[ext=mp4]/bestvideo+bestaudio/best";

/// Extraction parameters for one request, derived from its platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalProfile {
    /// Platform the profile was resolved for
    pub platform: Platform,

    /// yt-dlp format selector
    pub format_spec: String,

    /// Headers sent with every extractor and download request
    pub http_headers: BTreeMap<String, String>,

    /// Whether the local extractor should try to inject cached cookies
    pub needs_credential: bool,

    /// Hard size ceiling in bytes
    pub max_size_bytes: u64,

    /// Container that separate video/audio streams are merged into
    pub merge_output_format: String,

    /// Per-platform `--extractor-args` values
    pub extractor_args: Vec<String>,

    /// Quality hint forwarded to the remote resolver
    pub video_quality: String,
}

/// Table-driven mapping from platform to retrieval profile
#[derive(Debug, Clone)]
pub struct ProfileResolver {
    max_size_bytes: u64,
    video_quality: String,
}

impl ProfileResolver {
    pub fn new(max_size_bytes: u64, video_quality: impl Into<String>) -> Self {
        Self {
            max_size_bytes,
            video_quality: video_quality.into(),
        }
    }

    /// Resolve the profile for a platform. The global ceiling is part of every profile.
    pub fn resolve(&self, platform: Platform) -> RetrievalProfile {
        let mut http_headers = BTreeMap::new();
        http_headers.insert("User-Agent".to_string(), MOBILE_USER_AGENT.to_string());
        http_headers.insert("Accept-Language".to_string(), "en-US,en;q=0.9".to_string());

        let (format_spec, needs_credential, extractor_args) = match platform {
            Platform::YouTube => (
                YOUTUBE_FORMAT,
                true,
                vec!["youtube:player_client=android,ios;player_skip=web,tv".to_string()],
            ),
            Platform::Instagram => {
                http_headers.insert("Referer".to_string(), "https://www.instagram.com/".to_string());
                (GENERIC_FORMAT, true, Vec::new())
            }
            Platform::Facebook => {
                http_headers.insert("Referer".to_string(), "https://www.facebook.com/".to_string());
                (GENERIC_FORMAT, false, Vec::new())
            }
            Platform::TikTok => (
                GENERIC_FORMAT,
                false,
                vec!["tiktok:app_version=30.0.0;manifest_app_version=30.0.0".to_string()],
            ),
            Platform::Unsupported => (GENERIC_FORMAT, false, Vec::new()),
        };

        RetrievalProfile {
            platform,
            format_spec: format_spec.to_string(),
            http_headers,
            needs_credential,
            max_size_bytes: self.max_size_bytes,
            merge_output_format: "mp4".to_string(),
            extractor_args,
            video_quality: self.video_quality.clone(),
        }
    }
}

impl Default for ProfileResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE_BYTES, "720")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_prefers_720p_h264_with_aac() {
        let profile = ProfileResolver::default().resolve(Platform::YouTube);
        assert!(profile.format_spec.starts_with("bestvideo[ext=mp4][vcodec^=avc1][height<=720]"));
        assert!(profile.format_spec.contains("bestaudio[ext=m4a]"));
        assert_eq!(profile.merge_output_format, "mp4");
        assert!(profile.needs_credential);
        assert_eq!(profile.extractor_args.len(), 1);
    }

    #[test]
    fn test_generic_platforms_prefer_best_with_split_fallback() {
        let resolver = ProfileResolver::default();
        for platform in [Platform::Instagram, Platform::Facebook, Platform::TikTok] {
            let profile = resolver.resolve(platform);
            assert_eq!(profile.format_spec, GENERIC_FORMAT, "{}", platform);
        }
    }

    #[test]
    fn test_credential_requirement_per_platform() {
        let resolver = ProfileResolver::default();
        assert!(resolver.resolve(Platform::Instagram).needs_credential);
        assert!(!resolver.resolve(Platform::Facebook).needs_credential);
        assert!(!resolver.resolve(Platform::TikTok).needs_credential);
    }

    #[test]
    fn test_ceiling_is_part_of_every_profile() {
        let resolver = ProfileResolver::new(1234, "480");
        for platform in Platform::SUPPORTED {
            let profile = resolver.resolve(platform);
            assert_eq!(profile.max_size_bytes, 1234);
            assert_eq!(profile.video_quality, "480");
            assert!(profile.http_headers.contains_key("User-Agent"));
        }
    }

    #[test]
    fn test_referer_matches_platform() {
        let resolver = ProfileResolver::default();
        assert_eq!(
            resolver.resolve(Platform::Instagram).http_headers.get("Referer").map(String::as_str),
            Some("https://www.instagram.com/")
        );
        assert!(!resolver.resolve(Platform::TikTok).http_headers.contains_key("Referer"));
    }
}
