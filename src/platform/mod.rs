use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Video-hosting sources the pipeline knows how to retrieve from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    YouTube,
    Instagram,
    Facebook,
    TikTok,
    Unsupported,
}

impl Platform {
    /// Every platform that `classify` can return with `ok = true`
    pub const SUPPORTED: [Platform; 4] = [
        Platform::YouTube,
        Platform::Instagram,
        Platform::Facebook,
        Platform::TikTok,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
            Platform::TikTok => "tiktok",
            Platform::Unsupported => "unsupported",
        }
    }

    /// Human-readable name with the domains it covers
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube (youtube.com, youtu.be)",
            Platform::Instagram => "Instagram (instagram.com, instagr.am)",
            Platform::Facebook => "Facebook (facebook.com, fb.watch)",
            Platform::TikTok => "TikTok (tiktok.com, vm.tiktok.com)",
            Platform::Unsupported => "Unsupported",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pattern family per host group, matched against the URL path once any
/// `www.`/`m.`-style prefix has been stripped from the host.
struct Family {
    platform: Platform,
    hosts: &'static [&'static str],
    path: Lazy<Regex>,
}

static FAMILIES: [Family; 7] = [
    Family {
        platform: Platform::YouTube,
        hosts: &["youtube.com", "music.youtube.com", "youtube-nocookie.com"],
        path: Lazy::new(|| {
            Regex::new(r"^/(?:watch/?$|(?:shorts|embed|live|v)/[\w-]+)")
                .expect("YouTube path regex pattern is valid and should compile")
        }),
    },
    Family {
        platform: Platform::YouTube,
        hosts: &["youtu.be"],
        path: Lazy::new(|| {
            Regex::new(r"^/[\w-]+/?$").expect("youtu.be path regex pattern is valid and should compile")
        }),
    },
    Family {
        platform: Platform::Instagram,
        hosts: &["instagram.com", "instagr.am"],
        path: Lazy::new(|| {
            Regex::new(r"^/(?:[\w.]+/)?(?:p|reels?|tv)/[\w-]+")
                .expect("Instagram path regex pattern is valid and should compile")
        }),
    },
    Family {
        platform: Platform::Facebook,
        hosts: &["facebook.com"],
        path: Lazy::new(|| {
            Regex::new(r"^/(?:reel/\d+|watch/?$|share/(?:[vr]/)?[\w-]+|videos/\d+|[\w.-]+/videos/[\w.-]+)")
                .expect("Facebook path regex pattern is valid and should compile")
        }),
    },
    Family {
        platform: Platform::Facebook,
        hosts: &["fb.watch"],
        path: Lazy::new(|| {
            Regex::new(r"^/[\w-]+/?$").expect("fb.watch path regex pattern is valid and should compile")
        }),
    },
    Family {
        platform: Platform::TikTok,
        hosts: &["tiktok.com"],
        path: Lazy::new(|| {
            Regex::new(r"^/@[\w.-]+/video/\d+").expect("TikTok path regex pattern is valid and should compile")
        }),
    },
    Family {
        platform: Platform::TikTok,
        hosts: &["vm.tiktok.com", "vt.tiktok.com"],
        path: Lazy::new(|| {
            Regex::new(r"^/(?:t/)?[\w-]+/?$")
                .expect("TikTok short-link regex pattern is valid and should compile")
        }),
    },
];

const HOST_PREFIXES: &[&str] = &["www.", "m.", "web.", "mobile."];

/// Parse user input into an http(s) URL.
///
/// Scheme-less input such as `youtu.be/abc` is accepted as long as the part before
/// the first `/` looks like a dotted host name.
pub fn parse_input(input: &str) -> Option<Url> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return None;
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        let host_part = trimmed.split('/').next().unwrap_or_default();
        if !host_part.contains('.') {
            return None;
        }
        format!("https://{}", trimmed)
    };

    let parsed = Url::parse(&candidate).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?;
    if !host.contains('.') || !parsed.username().is_empty() || parsed.password().is_some() {
        return None;
    }
    Some(parsed)
}

/// Map raw user input to a platform.
///
/// Pure and deterministic; no network access. Returns `(Platform::Unsupported, false)`
/// for empty input, malformed URLs and well-formed URLs from unknown domains alike.
pub fn classify(input: &str) -> (Platform, bool) {
    match parse_input(input).map(|url| classify_url(&url)) {
        Some(Platform::Unsupported) | None => (Platform::Unsupported, false),
        Some(platform) => (platform, true),
    }
}

fn classify_url(url: &Url) -> Platform {
    let Some(raw_host) = url.host_str() else {
        return Platform::Unsupported;
    };
    let host = normalize_host(raw_host);
    let path = url.path();

    for family in FAMILIES.iter() {
        if !family.hosts.contains(&host.as_str()) || !family.path.is_match(path) {
            continue;
        }
        // A bare watch page is a feed, not a video
        if path.trim_end_matches('/') == "/watch"
            && !url.query_pairs().any(|(k, v)| k == "v" && !v.is_empty())
        {
            continue;
        }
        return family.platform;
    }

    Platform::Unsupported
}

fn normalize_host(host: &str) -> String {
    let lower = host.to_ascii_lowercase();
    for prefix in HOST_PREFIXES {
        if let Some(rest) = lower.strip_prefix(prefix) {
            return rest.to_string();
        }
    }
    lower
}
