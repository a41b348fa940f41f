use std::fmt;

/// Low-level failure of a single retrieval strategy.
///
/// These never reach the caller directly: the chain uses them to decide whether to
/// fall through, and the last one is turned into a [`PipelineError`] by [`classify`].
#[derive(thiserror::Error, Debug)]
pub enum StrategyError {
    #[error("upstream returned HTTP {status}")]
    Http { status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error("artifact exceeds the {limit} byte ceiling (reported size: {size:?})")]
    TooLarge { size: Option<u64>, limit: u64 },

    #[error("extractor failed: {0}")]
    Extractor(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("strategy finished without producing a file")]
    NoArtifact,

    #[error("extractor not available: {0}")]
    ToolMissing(String),

    #[error("file operation failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for StrategyError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return StrategyError::Http {
                status: status.as_u16(),
            };
        }
        if err.is_decode() {
            return StrategyError::Malformed(err.to_string());
        }
        StrategyError::Network(err.to_string())
    }
}

/// Discriminant of [`PipelineError`], stable for logs and callers that branch on kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidUrl,
    Unsupported,
    AuthRequired,
    TooLarge,
    SourceUnavailable,
    NetworkFailure,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidUrl => "invalid_url",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::AuthRequired => "auth_required",
            ErrorKind::TooLarge => "too_large",
            ErrorKind::SourceUnavailable => "source_unavailable",
            ErrorKind::NetworkFailure => "network_failure",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed taxonomy surfaced to the caller of the pipeline
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("unsupported platform: {0}")]
    Unsupported(String),

    #[error("content requires authentication")]
    AuthRequired,

    #[error("video exceeds the size ceiling (size: {size:?}, limit: {limit:?})")]
    TooLarge { size: Option<u64>, limit: Option<u64> },

    #[error("source has no retrievable video")]
    SourceUnavailable,

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidUrl(_) => ErrorKind::InvalidUrl,
            PipelineError::Unsupported(_) => ErrorKind::Unsupported,
            PipelineError::AuthRequired => ErrorKind::AuthRequired,
            PipelineError::TooLarge { .. } => ErrorKind::TooLarge,
            PipelineError::SourceUnavailable => ErrorKind::SourceUnavailable,
            PipelineError::NetworkFailure(_) => ErrorKind::NetworkFailure,
            PipelineError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Short message safe to show an end user. Never contains upstream text.
    pub fn user_message(&self) -> &'static str {
        match self {
            PipelineError::InvalidUrl(_) => "❌ Invalid URL. Send a link to a video.",
            PipelineError::Unsupported(_) => {
                "❌ Unsupported site. YouTube, Instagram, Facebook and TikTok links work."
            }
            PipelineError::AuthRequired => "🔒 Private content or login required.",
            PipelineError::TooLarge { .. } => "❌ Video too large to send.",
            PipelineError::SourceUnavailable => "🚫 No video found at that link.",
            PipelineError::NetworkFailure(_) => "⚠️ Network error. Try again later.",
            PipelineError::Internal(_) => "🚨 Something went wrong. Try again.",
        }
    }
}

const AUTH_MARKERS: &[&str] = &[
    "private video",
    "this video is private",
    "login required",
    "log in",
    "login_required",
    "sign in",
    "registered users",
    "age-restricted",
    "age restricted",
    "inappropriate for some users",
    "confirm you're not a bot",
    "confirm you’re not a bot",
    "use --cookies",
    "cookies",
    "unable to download video data",
    "http error 401",
    "http error 403",
];

const SIZE_MARKERS: &[&str] = &["max-filesize", "file is larger than", "file too large"];

const UNAVAILABLE_MARKERS: &[&str] = &[
    "video unavailable",
    "no video",
    "there is no video",
    "has been removed",
    "does not exist",
    "not available",
    "no longer available",
    "requested format is not available",
    "unsupported url",
    "http error 404",
    "http error 410",
];

const NETWORK_MARKERS: &[&str] = &[
    "timed out",
    "timeout",
    "connection reset",
    "connection refused",
    "network is unreachable",
    "temporary failure in name resolution",
    "name or service not known",
    "too many requests",
    "http error 429",
    "http error 5",
];

/// Map the last strategy failure into the closed taxonomy.
///
/// Unmatched failures become `Internal` and are logged with their full text here,
/// since the caller only ever sees the kind.
pub fn classify(err: &StrategyError) -> PipelineError {
    let classified = map_error(err);
    if classified.kind() == ErrorKind::Internal {
        tracing::error!(error = %err, "Unclassified acquisition failure");
    }
    classified
}

/// Whether a strategy failure means the source rejected or demanded authentication
pub fn is_auth_failure(err: &StrategyError) -> bool {
    map_error(err).kind() == ErrorKind::AuthRequired
}

fn map_error(err: &StrategyError) -> PipelineError {
    match err {
        StrategyError::TooLarge { size, limit } => PipelineError::TooLarge {
            size: *size,
            limit: Some(*limit),
        },
        StrategyError::Http { status } => classify_status(*status),
        StrategyError::Network(msg) => PipelineError::NetworkFailure(msg.clone()),
        StrategyError::NoArtifact => PipelineError::SourceUnavailable,
        StrategyError::Extractor(msg) => classify_message(msg),
        StrategyError::Malformed(msg) => PipelineError::Internal(format!("malformed response: {}", msg)),
        StrategyError::ToolMissing(tool) => PipelineError::Internal(format!("extractor not available: {}", tool)),
        StrategyError::Io(e) => PipelineError::Internal(format!("file operation failed: {}", e)),
    }
}

fn classify_status(status: u16) -> PipelineError {
    match status {
        401 | 403 => PipelineError::AuthRequired,
        404 | 410 => PipelineError::SourceUnavailable,
        408 | 429 | 500..=599 => PipelineError::NetworkFailure(format!("upstream returned HTTP {}", status)),
        _ => PipelineError::Internal(format!("upstream returned HTTP {}", status)),
    }
}

fn classify_message(msg: &str) -> PipelineError {
    let lower = msg.to_lowercase();
    let has = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

    // Order matters: "Video unavailable. This video is private" is an auth problem.
    if has(SIZE_MARKERS) {
        PipelineError::TooLarge { size: None, limit: None }
    } else if has(AUTH_MARKERS) {
        PipelineError::AuthRequired
    } else if has(UNAVAILABLE_MARKERS) {
        PipelineError::SourceUnavailable
    } else if has(NETWORK_MARKERS) {
        PipelineError::NetworkFailure(first_line(msg))
    } else {
        PipelineError::Internal(first_line(msg))
    }
}

fn first_line(msg: &str) -> String {
    msg.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("unknown error")
        .to_string()
}
