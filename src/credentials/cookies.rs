//! Netscape cookie-jar helpers

const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File";

/// Heuristic check that `content` is a Netscape cookie jar, the format yt-dlp reads.
///
/// Accepts the standard header on the first or second line, or at least one
/// non-comment line with seven tab-separated fields.
pub fn looks_like_netscape(content: &str) -> bool {
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return false;
    }

    if lines.iter().take(2).any(|line| line.contains(NETSCAPE_HEADER)) {
        return true;
    }

    lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .any(|line| line.split('\t').count() >= 7)
}

/// Number of cookie entries, ignoring comments and blank lines
pub fn count_entries(content: &str) -> usize {
    content
        .lines()
        .map(str::trim)
        .filter(|line| {
            // `#HttpOnly_` prefixed lines are cookies, not comments
            !line.is_empty() && (!line.starts_with('#') || line.starts_with("#HttpOnly_"))
        })
        .filter(|line| line.split('\t').count() >= 7)
        .count()
}
