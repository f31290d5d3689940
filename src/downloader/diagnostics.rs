// Failure diagnostics - turns the extraction tool's stderr into a hint
//
// Only used for reporting; nothing here changes control flow or retries.

use serde::{Deserialize, Serialize};

/// Likely cause of a failed metadata query or download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureHint {
    /// The selector matched nothing the site offers
    FormatUnavailable,
    /// HTTP 429 or similar throttling
    RateLimited,
    PrivateVideo,
    GeoBlocked,
    AgeRestricted,
    /// Removed, deleted or never existed
    VideoUnavailable,
    /// HTTP 403
    Forbidden,
    NetworkTimeout,
    Unknown,
}

impl FailureHint {
    pub fn description(&self) -> &'static str {
        match self {
            Self::FormatUnavailable => "Requested quality or language is not available",
            Self::RateLimited => "Rate limited by the site",
            Self::PrivateVideo => "Private video",
            Self::GeoBlocked => "Geographic restriction",
            Self::AgeRestricted => "Age-restricted content",
            Self::VideoUnavailable => "Video unavailable",
            Self::Forbidden => "Access denied (HTTP 403)",
            Self::NetworkTimeout => "Network timeout",
            Self::Unknown => "Unknown failure",
        }
    }

    /// What the user can do about it, if anything
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::FormatUnavailable => Some("try a lower quality or another audio language"),
            Self::RateLimited | Self::NetworkTimeout => Some("wait a moment and try again"),
            Self::Forbidden => Some("update yt-dlp; the site may have changed"),
            _ => None,
        }
    }

    /// Retrying with a different selection could succeed
    pub fn is_selection_problem(&self) -> bool {
        matches!(self, Self::FormatUnavailable)
    }
}

/// Classify diagnostic text. `None` only for empty input.
pub fn diagnose_error(error: &str) -> Option<FailureHint> {
    let lower = error.to_lowercase();

    if lower.contains("requested format is not available")
        || lower.contains("no video formats found")
        || lower.contains("format not available")
    {
        return Some(FailureHint::FormatUnavailable);
    }

    if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests") {
        return Some(FailureHint::RateLimited);
    }

    if lower.contains("private video")
        || lower.contains("video is private")
        || lower.contains("sign in if you've been granted access")
    {
        return Some(FailureHint::PrivateVideo);
    }

    if lower.contains("available in your country")
        || lower.contains("blocked in your country")
        || lower.contains("geo restrict")
        || lower.contains("geo-restrict")
    {
        return Some(FailureHint::GeoBlocked);
    }

    if lower.contains("age-restricted")
        || lower.contains("sign in to confirm your age")
        || lower.contains("age_verification")
    {
        return Some(FailureHint::AgeRestricted);
    }

    if lower.contains("video unavailable")
        || lower.contains("video has been removed")
        || lower.contains("this video is no longer available")
        || lower.contains("video is unavailable")
    {
        return Some(FailureHint::VideoUnavailable);
    }

    if lower.contains("403") || lower.contains("forbidden") {
        return Some(FailureHint::Forbidden);
    }

    if lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("connection refused")
        || lower.contains("network unreachable")
    {
        return Some(FailureHint::NetworkTimeout);
    }

    if !error.trim().is_empty() {
        return Some(FailureHint::Unknown);
    }

    None
}
