use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a single network attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    /// 2xx/3xx and the detector ran
    Success,
    /// Timeouts, refused connections, generic 5xx
    TransientError,
    /// HTTP 429
    RateLimited,
    /// HTTP 403
    Forbidden,
    /// Other 4xx, or a URL the transport cannot even request
    PermanentError,
    /// Connection reset or TLS failure, typical of anti-bot middleboxes
    BlockedSignal,
}

impl StatusClass {
    /// Classifies an HTTP status code
    pub fn from_http_status(status: u16) -> Self {
        match status {
            200..=399 => Self::Success,
            403 => Self::Forbidden,
            429 => Self::RateLimited,
            400..=499 => Self::PermanentError,
            _ => Self::TransientError,
        }
    }

    /// Returns true if this outcome suggests anti-bot defenses
    pub fn is_blocking_signal(&self) -> bool {
        matches!(self, Self::Forbidden | Self::RateLimited | Self::BlockedSignal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::TransientError => "transient_error",
            Self::RateLimited => "rate_limited",
            Self::Forbidden => "forbidden",
            Self::PermanentError => "permanent_error",
            Self::BlockedSignal => "blocked_signal",
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The classified result of one attempt against one URL form
///
/// Immutable once produced. It feeds the retry policy and the block
/// detector and is folded into the task's [`UrlResult`](crate::UrlResult);
/// it is never persisted on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptOutcome {
    /// The original input URL this attempt belongs to
    pub original_url: String,

    /// The URL form that was requested
    pub url: String,

    /// Domain key of `url`
    pub domain: String,

    pub status_class: StatusClass,

    pub http_status: Option<u16>,

    /// Transport error text, if the attempt did not produce a response
    pub detail: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl AttemptOutcome {
    pub fn new(
        original_url: &str,
        url: &str,
        domain: &str,
        status_class: StatusClass,
        http_status: Option<u16>,
        detail: Option<String>,
    ) -> Self {
        Self {
            original_url: original_url.to_string(),
            url: url.to_string(),
            domain: domain.to_string(),
            status_class,
            http_status,
            detail,
            timestamp: Utc::now(),
        }
    }

    /// Human-readable description used in failure reasons
    pub fn describe(&self) -> String {
        match (self.http_status, &self.detail) {
            (Some(status), _) => format!("HTTP {} ({})", status, self.status_class),
            (None, Some(detail)) => format!("{} ({})", detail, self.status_class),
            (None, None) => self.status_class.to_string(),
        }
    }
}
