//! Closed error taxonomy and retry classifier shared by every adapter.
//!
//! Structured failure points (an HTTP status the adapter already parsed, a
//! keyword match against an adapter's `errorText` set) build an
//! [`ErrorRecord`] directly. Only unexpected exceptions crossing a
//! worker/pool boundary go through [`normalize_error`].

use std::fmt;

/// The closed set of error kinds every adapter failure is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Page closed mid-operation.
    PageClosed,
    /// Renderer crash.
    PageCrashed,
    /// Page handle invalid before the operation started.
    PageInvalid,
    /// An API or navigation waiter expired.
    TimeoutError,
    /// Upstream returned an HTTP status, bucketed by the 4xx/5xx split at
    /// the call site.
    HttpError,
    /// HTTP 429, or "too many requests" found in a response body.
    RateLimited,
    /// Body contains "recaptcha validation failed".
    CaptchaRequired,
    /// Body/page matched one of an adapter's `errorText` keywords.
    ContentBlocked,
    /// Generic fetch/socket failure that matched nothing more specific.
    NetworkError,
}

impl ErrorKind {
    /// Whether the pool's failover loop should try the next candidate.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        match self {
            Self::PageClosed
            | Self::PageCrashed
            | Self::PageInvalid
            | Self::TimeoutError
            | Self::HttpError
            | Self::RateLimited
            | Self::NetworkError => true,
            Self::CaptchaRequired | Self::ContentBlocked => false,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PageClosed => "PAGE_CLOSED",
            Self::PageCrashed => "PAGE_CRASHED",
            Self::PageInvalid => "PAGE_INVALID",
            Self::TimeoutError => "TIMEOUT_ERROR",
            Self::HttpError => "HTTP_ERROR",
            Self::RateLimited => "RATE_LIMITED",
            Self::CaptchaRequired => "CAPTCHA_REQUIRED",
            Self::ContentBlocked => "CONTENT_BLOCKED",
            Self::NetworkError => "NETWORK_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized failure: the vocabulary every adapter boundary speaks.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorRecord {
    pub error: String,
    pub code: ErrorKind,
    pub retryable: bool,
}

impl ErrorRecord {
    #[must_use]
    pub fn new(error: impl Into<String>, code: ErrorKind) -> Self {
        let retryable = code.is_retryable();
        Self { error: error.into(), code, retryable }
    }

    /// Build a record with `retryable` forced, for call sites that know better
    /// than the default for their `code` (none currently do; kept for adapters
    /// that construct records with adapter-specific judgement calls).
    #[must_use]
    pub fn with_retryable(error: impl Into<String>, code: ErrorKind, retryable: bool) -> Self {
        Self { error: error.into(), code, retryable }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.error)
    }
}

impl std::error::Error for ErrorRecord {}

/// Construct an [`HttpError`](ErrorKind::HttpError) or [`RateLimited`](ErrorKind::RateLimited)
/// record from an observed upstream HTTP status, per the 4xx/5xx/429 split in §4.7.
#[must_use]
pub fn classify_http_status(status: u16, message: impl Into<String>) -> ErrorRecord {
    let message = message.into();
    if status == 429 {
        ErrorRecord::new(message, ErrorKind::RateLimited)
    } else if status >= 500 {
        ErrorRecord::with_retryable(message, ErrorKind::HttpError, true)
    } else {
        // 400-499 except 429: non-retryable, the caller's request won't change.
        ErrorRecord::with_retryable(message, ErrorKind::HttpError, false)
    }
}

/// Ordered needle -> kind table. Order matters: timeout/crash/closed are
/// checked before the generic network bucket.
const CLASSIFICATION_TABLE: &[(&str, ErrorKind)] = &[
    ("recaptcha validation failed", ErrorKind::CaptchaRequired),
    ("too many requests", ErrorKind::RateLimited),
    ("429", ErrorKind::RateLimited),
    ("page closed", ErrorKind::PageClosed),
    ("target closed", ErrorKind::PageClosed),
    ("page crashed", ErrorKind::PageCrashed),
    ("session crashed", ErrorKind::PageCrashed),
    ("page invalid", ErrorKind::PageInvalid),
    ("invalid page handle", ErrorKind::PageInvalid),
    ("timeout", ErrorKind::TimeoutError),
    ("timed out", ErrorKind::TimeoutError),
    ("connection refused", ErrorKind::NetworkError),
    ("connection reset", ErrorKind::NetworkError),
    ("dns", ErrorKind::NetworkError),
    ("network", ErrorKind::NetworkError),
    ("unreachable", ErrorKind::NetworkError),
    ("eof", ErrorKind::NetworkError),
];

/// Classify a free-form error string (typically an exception's `Display`
/// output) into a normalized [`ErrorRecord`]. First match in
/// [`CLASSIFICATION_TABLE`] wins; anything unrecognized is a retryable
/// [`ErrorKind::NetworkError`], since an unclassified exception escaping a
/// page/browser operation is, empirically, almost always transient.
#[must_use]
pub fn normalize_error(message: impl Into<String>) -> ErrorRecord {
    let message = message.into();
    let haystack = message.to_lowercase();
    for (needle, kind) in CLASSIFICATION_TABLE {
        if haystack.contains(needle) {
            return ErrorRecord::new(message, *kind);
        }
    }
    ErrorRecord::new(message, ErrorKind::NetworkError)
}

/// Scan a body of text (page content or a response body) for any keyword in
/// an adapter's `errorText` set. Returns the first matching keyword.
#[must_use]
pub fn scan_error_keywords<'a>(haystack: &str, keywords: &'a [String]) -> Option<&'a str> {
    let haystack = haystack.to_lowercase();
    keywords
        .iter()
        .find(|kw| haystack.contains(&kw.to_lowercase()))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_before_network() {
        // "network timeout" contains both "timeout" and "network"; timeout
        // must win since it precedes the network bucket in the table.
        let record = normalize_error("network timeout while waiting for response");
        assert_eq!(record.code, ErrorKind::TimeoutError);
        assert!(record.retryable);
    }

    #[test]
    fn captcha_is_terminal() {
        let record = normalize_error("ReCAPTCHA validation failed for this request");
        assert_eq!(record.code, ErrorKind::CaptchaRequired);
        assert!(!record.retryable);
    }

    #[test]
    fn unclassified_falls_back_to_network_error() {
        let record = normalize_error("something completely unexpected happened");
        assert_eq!(record.code, ErrorKind::NetworkError);
        assert!(record.retryable);
    }

    #[test]
    fn http_5xx_is_retryable_4xx_is_not() {
        let server_err = classify_http_status(502, "bad gateway");
        assert_eq!(server_err.code, ErrorKind::HttpError);
        assert!(server_err.retryable);

        let client_err = classify_http_status(404, "not found");
        assert_eq!(client_err.code, ErrorKind::HttpError);
        assert!(!client_err.retryable);

        let rate_limited = classify_http_status(429, "slow down");
        assert_eq!(rate_limited.code, ErrorKind::RateLimited);
        assert!(rate_limited.retryable);
    }

    #[test]
    fn keyword_scan_is_case_insensitive() {
        let keywords = vec!["Content Policy Violation".to_string()];
        let found = scan_error_keywords("This message triggered a CONTENT POLICY VIOLATION warning", &keywords);
        assert_eq!(found, Some("Content Policy Violation"));
    }
}
