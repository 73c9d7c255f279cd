//! The API-response waiter: the core's half of §4.8's timeout/page-death/
//! error-keyword race, wrapped the way `with_page_timeout` wraps page
//! operations — the browser layer supplies a [`PageEvents`] implementation,
//! the race itself lives here.

use std::time::Duration;

use crate::error::{ErrorKind, ErrorRecord, scan_error_keywords};

use super::PageEvents;

/// Parameters for one `wait_for_api_response` call.
#[derive(Debug, Clone)]
pub struct ApiWaitSpec {
    pub url_match: String,
    pub url_contains: Vec<String>,
    pub method: String,
    pub timeout: Duration,
    pub error_text: Vec<String>,
}

impl ApiWaitSpec {
    #[must_use]
    pub fn new(url_match: impl Into<String>, method: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url_match: url_match.into(),
            url_contains: Vec::new(),
            method: method.into(),
            timeout,
            error_text: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_url_contains(mut self, patterns: Vec<String>) -> Self {
        self.url_contains = patterns;
        self
    }

    #[must_use]
    pub fn with_error_text(mut self, keywords: Vec<String>) -> Self {
        self.error_text = keywords;
        self
    }
}

/// Default API waiter timeout, per the concurrency model: "every waiter
/// carries an explicit timeout (default 120s, adapter-tunable)".
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(120);

/// A matched response, with the body cached so the adapter can re-read
/// `.text()`/`.json()`/`.body()` cheaply.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    #[must_use]
    pub fn text(&self) -> &str {
        &self.body
    }

    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Race a matching response against page close, page crash, a keyword scan
/// (when `spec.error_text` is non-empty), and the explicit timeout. First
/// event to resolve wins; every branch maps to the error codes §4.8 names.
pub async fn wait_for_api_response(events: &dyn PageEvents, spec: &ApiWaitSpec) -> Result<ApiResponse, ErrorRecord> {
    let scan_keywords = spec.error_text.clone();
    let keyword_scan = async {
        if scan_keywords.is_empty() {
            std::future::pending::<String>().await
        } else {
            loop {
                let text = events.page_text().await;
                if let Some(hit) = scan_error_keywords(&text, &scan_keywords) {
                    return hit.to_string();
                }
                tokio::time::sleep(Duration::from_millis(750)).await;
            }
        }
    };

    tokio::select! {
        biased;

        () = events.closed() => {
            Err(ErrorRecord::new("page closed while waiting for API response", ErrorKind::PageClosed))
        }
        () = events.crashed() => {
            Err(ErrorRecord::new("page crashed while waiting for API response", ErrorKind::PageCrashed))
        }
        keyword = keyword_scan => {
            Err(ErrorRecord::with_retryable(
                format!("PAGE_ERROR_DETECTED:{keyword}"),
                ErrorKind::ContentBlocked,
                false,
            ))
        }
        result = events.await_response(spec) => {
            let response = result?;
            if !spec.error_text.is_empty() {
                if let Some(keyword) = scan_error_keywords(&response.body, &spec.error_text) {
                    return Err(ErrorRecord::with_retryable(
                        format!("API_ERROR_DETECTED:{keyword}"),
                        ErrorKind::ContentBlocked,
                        false,
                    ));
                }
            }
            Ok(response)
        }
        () = tokio::time::sleep(spec.timeout) => {
            Err(ErrorRecord::new(
                format!("API_TIMEOUT: no response matching '{}' within {:?}", spec.url_match, spec.timeout),
                ErrorKind::TimeoutError,
            ))
        }
    }
}
