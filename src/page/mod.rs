//! The page-interaction contract (component H): the surface adapters
//! require and the only thing an `Adapter::generate` call may suspend on.
//!
//! The core defines this contract; a browser layer outside this crate
//! implements [`PageEvents`] against a real page (chromiumoxide or
//! otherwise). Everything in this module is browser-agnostic.

pub mod api_waiter;
pub mod auth_lock;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

pub use api_waiter::{ApiResponse, ApiWaitSpec, DEFAULT_API_TIMEOUT, wait_for_api_response};
pub use auth_lock::{AuthLock, PageAuthLocks};

use crate::error::{ErrorKind, ErrorRecord};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One cookie as returned by the browser context's cookie API.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
}

/// Identifies one page for the lifetime of the process. Workers hand these
/// out when they register a page; they are never reused after a page dies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(u64);

impl PageId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// What a browser layer must expose for the core to drive navigation,
/// wait for API responses, and keep the mouse off dangerous content —
/// the three primitives named in the page-interaction contract besides the
/// auth lock, which the core implements itself (see [`AuthLock`]).
pub trait PageEvents: Send + Sync {
    /// Resolves once, the moment the page closes. Never resolves otherwise.
    fn closed<'a>(&'a self) -> BoxFuture<'a, ()>;
    /// Resolves once, the moment the page's renderer crashes.
    fn crashed<'a>(&'a self) -> BoxFuture<'a, ()>;
    /// Navigate with a domcontentloaded condition; returns the observed
    /// HTTP status, or an error if navigation itself failed.
    fn navigate<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<u16, ErrorRecord>>;
    /// Wait for the first response matching `spec`'s URL/method predicate.
    fn await_response<'a>(&'a self, spec: &'a ApiWaitSpec) -> BoxFuture<'a, Result<ApiResponse, ErrorRecord>>;
    /// Current page text content, for `errorText` keyword scanning.
    fn page_text<'a>(&'a self) -> BoxFuture<'a, String>;
    /// Move the cursor to a safe off-content region.
    fn move_mouse_away<'a>(&'a self) -> BoxFuture<'a, ()>;
    /// Read cookies from the page's browser context, optionally filtered to
    /// one domain. Cookie operations go through the context API, shared by
    /// every Worker on the same `userDataDir` (§5).
    fn cookies<'a>(&'a self, domain: Option<&'a str>) -> BoxFuture<'a, Vec<CookieRecord>>;
    /// Close the underlying browser context. Called once, on process
    /// shutdown. The default does nothing — a browser layer with a real
    /// context to release overrides it.
    fn close<'a>(&'a self) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }
}

/// A Worker's bound page: identity, the event/driving surface, and its
/// private auth lock. Owned exclusively by one Worker for the process
/// lifetime — never shared, never cloned into another Worker.
pub struct PageHandle {
    id: PageId,
    events: Arc<dyn PageEvents>,
    auth_lock: Arc<AuthLock>,
}

impl PageHandle {
    #[must_use]
    pub fn new(id: PageId, events: Arc<dyn PageEvents>, auth_lock: Arc<AuthLock>) -> Self {
        Self { id, events, auth_lock }
    }

    #[must_use]
    pub fn id(&self) -> PageId {
        self.id
    }

    /// Navigate and treat any status ≥ 400 as a fatal, non-retryable
    /// adapter error — this is the "load condition" adapters call before
    /// doing anything else on a fresh page.
    pub async fn navigate_with_check(&self, url: &str, timeout: Duration) -> Result<(), ErrorRecord> {
        let status = match tokio::time::timeout(timeout, self.events.navigate(url)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ErrorRecord::new(
                    format!("navigation to {url} timed out after {timeout:?}"),
                    ErrorKind::TimeoutError,
                ));
            }
        };
        if status >= 400 {
            return Err(ErrorRecord::with_retryable(
                format!("navigation to {url} returned HTTP {status}"),
                ErrorKind::HttpError,
                status >= 500,
            ));
        }
        Ok(())
    }

    pub async fn wait_for_api_response(&self, spec: &ApiWaitSpec) -> Result<ApiResponse, ErrorRecord> {
        wait_for_api_response(self.events.as_ref(), spec).await
    }

    pub async fn move_mouse_away(&self) {
        self.events.move_mouse_away().await;
    }

    pub async fn cookies(&self, domain: Option<&str>) -> Vec<CookieRecord> {
        self.events.cookies(domain).await
    }

    pub fn lock(&self) {
        self.auth_lock.lock();
    }

    pub fn unlock(&self) {
        self.auth_lock.unlock();
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.auth_lock.is_locked()
    }

    pub async fn wait_until_unlocked(&self) {
        self.auth_lock.wait_until_unlocked().await;
    }

    pub async fn close(&self) {
        self.events.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysOkEvents;

    impl PageEvents for AlwaysOkEvents {
        fn closed<'a>(&'a self) -> BoxFuture<'a, ()> {
            Box::pin(std::future::pending())
        }
        fn crashed<'a>(&'a self) -> BoxFuture<'a, ()> {
            Box::pin(std::future::pending())
        }
        fn navigate<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, Result<u16, ErrorRecord>> {
            Box::pin(async { Ok(404) })
        }
        fn await_response<'a>(&'a self, _spec: &'a ApiWaitSpec) -> BoxFuture<'a, Result<ApiResponse, ErrorRecord>> {
            Box::pin(async { Ok(ApiResponse { status: 200, body: String::new() }) })
        }
        fn page_text<'a>(&'a self) -> BoxFuture<'a, String> {
            Box::pin(async { String::new() })
        }
        fn move_mouse_away<'a>(&'a self) -> BoxFuture<'a, ()> {
            Box::pin(async {})
        }
        fn cookies<'a>(&'a self, _domain: Option<&'a str>) -> BoxFuture<'a, Vec<CookieRecord>> {
            Box::pin(async { Vec::new() })
        }
    }

    #[tokio::test]
    async fn navigation_404_is_non_retryable_http_error() {
        let handle = PageHandle::new(PageId::new(1), Arc::new(AlwaysOkEvents), AuthLock::new());
        let err = handle
            .navigate_with_check("https://example.invalid", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorKind::HttpError);
        assert!(!err.retryable);
    }
}
