//! Per-page auth lock: a boolean "interactive login in progress" flag.
//!
//! Grounded on `DomainLimiter`'s `DashMap<String, Arc<Semaphore>>` lazy-entry
//! pattern, swapping the counting semaphore for a notify+flag pair since this
//! guards a single boolean, not a pool of permits.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tokio::sync::Notify;

use super::PageId;

/// A condition-variable-shaped lock: `lock`/`unlock` set or clear the flag,
/// `wait_until_unlocked` parks on a `Notify` and wakes on every `unlock`,
/// falling back to a bounded poll so a missed notification can't wedge a
/// waiter forever.
pub struct AuthLock {
    locked: AtomicBool,
    notify: Notify,
}

impl AuthLock {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self { locked: AtomicBool::new(false), notify: Notify::new() })
    }

    pub fn lock(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }

    pub fn unlock(&self) {
        self.locked.store(false, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    /// Blocks until the lock is clear. Races a `Notify` wakeup against a
    /// 750ms poll, the midpoint of a 500-1000ms fallback band, so a
    /// notification sent between a waiter's check and its `notified()` call
    /// is never missed outright.
    pub async fn wait_until_unlocked(&self) {
        loop {
            if !self.is_locked() {
                return;
            }
            let notified = self.notify.notified();
            tokio::select! {
                () = notified => {}
                () = tokio::time::sleep(std::time::Duration::from_millis(750)) => {}
            }
        }
    }
}

impl Default for AuthLock {
    fn default() -> Self {
        Self { locked: AtomicBool::new(false), notify: Notify::new() }
    }
}

/// One lock per page, created lazily on first lookup. Each page is owned
/// exclusively by one Worker, so entries never see cross-page contention;
/// the map exists only so a page's lock outlives any single borrow of its
/// `PageHandle` and can be looked up again by id (e.g. from a navigation
/// handler callback invoked by the browser layer).
#[derive(Default)]
pub struct PageAuthLocks {
    locks: DashMap<PageId, Arc<AuthLock>>,
}

impl PageAuthLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get_or_create(&self, page: PageId) -> Arc<AuthLock> {
        self.locks.entry(page).or_insert_with(AuthLock::new).clone()
    }

    pub fn remove(&self, page: PageId) {
        self.locks.remove(&page);
    }
}
