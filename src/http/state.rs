//! Shared server state handed to every route handler via `axum::State`.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::pool::PoolManager;
use crate::queue::QueueController;

/// What pool-init produced: a running pool, or the reason it failed.
///
/// Pool-init failure must not bring the HTTP server down (§7): the process
/// enters safe mode, where `/v1/*` uniformly returns 503 and the config/auth
/// surface still answers.
pub enum ServerMode {
    Ready { pool: Arc<PoolManager>, queue: Arc<QueueController> },
    SafeMode { reason: String },
}

pub struct AppState {
    pub mode: ServerMode,
    pub config: Arc<AppConfig>,
    pub temp_dir: PathBuf,
}

impl AppState {
    #[must_use]
    pub fn ready(pool: Arc<PoolManager>, queue: Arc<QueueController>, config: Arc<AppConfig>, temp_dir: PathBuf) -> Arc<Self> {
        Arc::new(Self { mode: ServerMode::Ready { pool, queue }, config, temp_dir })
    }

    #[must_use]
    pub fn safe_mode(reason: impl Into<String>, config: Arc<AppConfig>, temp_dir: PathBuf) -> Arc<Self> {
        Arc::new(Self { mode: ServerMode::SafeMode { reason: reason.into() }, config, temp_dir })
    }

    #[must_use]
    pub fn pool(&self) -> Option<&Arc<PoolManager>> {
        match &self.mode {
            ServerMode::Ready { pool, .. } => Some(pool),
            ServerMode::SafeMode { .. } => None,
        }
    }

    #[must_use]
    pub fn queue(&self) -> Option<&Arc<QueueController>> {
        match &self.mode {
            ServerMode::Ready { queue, .. } => Some(queue),
            ServerMode::SafeMode { .. } => None,
        }
    }

    #[must_use]
    pub fn safe_mode_reason(&self) -> Option<&str> {
        match &self.mode {
            ServerMode::SafeMode { reason } => Some(reason),
            ServerMode::Ready { .. } => None,
        }
    }
}
