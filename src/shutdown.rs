//! Process-level graceful shutdown: resources register a close routine,
//! `main` drains outstanding work and closes browser contexts in reverse
//! registration order once the process receives a termination signal.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::pool::PoolManager;
use crate::queue::QueueController;

pub type BoxFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// One resource with a close routine to run on shutdown.
pub trait ShutdownHook: Send + Sync {
    fn shutdown<'a>(&'a self) -> BoxFuture<'a>;
}

/// Hooks run in reverse registration order, the same unwind discipline
/// `CrawlEventBus::shutdown_gracefully`'s phased teardown follows for a
/// single resource, generalized here to a list.
#[derive(Default)]
pub struct ShutdownRegistry {
    hooks: Mutex<Vec<Arc<dyn ShutdownHook>>>,
}

impl ShutdownRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { hooks: Mutex::new(Vec::new()) }
    }

    pub async fn register(&self, hook: Arc<dyn ShutdownHook>) {
        self.hooks.lock().await.push(hook);
    }

    /// Run every registered hook's `shutdown`, most-recently-registered
    /// first. A hook that panics or hangs would stall the rest; none of
    /// the hooks registered by this crate do either.
    pub async fn run(&self) {
        let hooks = self.hooks.lock().await;
        for hook in hooks.iter().rev() {
            hook.shutdown().await;
        }
    }
}

/// Stop admitting new work and wait for the queue and processing set to
/// empty, capped at `drain_timeout` (mirroring the bounded drain heuristic
/// `shutdown_gracefully` uses rather than waiting unboundedly).
pub struct QueueDrainHook {
    pub queue: Arc<QueueController>,
    pub drain_timeout: Duration,
}

impl ShutdownHook for QueueDrainHook {
    fn shutdown<'a>(&'a self) -> BoxFuture<'a> {
        Box::pin(async move {
            tracing::info!("draining outstanding tasks before shutdown");
            let deadline = tokio::time::Instant::now() + self.drain_timeout;
            while !self.queue.is_idle() {
                if tokio::time::Instant::now() >= deadline {
                    tracing::warn!("queue did not drain within the shutdown timeout; closing anyway");
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            tracing::info!("queue drain complete");
        })
    }
}

/// Close every Worker's browser context, in pool order.
pub struct PoolCloseHook {
    pub pool: Arc<PoolManager>,
}

impl ShutdownHook for PoolCloseHook {
    fn shutdown<'a>(&'a self) -> BoxFuture<'a> {
        Box::pin(async move {
            tracing::info!("closing browser contexts");
            self.pool.close_all_pages().await;
        })
    }
}
