//! Task admission and the single-flight-per-worker concurrency cap
//! (component F). `MaxConcurrent` equals the Worker count; a `tokio::sync::
//! Semaphore` sized to that count both enforces the cap and gives FIFO
//! ordering among waiters for free, the same discipline
//! `crawl_engine::orchestrator`'s dispatch loop used around its own
//! concurrency permits.

pub mod heartbeat;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// One request admitted into the queue, carrying everything `processTask`
/// needs plus its temp-file cleanup obligation.
pub struct Task {
    pub request_id: String,
    pub prompt: String,
    pub image_refs: Vec<std::path::PathBuf>,
    pub model_key: String,
    pub streaming: bool,
}

impl Drop for Task {
    fn drop(&mut self) {
        for path in &self.image_refs {
            if let Err(error) = std::fs::remove_file(path) {
                if error.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %error, "failed to remove task temp file");
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerBusy;

/// Proof that a non-streaming task passed [`QueueController::try_admit_non_streaming`];
/// consumed by [`QueueController::acquire_admitted`] so a task can't hold a
/// processing slot without having been counted by the admission check first.
pub struct AdmissionTicket(());

/// Owns the concurrency permit for exactly the lifetime of one task, plus
/// the shared `admitted` count the task was included in from admission
/// until this guard drops.
pub struct QueueGuard {
    _permit: OwnedSemaphorePermit,
    admitted: Arc<AtomicUsize>,
}

impl Drop for QueueGuard {
    fn drop(&mut self) {
        self.admitted.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct QueueController {
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    queue_buffer: u32,
    /// `processingCount + queueLen` combined into one counter: every task
    /// counts from the moment it is admitted until its `QueueGuard` drops,
    /// whether it's still waiting for a permit or actively processing.
    admitted: Arc<AtomicUsize>,
}

impl QueueController {
    #[must_use]
    pub fn new(max_concurrent: usize, queue_buffer: u32) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            queue_buffer,
            admitted: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn effective_queue_size(&self) -> usize {
        self.max_concurrent + self.queue_buffer as usize
    }

    /// Whether the queue and processing set are both empty, the idle signal
    /// that should trigger `pool.navigate_to_monitor()`.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.admitted.load(Ordering::SeqCst) == 0
    }

    /// Non-streaming admission: reject with `SERVER_BUSY` when
    /// `processingCount + queueLen` is already at `effectiveQueueSize`.
    /// The check and the reservation it grants are one atomic
    /// compare-and-swap, so two concurrent callers can't both observe room
    /// for the last slot and both claim it.
    pub fn try_admit_non_streaming(&self) -> Result<AdmissionTicket, ServerBusy> {
        let limit = self.effective_queue_size();
        let mut current = self.admitted.load(Ordering::SeqCst);
        loop {
            if current >= limit {
                return Err(ServerBusy);
            }
            match self.admitted.compare_exchange_weak(current, current + 1, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => return Ok(AdmissionTicket(())),
                Err(actual) => current = actual,
            }
        }
    }

    /// Acquire a processing slot for a task already counted by
    /// `try_admit_non_streaming`. Waits in FIFO order if every Worker is
    /// busy.
    pub async fn acquire_admitted(&self, _ticket: AdmissionTicket) -> QueueGuard {
        let permit = self.permits.clone().acquire_owned().await.expect("queue semaphore is never closed");
        QueueGuard { _permit: permit, admitted: Arc::clone(&self.admitted) }
    }

    /// Acquire a processing slot unconditionally. Streaming callers skip
    /// `try_admit_non_streaming` and call this directly — streaming
    /// admission is unconditional, but the task still counts toward
    /// `admitted` so a concurrent non-streaming admission check sees it.
    pub async fn acquire(&self) -> QueueGuard {
        self.admitted.fetch_add(1, Ordering::SeqCst);
        let permit = self.permits.clone().acquire_owned().await.expect("queue semaphore is never closed");
        QueueGuard { _permit: permit, admitted: Arc::clone(&self.admitted) }
    }
}
