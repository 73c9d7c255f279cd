//! Groups Workers by shared browser profile, selects a candidate for a
//! model key, orders candidates by strategy, and drives failover
//! (component E).

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::adapter::{AdapterRegistry, GenerateMeta, GenerateOutcome, ImagePolicy};
use crate::error::ErrorRecord;
use crate::worker::Worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStrategy {
    LeastBusy,
    RoundRobin,
    Random,
}

pub struct PoolManager {
    workers: Vec<Arc<Worker>>,
    registry: Arc<AdapterRegistry>,
    strategy: PoolStrategy,
    failover_enabled: bool,
    max_retries: u32,
    round_robin_index: AtomicUsize,
}

impl PoolManager {
    #[must_use]
    pub fn new(
        workers: Vec<Arc<Worker>>,
        registry: Arc<AdapterRegistry>,
        strategy: PoolStrategy,
        failover_enabled: bool,
        max_retries: u32,
    ) -> Self {
        Self { workers, registry, strategy, failover_enabled, max_retries, round_robin_index: AtomicUsize::new(0) }
    }

    /// Filter by `supports(K)`, then — when the request carries images and
    /// at least two candidates remain — prefer candidates whose image
    /// policy isn't `forbidden`, falling back to the full set if that
    /// leaves nothing (logged at warn), per §4.3.
    fn candidates(&self, model_key: &str, has_images: bool) -> Vec<Arc<Worker>> {
        let supporting: Vec<Arc<Worker>> =
            self.workers.iter().filter(|w| w.supports(&self.registry, model_key)).cloned().collect();

        if !has_images || supporting.len() < 2 {
            return supporting;
        }

        let image_capable: Vec<Arc<Worker>> = supporting
            .iter()
            .filter(|w| !matches!(w.get_image_policy(&self.registry, model_key), Some(ImagePolicy::Forbidden)))
            .cloned()
            .collect();

        if image_capable.is_empty() {
            tracing::warn!(model = %model_key, "no image-capable worker for multimodal request, falling back to full candidate set");
            supporting
        } else {
            image_capable
        }
    }

    fn order(&self, mut candidates: Vec<Arc<Worker>>) -> Vec<Arc<Worker>> {
        match self.strategy {
            PoolStrategy::LeastBusy => {
                candidates.sort_by_key(|w| w.busy_count());
                candidates
            }
            PoolStrategy::RoundRobin => {
                if candidates.is_empty() {
                    return candidates;
                }
                let start = self.round_robin_index.fetch_add(1, Ordering::SeqCst) % candidates.len();
                candidates.rotate_left(start);
                candidates
            }
            PoolStrategy::Random => {
                let mut rng = rand::rng();
                candidates.shuffle(&mut rng);
                candidates
            }
        }
    }

    /// The loosest image policy across every Worker supporting `K`:
    /// `optional` wins if any Worker reports it, `forbidden` only if every
    /// supporting Worker reports `forbidden` (§4.3).
    #[must_use]
    pub fn get_image_policy(&self, model_key: &str) -> Option<ImagePolicy> {
        self.workers
            .iter()
            .filter_map(|w| w.get_image_policy(&self.registry, model_key))
            .reduce(ImagePolicy::loosest)
    }

    #[must_use]
    pub fn get_models(&self) -> Vec<crate::adapter::registry::ModelListEntry> {
        self.registry.list_models()
    }

    #[must_use]
    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Delegate to a named Worker, or the first Worker if `instance_name` is
    /// absent (§4.3).
    pub async fn get_cookies(&self, instance_name: Option<&str>, domain: Option<&str>) -> Option<Vec<crate::page::CookieRecord>> {
        let worker = match instance_name {
            Some(name) => self.workers.iter().find(|w| w.instance_name == name)?,
            None => self.workers.first()?,
        };
        Some(worker.get_cookies(domain).await)
    }

    /// Ask every idle `merge` Worker to keep its monitor tab current (§4.3).
    pub async fn navigate_to_monitor(&self) {
        for worker in &self.workers {
            if worker.busy_count() == 0 {
                if let Err(error) = worker.navigate_to_monitor().await {
                    tracing::warn!(worker = %worker.name, error = %error, "monitor navigation failed");
                }
            }
        }
    }

    /// Close every Worker's browser context. Called once, from the
    /// process shutdown hook, after the queue has drained.
    pub async fn close_all_pages(&self) {
        for worker in &self.workers {
            worker.close_page().await;
        }
    }

    /// Try candidates in strategy order, stopping at the first success, the
    /// first non-retryable error, or when the retry budget is exhausted.
    /// The retry budget is `min(max_retries, candidates.len() - 1)`; when
    /// failover is disabled only the first candidate runs.
    pub async fn dispatch(
        &self,
        model_key: &str,
        prompt: &str,
        image_refs: &[std::path::PathBuf],
        has_images: bool,
        meta: &GenerateMeta,
    ) -> GenerateOutcome {
        let candidates = self.order(self.candidates(model_key, has_images));
        if candidates.is_empty() {
            return GenerateOutcome::error(ErrorRecord::with_retryable(
                format!("no worker supports model {model_key}"),
                crate::error::ErrorKind::PageInvalid,
                false,
            ));
        }

        let budget = if self.failover_enabled {
            self.max_retries.min(candidates.len().saturating_sub(1) as u32)
        } else {
            0
        };

        let mut attempts = 0usize;
        let mut last = GenerateOutcome::default();
        for worker in candidates.iter().take(budget as usize + 1) {
            tracing::info!(worker = %worker.name, busy = worker.busy_count(), "dispatching to worker");
            let outcome = worker.generate(&self.registry, prompt, image_refs, model_key, meta).await;
            attempts += 1;
            let retryable = outcome.error.as_ref().is_some_and(|e| e.retryable);
            if let Some(error) = &outcome.error {
                tracing::warn!(worker = %worker.name, error = %error, "worker attempt failed");
            }
            last = outcome;
            if !retryable {
                break;
            }
        }
        debug_assert!(attempts >= 1);
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_serde_uses_snake_case() {
        let value = serde_json::to_string(&PoolStrategy::LeastBusy).unwrap();
        assert_eq!(value, "\"least_busy\"");
    }
}
