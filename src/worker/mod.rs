//! One browser page bound to one adapter, or a `merge` set sharing a tab
//! (component D). A Worker owns its page exclusively for the process
//! lifetime; the pool only ever sees it through this contract.

pub mod health;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::adapter::{AdapterRegistry, GenerateContext, GenerateMeta, GenerateOutcome, ImagePolicy};
use crate::error::{ErrorKind, ErrorRecord};
use crate::page::PageHandle;
use health::WorkerHealth;

/// What a Worker drives: a single adapter, or an ordered `merge` set that
/// shares one profile/tab with an optional monitor page.
#[derive(Debug, Clone)]
pub enum WorkerKind {
    Single(String),
    Merge { types: Vec<String>, monitor: Option<String> },
}

impl WorkerKind {
    fn candidate_ids(&self) -> &[String] {
        match self {
            Self::Single(id) => std::slice::from_ref(id),
            Self::Merge { types, .. } => types,
        }
    }
}

/// RAII guard releasing a Worker's busy count on every exit path, the same
/// shape as an owned semaphore permit.
pub struct BusyGuard<'a> {
    busy_count: &'a AtomicU32,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.busy_count.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct Worker {
    pub name: String,
    pub kind: WorkerKind,
    pub instance_name: String,
    pub user_data_dir: PathBuf,
    pub proxy_config: Option<String>,
    page: PageHandle,
    busy_count: AtomicU32,
    health: std::sync::Mutex<WorkerHealth>,
}

impl Worker {
    #[must_use]
    pub fn new(
        name: String,
        kind: WorkerKind,
        instance_name: String,
        user_data_dir: PathBuf,
        proxy_config: Option<String>,
        page: PageHandle,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            kind,
            instance_name,
            user_data_dir,
            proxy_config,
            page,
            busy_count: AtomicU32::new(0),
            health: std::sync::Mutex::new(WorkerHealth::new()),
        })
    }

    #[must_use]
    pub fn busy_count(&self) -> u32 {
        self.busy_count.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn health(&self) -> WorkerHealth {
        self.health.lock().expect("health mutex poisoned").clone()
    }

    #[must_use]
    pub fn page(&self) -> &PageHandle {
        &self.page
    }

    /// Close this Worker's browser context. Called once per Worker on
    /// process shutdown, never during normal dispatch.
    pub async fn close_page(&self) {
        self.page.close().await;
    }

    /// Whether this Worker can serve `model_key`, per §4.2's merge rules: a
    /// `type/model` prefix forces one member adapter, otherwise any member
    /// adapter resolving the bare key qualifies.
    #[must_use]
    pub fn supports(&self, registry: &AdapterRegistry, model_key: &str) -> bool {
        self.resolve_model(registry, model_key).is_some()
    }

    #[must_use]
    pub fn resolve_model(&self, registry: &AdapterRegistry, model_key: &str) -> Option<crate::adapter::registry::ResolvedModel> {
        let candidates = self.kind.candidate_ids();
        if let Some((prefix, _)) = model_key.split_once('/') {
            if !candidates.iter().any(|id| id == prefix) {
                return None;
            }
            return registry.resolve(model_key);
        }
        for adapter_id in candidates {
            if let Some(resolved) = registry.resolve(&format!("{adapter_id}/{model_key}")) {
                return Some(resolved);
            }
        }
        None
    }

    #[must_use]
    pub fn get_image_policy(&self, registry: &AdapterRegistry, model_key: &str) -> Option<ImagePolicy> {
        self.resolve_model(registry, model_key).map(|r| r.image_policy)
    }

    #[must_use]
    pub fn get_models(&self, registry: &AdapterRegistry) -> Vec<crate::adapter::registry::ModelListEntry> {
        registry
            .list_models()
            .into_iter()
            .filter(|m| self.kind.candidate_ids().iter().any(|id| id == &m.owned_by))
            .collect()
    }

    pub async fn get_cookies(&self, domain: Option<&str>) -> Vec<crate::page::CookieRecord> {
        self.page.cookies(domain).await
    }

    /// Navigate the monitor page for a `merge` Worker with `mergeMonitor`
    /// set. A no-op for every other Worker kind.
    pub async fn navigate_to_monitor(&self) -> Result<(), ErrorRecord> {
        match &self.kind {
            WorkerKind::Merge { monitor: Some(_), .. } => {
                // The monitor page itself is owned by the browser layer;
                // the core only needs the no-op/contract shape here since
                // real navigation is out of this crate's scope.
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Run one generation. Resolves the model, tracks `busy_count` across
    /// the call, and normalizes any adapter panic/error boundary escape.
    pub async fn generate(
        &self,
        registry: &AdapterRegistry,
        prompt: &str,
        image_refs: &[PathBuf],
        model_key: &str,
        meta: &GenerateMeta,
    ) -> GenerateOutcome {
        let Some(resolved) = self.resolve_model(registry, model_key) else {
            return GenerateOutcome::error(ErrorRecord::with_retryable(
                format!("worker '{}' cannot resolve model '{model_key}'", self.name),
                ErrorKind::PageInvalid,
                false,
            ));
        };
        let Some(adapter) = registry.get(&resolved.adapter_id) else {
            return GenerateOutcome::error(ErrorRecord::with_retryable(
                format!("adapter '{}' vanished from the registry", resolved.adapter_id),
                ErrorKind::PageInvalid,
                false,
            ));
        };

        self.busy_count.fetch_add(1, Ordering::SeqCst);
        let _guard = BusyGuard { busy_count: &self.busy_count };

        let ctx = GenerateContext {
            page: &self.page,
            worker_name: &self.name,
            instance_name: &self.instance_name,
            user_data_dir: &self.user_data_dir,
            proxy: self.proxy_config.as_deref(),
        };

        let outcome = adapter.generate(&ctx, prompt, image_refs, &resolved.internal_id, meta).await;

        let mut health = self.health.lock().expect("health mutex poisoned");
        match &outcome.error {
            Some(_) => health.record_error(),
            None => health.record_success(),
        }
        drop(health);

        outcome
    }
}
