//! The adapter contract and the types a manifest is built from.
//!
//! An adapter is a driver for one target site. The core never embeds
//! site-specific selectors or UI logic; it only calls through this contract.

pub mod registry;

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ErrorRecord;
use crate::page::PageHandle;

pub use registry::{AdapterRegistry, RegistryWarning};

/// Whether a model accepts, demands, or rejects image inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImagePolicy {
    Optional,
    Required,
    Forbidden,
}

impl ImagePolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Optional => "optional",
            Self::Required => "required",
            Self::Forbidden => "forbidden",
        }
    }

    /// The loosest of two policies, used when aggregating across workers
    /// that all support the same model key (§4.3: "the admission layer
    /// should permit an image if any worker could serve it").
    #[must_use]
    pub fn loosest(self, other: Self) -> Self {
        use ImagePolicy::{Forbidden, Optional, Required};
        match (self, other) {
            (Optional, _) | (_, Optional) => Optional,
            (Required, _) | (_, Required) => Required,
            (Forbidden, Forbidden) => Forbidden,
        }
    }
}

/// One model an adapter exposes.
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    /// Public name, as sent by clients in the `model` field.
    pub id: String,
    /// Internal/site-specific identifier. Falls back to `id` when absent.
    pub code_name: Option<String>,
    pub image_policy: ImagePolicy,
    /// Adapter-private tags, e.g. `search=true`, `thinking=true`, `imageSize=1024`.
    pub tags: HashMap<String, serde_json::Value>,
}

impl ModelDescriptor {
    #[must_use]
    pub fn new(id: impl Into<String>, image_policy: ImagePolicy) -> Self {
        Self { id: id.into(), code_name: None, image_policy, tags: HashMap::new() }
    }

    #[must_use]
    pub fn with_code_name(mut self, code_name: impl Into<String>) -> Self {
        self.code_name = Some(code_name.into());
        self
    }

    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// The internal id the adapter's `generate` should receive.
    #[must_use]
    pub fn internal_id(&self) -> &str {
        self.code_name.as_deref().unwrap_or(&self.id)
    }
}

/// Per-instance/per-worker configuration an adapter's `target_url` may need
/// (distinct from per-adapter config, which lives in `AdapterRegistry`).
#[derive(Debug, Clone, Default)]
pub struct WorkerTargetParams {
    pub instance_name: String,
    pub worker_name: String,
}

/// Metadata passed alongside a generate call, for logging/correlation.
#[derive(Debug, Clone, Default)]
pub struct GenerateMeta {
    pub request_id: String,
}

/// The context a `generate` call runs in: the bound page, config, and the
/// owning worker's private settings (§4.2: "a context view that exposes the
/// page, the global config, the worker's proxy config, and the worker's
/// user-data dir").
pub struct GenerateContext<'a> {
    pub page: &'a PageHandle,
    pub worker_name: &'a str,
    pub instance_name: &'a str,
    pub user_data_dir: &'a std::path::Path,
    pub proxy: Option<&'a str>,
}

/// What a successful (or failed) `generate` call produced.
#[derive(Debug, Clone, Default)]
pub struct GenerateOutcome {
    pub image: Option<String>,
    pub text: Option<String>,
    pub error: Option<ErrorRecord>,
}

impl GenerateOutcome {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Default::default() }
    }

    #[must_use]
    pub fn image(image_ref: impl Into<String>) -> Self {
        Self { image: Some(image_ref.into()), ..Default::default() }
    }

    #[must_use]
    pub fn error(record: ErrorRecord) -> Self {
        Self { error: Some(record), ..Default::default() }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An async function observed on every frame navigation. Handlers are
/// idempotent and cooperate through the per-page auth lock (§4.8).
pub trait NavigationHandler: Send + Sync {
    fn on_navigate<'a>(&'a self, page: &'a PageHandle, url: &'a str) -> BoxFuture<'a, ()>;
}

/// Waits for the adapter's input surface to become ready, backing off while
/// the per-page auth lock is held.
pub trait InputReadinessProbe: Send + Sync {
    fn wait_ready<'a>(&'a self, page: &'a PageHandle) -> BoxFuture<'a, Result<(), ErrorRecord>>;
}

/// A site driver: the contract §4.1 imposes on every adapter.
pub trait Adapter: Send + Sync {
    fn id(&self) -> &str;
    fn display_name(&self) -> &str;
    fn models(&self) -> &[ModelDescriptor];
    fn navigation_handlers(&self) -> &[Arc<dyn NavigationHandler>];
    fn input_readiness_probe(&self) -> Option<&Arc<dyn InputReadinessProbe>> {
        None
    }
    fn target_url(&self, params: &WorkerTargetParams) -> Result<Url, ErrorRecord>;

    /// Run one generation. Must never throw through the pool boundary for
    /// expected failures (return `GenerateOutcome::error` instead); an
    /// escaping panic/exception is the worker's job to normalize, not the
    /// adapter's.
    fn generate<'a>(
        &'a self,
        ctx: &'a GenerateContext<'a>,
        prompt: &'a str,
        image_refs: &'a [PathBuf],
        model_id: &'a str,
        meta: &'a GenerateMeta,
    ) -> BoxFuture<'a, GenerateOutcome>;
}

/// The adapter set this process links in. Concrete site drivers (chatgpt,
/// gemini, claude, ...) live in a downstream crate that also implements
/// [`crate::page::PageEvents`] against a real browser — out of scope here,
/// per the orchestration core's own boundary. Empty until such a crate is
/// wired in; a process with no adapters runs in safe mode (§7).
#[must_use]
pub fn builtin() -> Vec<Arc<dyn Adapter>> {
    Vec::new()
}

/// Resolve a model descriptor by id or code name within one adapter.
#[must_use]
pub fn find_model<'a>(models: &'a [ModelDescriptor], model_id: &str) -> Option<&'a ModelDescriptor> {
    models.iter().find(|m| m.id == model_id)
}

/// Validate an adapter against the rules in §4.1: missing id, missing
/// `generate` (structurally guaranteed by the trait, so only the
/// data-level checks apply here), missing models, any model missing an id
/// (structurally guaranteed by `ModelDescriptor::id: String`, checked here
/// for emptiness), and any unrecognized image policy (structurally
/// guaranteed by the closed `ImagePolicy` enum).
pub fn validate_manifest(adapter: &dyn Adapter) -> Result<(), RegistryWarning> {
    if adapter.id().trim().is_empty() {
        return Err(RegistryWarning::new("<unknown>", "adapter id is empty"));
    }
    if adapter.models().is_empty() {
        return Err(RegistryWarning::new(adapter.id(), "adapter exposes no models"));
    }
    let mut seen = std::collections::HashSet::new();
    for model in adapter.models() {
        if model.id.trim().is_empty() {
            return Err(RegistryWarning::new(adapter.id(), "a model is missing an id"));
        }
        if !seen.insert(model.id.as_str()) {
            return Err(RegistryWarning::new(
                adapter.id(),
                format!("duplicate model id '{}'", model.id),
            ));
        }
    }
    Ok(())
}
