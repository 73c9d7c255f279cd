//! Adapter discovery, validation, and capability lookup.
//!
//! Filesystem-scan + dynamic-import discovery is replaced with a
//! compile-time registration function: callers hand the registry a
//! `Vec<Arc<dyn Adapter>>` built by `adapter::builtin()` style functions at
//! `init()`. Validation is tolerant — a bad manifest is logged and skipped,
//! the process continues with the rest.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Adapter, ImagePolicy, ModelDescriptor, validate_manifest};

/// A non-fatal problem found while registering an adapter.
#[derive(Debug, Clone)]
pub struct RegistryWarning {
    pub adapter_id: String,
    pub reason: String,
}

impl RegistryWarning {
    pub fn new(adapter_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { adapter_id: adapter_id.into(), reason: reason.into() }
    }
}

/// `backend.adapter.<id>.modelFilter` from the YAML config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelFilter {
    pub mode: ModelFilterMode,
    pub list: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFilterMode {
    Blacklist,
    Whitelist,
}

impl ModelFilter {
    #[must_use]
    pub fn allows(&self, model_id: &str) -> bool {
        let listed = self.list.iter().any(|id| id == model_id);
        match self.mode {
            ModelFilterMode::Blacklist => !listed,
            ModelFilterMode::Whitelist => listed,
        }
    }
}

/// One `/v1/models`-shaped row.
#[derive(Debug, Clone, Serialize)]
pub struct ModelListEntry {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub owned_by: String,
    pub image_policy: &'static str,
}

/// A resolved `(adapterId, internalId)` pair plus the policy governing it.
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    pub adapter_id: String,
    pub internal_id: String,
    pub image_policy: ImagePolicy,
}

pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn Adapter>>,
    /// Preserves registration order for the aggregate model list and for
    /// "search every adapter's model list" resolution (§4.1).
    order: Vec<String>,
    model_filters: HashMap<String, ModelFilter>,
    warnings: Vec<RegistryWarning>,
}

impl AdapterRegistry {
    /// Build a registry from a fixed set of adapters, validating each per
    /// §4.1. Rejected adapters are recorded in `warnings()` and excluded.
    #[must_use]
    pub fn new(candidates: Vec<Arc<dyn Adapter>>, model_filters: HashMap<String, ModelFilter>) -> Self {
        let mut adapters = HashMap::new();
        let mut order = Vec::new();
        let mut warnings = Vec::new();

        for adapter in candidates {
            match validate_manifest(adapter.as_ref()) {
                Ok(()) => {
                    let id = adapter.id().to_string();
                    if adapters.contains_key(&id) {
                        warnings.push(RegistryWarning::new(&id, "duplicate adapter id, keeping first"));
                        continue;
                    }
                    order.push(id.clone());
                    adapters.insert(id, adapter);
                }
                Err(warning) => {
                    tracing::warn!(adapter = %warning.adapter_id, reason = %warning.reason, "rejecting adapter manifest");
                    warnings.push(warning);
                }
            }
        }

        Self { adapters, order, model_filters, warnings }
    }

    #[must_use]
    pub fn warnings(&self) -> &[RegistryWarning] {
        &self.warnings
    }

    #[must_use]
    pub fn get(&self, adapter_id: &str) -> Option<&Arc<dyn Adapter>> {
        self.adapters.get(adapter_id)
    }

    #[must_use]
    pub fn adapter_ids(&self) -> &[String] {
        &self.order
    }

    fn model_visible(&self, adapter_id: &str, model: &ModelDescriptor) -> bool {
        match self.model_filters.get(adapter_id) {
            Some(filter) => filter.allows(&model.id),
            None => true,
        }
    }

    /// Resolve a client-facing model key per §4.1: `adapterId/modelId`
    /// restricts the search to that adapter; otherwise every adapter's
    /// model list is searched in registration order.
    #[must_use]
    pub fn resolve(&self, model_key: &str) -> Option<ResolvedModel> {
        if let Some((adapter_id, model_id)) = model_key.split_once('/') {
            let adapter = self.adapters.get(adapter_id)?;
            let model = adapter.models().iter().find(|m| m.id == model_id)?;
            if !self.model_visible(adapter_id, model) {
                return None;
            }
            return Some(ResolvedModel {
                adapter_id: adapter_id.to_string(),
                internal_id: model.internal_id().to_string(),
                image_policy: model.image_policy,
            });
        }

        for adapter_id in &self.order {
            let adapter = &self.adapters[adapter_id];
            if let Some(model) = adapter.models().iter().find(|m| m.id == model_key) {
                if !self.model_visible(adapter_id, model) {
                    continue;
                }
                return Some(ResolvedModel {
                    adapter_id: adapter_id.clone(),
                    internal_id: model.internal_id().to_string(),
                    image_policy: model.image_policy,
                });
            }
        }
        None
    }

    /// The aggregate `/v1/models`-shaped list across every registered
    /// adapter, respecting each adapter's model filter.
    #[must_use]
    pub fn list_models(&self) -> Vec<ModelListEntry> {
        let mut out = Vec::new();
        for adapter_id in &self.order {
            let adapter = &self.adapters[adapter_id];
            for model in adapter.models() {
                if !self.model_visible(adapter_id, model) {
                    continue;
                }
                out.push(ModelListEntry {
                    id: model.id.clone(),
                    object: "model",
                    created: 0,
                    owned_by: adapter_id.clone(),
                    image_policy: model.image_policy.as_str(),
                });
            }
        }
        out
    }
}
