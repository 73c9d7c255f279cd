//! Typed configuration surface, loaded from YAML (§6). Cross-field
//! invariants live in [`AppConfig::validate`] rather than a typestate
//! builder, since every field here is known up front from one file instead
//! of being assembled incrementally across call sites.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::adapter::registry::{ModelFilter, ModelFilterMode};
use crate::pool::PoolStrategy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub queue: QueueConfig,
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// Bearer token compared against `Authorization: Bearer <token>`. `None`
    /// disables auth entirely (local/dev use).
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub keepalive: KeepaliveConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeepaliveMode {
    Comment,
    Content,
}

impl Default for KeepaliveMode {
    fn default() -> Self {
        Self::Comment
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct KeepaliveConfig {
    #[serde(default)]
    pub mode: KeepaliveMode,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Additional buffer beyond `MaxConcurrent` for non-streaming admission.
    /// 0 means no buffer — reject as soon as every Worker is busy.
    pub queue_buffer: u32,
    /// Hard cap on images accepted per request before the ≤10 silent-drop
    /// rule in the request parser kicks in.
    pub image_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub pool: PoolConfig,
    #[serde(default)]
    pub adapter: HashMap<String, AdapterConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub strategy: PoolStrategy,
    #[serde(default)]
    pub failover: FailoverConfig,
    pub instances: Vec<InstanceConfig>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FailoverConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

const fn default_true() -> bool {
    true
}

const fn default_max_retries() -> u32 {
    2
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self { enabled: true, max_retries: 2 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub name: String,
    /// Resolves to `data/userData_<mark>` on disk.
    pub user_data_mark: String,
    #[serde(default)]
    pub proxy: Option<String>,
    pub workers: Vec<WorkerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerConfig {
    Single {
        name: String,
        #[serde(rename = "type")]
        adapter_type: String,
    },
    Merge {
        name: String,
        #[serde(rename = "type")]
        merge_marker: MergeMarker,
        merge_types: Vec<String>,
        #[serde(default)]
        merge_monitor: Option<String>,
    },
}

/// Forces the `"type": "merge"` tag to be matched literally in the untagged
/// `WorkerConfig` enum above.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMarker {
    Merge,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdapterConfig {
    #[serde(default)]
    pub model_filter: Option<ModelFilter>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A configuration problem found by [`AppConfig::validate`]. The caller
/// exits with code 78 on any of these, per §6's "fatal at load time" rule.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("queue.image_limit must be greater than zero")]
    ZeroImageLimit,
    #[error("backend.pool.instances is empty — at least one instance is required")]
    NoInstances,
    #[error("worker name '{0}' is used more than once across instances")]
    DuplicateWorkerName(String),
    #[error("instance name '{0}' is used more than once")]
    DuplicateInstanceName(String),
    #[error("instance '{0}' declares no workers")]
    EmptyInstance(String),
    #[error("worker '{0}' is a merge type but lists no merge_types")]
    EmptyMergeTypes(String),
}

impl AppConfig {
    /// Cross-field invariants the type system alone can't express, mirroring
    /// the style of checks a builder performs at its terminal `build()`
    /// step: uniqueness across a flattened collection, non-emptiness of a
    /// list that's only meaningful when populated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.image_limit == 0 {
            return Err(ConfigError::ZeroImageLimit);
        }
        if self.backend.pool.instances.is_empty() {
            return Err(ConfigError::NoInstances);
        }

        let mut seen_instances = std::collections::HashSet::new();
        let mut seen_workers = std::collections::HashSet::new();
        for instance in &self.backend.pool.instances {
            if !seen_instances.insert(instance.name.clone()) {
                return Err(ConfigError::DuplicateInstanceName(instance.name.clone()));
            }
            if instance.workers.is_empty() {
                return Err(ConfigError::EmptyInstance(instance.name.clone()));
            }
            for worker in &instance.workers {
                let name = match worker {
                    WorkerConfig::Single { name, .. } | WorkerConfig::Merge { name, .. } => name,
                };
                if !seen_workers.insert(name.clone()) {
                    return Err(ConfigError::DuplicateWorkerName(name.clone()));
                }
                if let WorkerConfig::Merge { merge_types, name, .. } = worker {
                    if merge_types.is_empty() {
                        return Err(ConfigError::EmptyMergeTypes(name.clone()));
                    }
                }
            }
        }
        Ok(())
    }
}

impl ModelFilter {
    #[must_use]
    pub fn blacklist(ids: Vec<String>) -> Self {
        Self { mode: ModelFilterMode::Blacklist, list: ids }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            server: ServerConfig { port: 8080, auth: None, keepalive: KeepaliveConfig::default() },
            queue: QueueConfig { queue_buffer: 0, image_limit: 4 },
            backend: BackendConfig {
                pool: PoolConfig {
                    strategy: PoolStrategy::LeastBusy,
                    failover: FailoverConfig::default(),
                    instances: vec![InstanceConfig {
                        name: "default".into(),
                        user_data_mark: "default".into(),
                        proxy: None,
                        workers: vec![WorkerConfig::Single { name: "w1".into(), adapter_type: "chatgpt".into() }],
                    }],
                },
                adapter: HashMap::new(),
            },
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn zero_image_limit_is_rejected() {
        let mut cfg = base_config();
        cfg.queue.image_limit = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::ZeroImageLimit)));
    }

    #[test]
    fn duplicate_worker_names_across_instances_are_rejected() {
        let mut cfg = base_config();
        let dup = cfg.backend.pool.instances[0].clone();
        cfg.backend.pool.instances.push(InstanceConfig { name: "second".into(), ..dup });
        assert!(matches!(cfg.validate(), Err(ConfigError::DuplicateWorkerName(_))));
    }
}
