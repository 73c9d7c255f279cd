//! Typed YAML configuration for the gateway (§6).

pub mod loader;
pub mod types;

pub use loader::{EXIT_CONFIG_ERROR, LoadError, load, load_or_exit};
pub use types::{
    AdapterConfig, AppConfig, BackendConfig, ConfigError, FailoverConfig, InstanceConfig, KeepaliveConfig,
    KeepaliveMode, MergeMarker, PoolConfig, QueueConfig, ServerConfig, WorkerConfig,
};
