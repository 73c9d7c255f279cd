pub mod adapter;
pub mod config;
pub mod error;
pub mod http;
pub mod page;
pub mod pool;
pub mod queue;
pub mod request;
pub mod shutdown;
pub mod worker;

pub use adapter::{Adapter, AdapterRegistry, GenerateContext, GenerateMeta, GenerateOutcome, ImagePolicy, ModelDescriptor};
pub use config::{load_or_exit, AppConfig};
pub use error::{ErrorKind, ErrorRecord};
pub use http::state::AppState;
pub use pool::PoolManager;
pub use worker::Worker;
