//! Process entry point: load config, assemble the adapter registry, and
//! serve the HTTP facade — falling back to safe mode on any init failure
//! rather than refusing to start (§7).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use browserchat_gateway::adapter::registry::ModelFilter;
use browserchat_gateway::adapter::{self, AdapterRegistry};
use browserchat_gateway::config;
use browserchat_gateway::http::{router, AppState};
use browserchat_gateway::pool::PoolManager;
use browserchat_gateway::queue::QueueController;
use browserchat_gateway::shutdown::{PoolCloseHook, QueueDrainHook, ShutdownRegistry};
use browserchat_gateway::Worker;

const SHUTDOWN_DRAIN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

fn model_filters(config: &config::AppConfig) -> HashMap<String, ModelFilter> {
    config
        .backend
        .adapter
        .iter()
        .filter_map(|(id, settings)| settings.model_filter.clone().map(|filter| (id.clone(), filter)))
        .collect()
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config_path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("config.yaml"));
    let config = Arc::new(config::load_or_exit(&config_path));

    let temp_dir = std::env::temp_dir().join("browserchat-gateway");
    if let Err(error) = std::fs::create_dir_all(&temp_dir) {
        tracing::error!(error = %error, path = %temp_dir.display(), "failed to create temp directory");
    }

    let registry = Arc::new(AdapterRegistry::new(adapter::builtin(), model_filters(&config)));
    for warning in registry.warnings() {
        tracing::warn!(adapter = %warning.adapter_id, reason = %warning.reason, "adapter registration warning");
    }

    let workers: Vec<Arc<Worker>> = Vec::new();
    let shutdown_hooks = Arc::new(ShutdownRegistry::new());
    let state = if workers.is_empty() {
        tracing::warn!("no workers constructed (no adapters/pages linked in); entering safe mode");
        AppState::safe_mode("no browser-layer adapters registered", config.clone(), temp_dir)
    } else {
        let pool = Arc::new(PoolManager::new(
            workers,
            registry,
            config.backend.pool.strategy,
            config.backend.pool.failover.enabled,
            config.backend.pool.failover.max_retries,
        ));
        let max_concurrent = config.backend.pool.instances.iter().map(|i| i.workers.len()).sum::<usize>().max(1);
        let queue = Arc::new(QueueController::new(max_concurrent, config.queue.queue_buffer));

        // Registered pool-then-queue so shutdown runs in reverse: the queue
        // drains first, then the pool closes each Worker's browser context.
        shutdown_hooks.register(Arc::new(PoolCloseHook { pool: Arc::clone(&pool) })).await;
        shutdown_hooks.register(Arc::new(QueueDrainHook { queue: Arc::clone(&queue), drain_timeout: SHUTDOWN_DRAIN_TIMEOUT })).await;

        AppState::ready(pool, queue, config.clone(), temp_dir)
    };

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(error = %error, addr = %addr, "failed to bind HTTP listener");
            std::process::exit(1);
        }
    };

    tracing::info!(addr = %addr, "listening");
    if let Err(error) = axum::serve(listener, router(state)).with_graceful_shutdown(wait_for_shutdown_signal()).await {
        tracing::error!(error = %error, "server exited with error");
    }

    shutdown_hooks.run().await;
}

/// Resolves on SIGINT (ctrl-c) or, on unix, SIGTERM — the two signals a
/// process manager sends for a graceful stop.
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
