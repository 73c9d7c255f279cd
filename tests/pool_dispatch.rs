//! S1, S4, S5, S6 from the testable-properties scenarios: routing,
//! failover, and prefix resolution through the real `PoolManager`/`Worker`
//! stack, with adapters replaced by scripted doubles.

mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use browserchat_gateway::adapter::{AdapterRegistry, GenerateMeta, GenerateOutcome, ImagePolicy, ModelDescriptor};
use browserchat_gateway::error::{ErrorKind, ErrorRecord};
use browserchat_gateway::pool::{PoolManager, PoolStrategy};

use common::{make_worker, ScriptedAdapter};

#[tokio::test]
async fn s1_single_worker_success() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let adapter = Arc::new(ScriptedAdapter {
        id: "alpha".into(),
        models: vec![ModelDescriptor::new("m1", ImagePolicy::Optional)],
        outcome: GenerateOutcome::text("hi"),
        log: log.clone(),
    });
    let registry = Arc::new(AdapterRegistry::new(vec![adapter], HashMap::new()));
    let worker = make_worker("w1", "alpha");
    let pool = PoolManager::new(vec![worker], registry, PoolStrategy::LeastBusy, true, 2);

    let outcome = pool.dispatch("m1", "hello", &[], false, &GenerateMeta::default()).await;
    assert_eq!(outcome.text.as_deref(), Some("hi"));
    assert!(!outcome.is_error());
}

#[tokio::test]
async fn s4_failover_on_retryable_error() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let failing = Arc::new(ScriptedAdapter {
        id: "alpha".into(),
        models: vec![ModelDescriptor::new("m3", ImagePolicy::Optional)],
        outcome: GenerateOutcome::error(ErrorRecord::with_retryable("upstream 502", ErrorKind::HttpError, true)),
        log: log.clone(),
    });
    let succeeding = Arc::new(ScriptedAdapter {
        id: "beta".into(),
        models: vec![ModelDescriptor::new("m3", ImagePolicy::Optional)],
        outcome: GenerateOutcome::text("ok"),
        log: log.clone(),
    });
    let registry = Arc::new(AdapterRegistry::new(vec![failing, succeeding], HashMap::new()));
    let workers = vec![make_worker("w-alpha", "alpha"), make_worker("w-beta", "beta")];
    let pool = PoolManager::new(workers, registry, PoolStrategy::LeastBusy, true, 2);

    let outcome = pool.dispatch("m3", "hello", &[], false, &GenerateMeta::default()).await;
    assert_eq!(outcome.text.as_deref(), Some("ok"));
    assert_eq!(*log.lock().unwrap(), vec!["alpha".to_string(), "beta".to_string()]);
}

#[tokio::test]
async fn s5_non_retryable_error_stops_failover() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let blocked = Arc::new(ScriptedAdapter {
        id: "alpha".into(),
        models: vec![ModelDescriptor::new("m3", ImagePolicy::Optional)],
        outcome: GenerateOutcome::error(ErrorRecord::with_retryable("forbidden content", ErrorKind::ContentBlocked, false)),
        log: log.clone(),
    });
    let never_called = Arc::new(ScriptedAdapter {
        id: "beta".into(),
        models: vec![ModelDescriptor::new("m3", ImagePolicy::Optional)],
        outcome: GenerateOutcome::text("ok"),
        log: log.clone(),
    });
    let registry = Arc::new(AdapterRegistry::new(vec![blocked, never_called], HashMap::new()));
    let workers = vec![make_worker("w-alpha", "alpha"), make_worker("w-beta", "beta")];
    let pool = PoolManager::new(workers, registry, PoolStrategy::LeastBusy, true, 2);

    let outcome = pool.dispatch("m3", "hello", &[], false, &GenerateMeta::default()).await;
    assert!(outcome.is_error());
    assert_eq!(outcome.error.unwrap().code, ErrorKind::ContentBlocked);
    assert_eq!(*log.lock().unwrap(), vec!["alpha".to_string()]);
}

#[tokio::test]
async fn s6_prefix_routing_picks_named_adapter() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let alpha = Arc::new(ScriptedAdapter {
        id: "alpha".into(),
        models: vec![ModelDescriptor::new("m", ImagePolicy::Optional)],
        outcome: GenerateOutcome::text("from alpha"),
        log: log.clone(),
    });
    let beta = Arc::new(ScriptedAdapter {
        id: "beta".into(),
        models: vec![ModelDescriptor::new("m", ImagePolicy::Optional)],
        outcome: GenerateOutcome::text("from beta"),
        log: log.clone(),
    });
    let registry = Arc::new(AdapterRegistry::new(vec![alpha, beta], HashMap::new()));
    let workers = vec![make_worker("w-alpha", "alpha"), make_worker("w-beta", "beta")];
    let pool = PoolManager::new(workers, registry, PoolStrategy::LeastBusy, true, 2);

    let outcome = pool.dispatch("beta/m", "hello", &[], false, &GenerateMeta::default()).await;
    assert_eq!(outcome.text.as_deref(), Some("from beta"));
    assert_eq!(*log.lock().unwrap(), vec!["beta".to_string()]);
}
