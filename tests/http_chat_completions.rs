//! Exercises `POST /v1/chat/completions` through the real axum router: a
//! request body in, an HTTP response out, with the adapter layer replaced
//! by a scripted double. Covers S1 (routing success), S2 (image-required
//! rejection), and S3 (queue-full admission).

mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use http_body_util::BodyExt;
use tower::ServiceExt;

use browserchat_gateway::adapter::{AdapterRegistry, GenerateOutcome, ImagePolicy, ModelDescriptor};
use browserchat_gateway::config::{
    AppConfig, BackendConfig, FailoverConfig, InstanceConfig, KeepaliveConfig, PoolConfig, QueueConfig, ServerConfig,
    WorkerConfig,
};
use browserchat_gateway::http::{router, AppState};
use browserchat_gateway::pool::{PoolManager, PoolStrategy};
use browserchat_gateway::queue::QueueController;

use common::{make_worker, ScriptedAdapter};

fn base_config(queue_buffer: u32) -> AppConfig {
    AppConfig {
        server: ServerConfig { port: 0, auth: None, keepalive: KeepaliveConfig::default() },
        queue: QueueConfig { queue_buffer, image_limit: 4 },
        backend: BackendConfig {
            pool: PoolConfig {
                strategy: PoolStrategy::LeastBusy,
                failover: FailoverConfig::default(),
                instances: vec![InstanceConfig {
                    name: "default".into(),
                    user_data_mark: "default".into(),
                    proxy: None,
                    workers: vec![WorkerConfig::Single { name: "w1".into(), adapter_type: "alpha".into() }],
                }],
            },
            adapter: HashMap::new(),
        },
    }
}

fn text_request_body(model: &str) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "messages": [{"role": "user", "content": "hello"}],
        "stream": false,
    })
}

async fn ready_state(image_policy: ImagePolicy, queue_buffer: u32) -> Arc<AppState> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let adapter = Arc::new(ScriptedAdapter {
        id: "alpha".into(),
        models: vec![ModelDescriptor::new("m1", image_policy)],
        outcome: GenerateOutcome::text("hi"),
        log,
    });
    let registry = Arc::new(AdapterRegistry::new(vec![adapter], HashMap::new()));
    let worker = make_worker("w1", "alpha");
    let pool = Arc::new(PoolManager::new(vec![worker], registry, PoolStrategy::LeastBusy, true, 2));
    let queue = Arc::new(QueueController::new(1, queue_buffer));
    let config = Arc::new(base_config(queue_buffer));
    AppState::ready(pool, queue, config, std::env::temp_dir())
}

#[tokio::test]
async fn s1_non_streaming_success_returns_200() {
    let state = ready_state(ImagePolicy::Optional, 0).await;
    let app = router(state);

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(text_request_body("m1").to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), 200);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["choices"][0]["message"]["content"], "hi");
}

#[tokio::test]
async fn s2_image_required_model_rejects_text_only_request() {
    let state = ready_state(ImagePolicy::Required, 0).await;
    let app = router(state);

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(text_request_body("m1").to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), 400);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["error"]["code"], "IMAGE_REQUIRED");
}

#[tokio::test]
async fn s3_non_streaming_rejected_once_queue_is_full() {
    let state = ready_state(ImagePolicy::Optional, 0).await;
    let queue = Arc::clone(state.queue().unwrap());
    let _guard = queue.acquire().await;
    let app = router(state);

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(text_request_body("m1").to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), 503);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["error"]["code"], "SERVER_BUSY");
}

#[tokio::test]
async fn safe_mode_returns_503_for_chat_completions() {
    let config = Arc::new(base_config(0));
    let state = AppState::safe_mode("no adapters linked in", config, std::env::temp_dir());
    let app = router(state);

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(text_request_body("m1").to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), 503);

    let health_request = axum::http::Request::builder().uri("/healthz").body(axum::body::Body::empty()).unwrap();
    let health_response = router(AppState::safe_mode("no adapters linked in", Arc::new(base_config(0)), std::env::temp_dir()))
        .oneshot(health_request)
        .await
        .unwrap();
    assert_eq!(health_response.status(), 200);
}
