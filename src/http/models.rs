//! `GET /v1/models` and `GET /v1/adapters` (§6).

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use super::error_response;
use super::state::AppState;

#[derive(Serialize)]
struct ModelsResponse {
    object: &'static str,
    data: Vec<ModelEntry>,
}

#[derive(Serialize)]
struct ModelEntry {
    id: String,
    object: &'static str,
    created: i64,
    owned_by: String,
    image_policy: &'static str,
}

pub async fn list_models(State(state): State<Arc<AppState>>) -> Response {
    let Some(pool) = state.pool() else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "SAFE_MODE", state.safe_mode_reason().unwrap_or("pool unavailable"));
    };

    let data = pool
        .get_models()
        .into_iter()
        .map(|m| ModelEntry { id: m.id, object: m.object, created: m.created, owned_by: m.owned_by, image_policy: m.image_policy })
        .collect();

    Json(ModelsResponse { object: "list", data }).into_response()
}

#[derive(Serialize)]
struct AdaptersResponse {
    object: &'static str,
    data: Vec<AdapterEntry>,
}

#[derive(Serialize)]
struct AdapterEntry {
    id: String,
    model_count: usize,
}

pub async fn list_adapters(State(state): State<Arc<AppState>>) -> Response {
    let Some(pool) = state.pool() else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "SAFE_MODE", state.safe_mode_reason().unwrap_or("pool unavailable"));
    };

    let registry = pool.registry();
    let data = registry
        .adapter_ids()
        .iter()
        .filter_map(|id| registry.get(id).map(|a| AdapterEntry { id: id.clone(), model_count: a.models().len() }))
        .collect();

    Json(AdaptersResponse { object: "list", data }).into_response()
}
