//! `GET /healthz` — unauthenticated liveness probe, answered even in safe
//! mode so operators can tell the process is up while config is broken.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::state::AppState;

#[derive(Serialize)]
pub struct HealthBody {
    status: &'static str,
    safe_mode_reason: Option<String>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthBody> {
    match state.safe_mode_reason() {
        Some(reason) => Json(HealthBody { status: "safe_mode", safe_mode_reason: Some(reason.to_string()) }),
        None => Json(HealthBody { status: "ok", safe_mode_reason: None }),
    }
}
