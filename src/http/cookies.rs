//! `GET /v1/cookies?name=<instance>&domain=<domain>` (§6).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::error_response;
use super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CookiesQuery {
    pub name: Option<String>,
    pub domain: Option<String>,
}

#[derive(Serialize)]
struct CookiesResponse {
    instance: Option<String>,
    cookies: Vec<crate::page::CookieRecord>,
}

pub async fn get_cookies(State(state): State<Arc<AppState>>, Query(query): Query<CookiesQuery>) -> Response {
    let Some(pool) = state.pool() else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "SAFE_MODE", state.safe_mode_reason().unwrap_or("pool unavailable"));
    };

    match pool.get_cookies(query.name.as_deref(), query.domain.as_deref()).await {
        Some(cookies) => Json(CookiesResponse { instance: query.name, cookies }).into_response(),
        None => error_response(StatusCode::BAD_REQUEST, "INVALID_INSTANCE", "no worker matches the requested instance"),
    }
}
