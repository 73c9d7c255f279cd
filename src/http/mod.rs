//! The OpenAI-compatible HTTP facade (§6): route assembly, the bearer-auth
//! middleware, and the error envelope every pre-dispatch failure shares.

pub mod auth;
pub mod chat;
pub mod cookies;
pub mod health;
pub mod models;
pub mod state;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use state::AppState;

#[derive(Serialize)]
pub struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    code: String,
    message: String,
}

/// The `{error:{code, message}}` shape every HTTP-level failure shares (§6).
#[must_use]
pub fn error_envelope(code: &str, message: &str) -> Json<ErrorBody> {
    Json(ErrorBody { error: ErrorDetail { code: code.to_string(), message: message.to_string() } })
}

#[must_use]
pub fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (status, error_envelope(code, message)).into_response()
}

/// Assemble the full router: authenticated `/v1/*` routes behind the bearer
/// middleware, plus an unauthenticated `/healthz`.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    let authenticated = Router::new()
        .route("/v1/models", get(models::list_models))
        .route("/v1/adapters", get(models::list_adapters))
        .route("/v1/chat/completions", post(chat::chat_completions))
        .route("/v1/cookies", get(cookies::get_cookies))
        .route_layer(middleware::from_fn_with_state(Arc::clone(&state), auth::require_bearer_token));

    Router::new()
        .route("/healthz", get(health::health))
        .merge(authenticated)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
