//! Bearer-token middleware (§6: "bearer token in `Authorization` header,
//! compared to the configured token. On mismatch, return `UNAUTHORIZED`").

use std::sync::Arc;

use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::error_envelope;
use super::state::AppState;

pub async fn require_bearer_token(
    State(state): State<Arc<AppState>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(expected) = &state.config.server.auth else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == expected => next.run(request).await,
        _ => (StatusCode::UNAUTHORIZED, error_envelope("UNAUTHORIZED", "missing or invalid bearer token")).into_response(),
    }
}
