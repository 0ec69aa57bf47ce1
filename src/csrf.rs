//! Per-session CSRF token check on state-changing requests.
//!
//! The token travels either in the `X-CSRF-Token` header or as the
//! `csrf_token` field of an urlencoded form body.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header::CONTENT_TYPE, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::session;
use crate::state::AppState;

pub const CSRF_HEADER: &str = "x-csrf-token";

/// Form bodies are buffered to read the token; anything larger is refused.
const MAX_FORM_BYTES: usize = 64 * 1024;

#[derive(Deserialize)]
struct CsrfField {
    csrf_token: Option<String>,
}

fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn is_urlencoded(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

fn tokens_match(expected: &str, submitted: &str) -> bool {
    expected.len() == submitted.len()
        && expected
            .bytes()
            .zip(submitted.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

fn rejected(reason: &str) -> Response {
    tracing::warn!(reason, "CSRF check failed");
    (StatusCode::BAD_REQUEST, "Bad Request: invalid CSRF token").into_response()
}

pub async fn verify_csrf(
    State(state): State<AppState>,
    session: Session,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.csrf_protection || !is_state_changing(request.method()) {
        return next.run(request).await;
    }

    let expected = match session::existing_csrf_token(&session).await {
        Ok(Some(token)) => token,
        Ok(None) => return rejected("no token issued for this session"),
        Err(e) => return e.into_response(),
    };

    let header_token = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let (request, submitted) = match header_token {
        Some(token) => (request, Some(token)),
        None if is_urlencoded(&request) => {
            let (parts, body) = request.into_parts();
            let Ok(bytes) = to_bytes(body, MAX_FORM_BYTES).await else {
                return rejected("form body unreadable or too large");
            };
            let token = serde_urlencoded::from_bytes::<CsrfField>(&bytes)
                .ok()
                .and_then(|field| field.csrf_token);
            (Request::from_parts(parts, Body::from(bytes)), token)
        }
        None => (request, None),
    };

    match submitted {
        Some(token) if tokens_match(&expected, &token) => next.run(request).await,
        Some(_) => rejected("token mismatch"),
        None => rejected("token missing"),
    }
}
