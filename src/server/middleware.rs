// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! CORS, Host allow-list and bearer-token gating.
//!
//! The CORS rule here (reject any non-empty `Origin` outright) is stricter
//! than the permissive allow-list policies `tower_http::cors::CorsLayer`
//! expresses, so it is written as bespoke `axum::middleware::from_fn`
//! middleware rather than forced into that layer.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use super::AppState;

/// Rejects any request carrying a non-empty `Origin` header.
pub async fn reject_browser_origin(request: Request<Body>, next: Next) -> Response {
    if has_nonempty_header(request.headers(), axum::http::header::ORIGIN) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Request denied by CORS policy." })),
        )
            .into_response();
    }
    next.run(request).await
}

/// Requires `Host` to be exactly `localhost:<port>` or `127.0.0.1:<port>`.
pub async fn require_known_host(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let allowed = [
        format!("localhost:{}", state.port),
        format!("127.0.0.1:{}", state.port),
    ];
    let host = request
        .headers()
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !allowed.iter().any(|candidate| candidate == host) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Invalid Host header" })),
        )
            .into_response();
    }
    next.run(request).await
}

/// Requires `Authorization: Bearer <token>` matching the process-lifetime
/// auth token.
pub async fn require_bearer_token(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !bearer_token_matches(request.headers(), state.auth_token) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }
    next.run(request).await
}

fn has_nonempty_header(headers: &HeaderMap, name: axum::http::HeaderName) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| !v.is_empty())
}

fn bearer_token_matches(headers: &HeaderMap, expected: Uuid) -> bool {
    let Some(value) = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let Some(token) = value.strip_prefix("Bearer ") else {
        return false;
    };
    token == expected.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_with_value_is_nonempty() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::ORIGIN,
            axum::http::HeaderValue::from_static("https://x"),
        );
        assert!(has_nonempty_header(&headers, axum::http::header::ORIGIN));
    }

    #[test]
    fn missing_header_is_not_nonempty() {
        let headers = HeaderMap::new();
        assert!(!has_nonempty_header(&headers, axum::http::header::ORIGIN));
    }

    #[test]
    fn bearer_token_matches_exact_value() {
        let token = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        let value = format!("Bearer {token}");
        let header_value = axum::http::HeaderValue::from_str(&value).unwrap_or(axum::http::HeaderValue::from_static(""));
        headers.insert(axum::http::header::AUTHORIZATION, header_value);
        assert!(bearer_token_matches(&headers, token));
    }

    #[test]
    fn bearer_token_rejects_mismatch() {
        let token = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        let value = format!("Bearer {other}");
        let header_value = axum::http::HeaderValue::from_str(&value).unwrap_or(axum::http::HeaderValue::from_static(""));
        headers.insert(axum::http::header::AUTHORIZATION, header_value);
        assert!(!bearer_token_matches(&headers, token));
    }

    #[test]
    fn bearer_token_rejects_missing_header() {
        let headers = HeaderMap::new();
        assert!(!bearer_token_matches(&headers, Uuid::new_v4()));
    }
}
