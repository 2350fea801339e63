// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! The Streamable HTTP transport: session creation and JSON-RPC dispatch on
//! `POST /mcp`, and session-scoped SSE push on `GET /mcp`.
//!
//! Route composition and the fallback-handler shape follow `sidecar.rs`'s
//! `Router`; the security middleware chain is described in `middleware`.

pub mod error;
pub mod mcp;
pub mod middleware;

use crate::context::Aggregator;
use crate::editor::EditorClient;
use crate::rpc::{Request, RequestId, Response, BAD_SESSION};
use crate::session::SessionHub;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use futures_util::stream::Stream;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex as StdMutex};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt as _;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

const SESSION_HEADER: &str = "mcp-session-id";

/// Holds each session's outbox receiver between its creation on `POST /mcp`
/// (`initialize`) and the later `GET /mcp` call that opens its SSE stream.
/// A receiver is taken exactly once; the registry entry is removed on take.
#[derive(Clone, Default)]
struct PendingReceivers(Arc<StdMutex<HashMap<Uuid, mpsc::UnboundedReceiver<Bytes>>>>);

impl PendingReceivers {
    fn insert(&self, id: Uuid, rx: mpsc::UnboundedReceiver<Bytes>) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).insert(id, rx);
    }

    fn take(&self, id: Uuid) -> Option<mpsc::UnboundedReceiver<Bytes>> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).remove(&id)
    }
}

/// Shared state handed to every HTTP handler and security middleware layer.
#[derive(Clone)]
pub struct AppState {
    /// Live session registry and keep-alive driver.
    pub hub: SessionHub,
    /// The shared editor-context aggregator.
    pub aggregator: Aggregator,
    /// Handle to the attached editor, for diff tool calls.
    pub editor: EditorClient,
    /// The process-lifetime bearer token required on every request.
    pub auth_token: Uuid,
    /// The port this server is bound to, used for Host header validation.
    pub port: u16,
    /// Body-size cap applied by [`DefaultBodyLimit`].
    pub max_body_bytes: usize,
    receivers: PendingReceivers,
}

impl AppState {
    /// Builds a new application state. `max_body_bytes` gates the
    /// `DefaultBodyLimit` layer.
    #[must_use]
    pub fn new(
        hub: SessionHub,
        aggregator: Aggregator,
        editor: EditorClient,
        auth_token: Uuid,
        port: u16,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            hub,
            aggregator,
            editor,
            auth_token,
            port,
            max_body_bytes,
            receivers: PendingReceivers::default(),
        }
    }
}

/// Builds the router with its middleware chain applied in the order the
/// transport contract requires: body-size cap, then CORS, then Host
/// allow-list, then bearer-token auth.
#[must_use]
pub fn router(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .route("/mcp", post(post_mcp).get(get_mcp))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_bearer_token,
        ))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_known_host,
        ))
        .route_layer(axum::middleware::from_fn(middleware::reject_browser_origin))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
    headers.get(name)?.to_str().ok()
}

fn session_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    header_str(headers, SESSION_HEADER).and_then(|v| Uuid::parse_str(v).ok())
}

fn bad_session_response(id: RequestId) -> axum::response::Response {
    let response = Response::error(
        id,
        BAD_SESSION,
        "Bad Request: No valid session ID provided for non-initialize request.",
    );
    (StatusCode::BAD_REQUEST, Json(response)).into_response()
}

async fn post_mcp(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> axum::response::Response {
    let Ok(request) = serde_json::from_value::<Request>(body) else {
        let response = Response::error(RequestId::Number(0), BAD_SESSION, "malformed JSON-RPC request");
        return (StatusCode::BAD_REQUEST, Json(response)).into_response();
    };

    let session_id = session_id_from_headers(&headers);

    if request.method == "initialize" && session_id.is_none() {
        let (session, rx) = state.hub.create();
        let id = session.id();
        state.receivers.insert(id, rx);

        let (response, status) = mcp::dispatch(&state, request).await;
        let mut resp = (status, Json(response)).into_response();
        if let Ok(header_value) = axum::http::HeaderValue::from_str(&id.to_string()) {
            resp.headers_mut().insert(HeaderName::from_static("mcp-session-id"), header_value);
        }
        return resp;
    }

    let Some(session_id) = session_id else {
        return bad_session_response(request.id);
    };
    if state.hub.get(session_id).is_none() {
        return bad_session_response(request.id);
    }

    let (response, status) = mcp::dispatch(&state, request).await;
    (status, Json(response)).into_response()
}

async fn get_mcp(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, axum::response::Response> {
    let Some(session_id) = session_id_from_headers(&headers) else {
        return Err(bad_session_response(RequestId::Number(0)));
    };
    let Some(session) = state.hub.get(session_id) else {
        return Err(bad_session_response(RequestId::Number(0)));
    };
    let Some(rx) = state.receivers.take(session_id) else {
        return Err(bad_session_response(RequestId::Number(0)));
    };

    if !session.take_initial_context_flag() {
        let context = state.aggregator.state();
        state.hub.send_context_to(session_id, &context);
    }

    let stream = UnboundedReceiverStream::new(rx).map(|bytes: Bytes| {
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Ok(Event::default().data(text))
    });
    Ok(Sse::new(stream))
}
