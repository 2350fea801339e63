// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Shared harness for HTTP integration tests: a stub editor over a Unix
//! socket, and a fully-wired bridge server bound to an ephemeral port.

#![allow(clippy::unwrap_used, reason = "test harness uses unwrap for setup brevity")]
#![allow(dead_code, reason = "not every integration test exercises every harness field")]

use ide_companion_bridge::context::Aggregator;
use ide_companion_bridge::diff::{DiffAccepted, DiffCoordinator, DiffOutcome, DiffRejected};
use ide_companion_bridge::editor::{EditorClient, EditorEvent};
use ide_companion_bridge::server::{self, AppState};
use ide_companion_bridge::session::SessionHub;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A running bridge instance and the bits a test needs to talk to it.
pub struct TestApp {
    pub base_url: String,
    pub auth_token: Uuid,
    pub port: u16,
    _editor_dir: tempfile::TempDir,
}

/// Starts a stub editor listening on a Unix socket. It answers `showDiff`
/// with an empty result and `closeDiff` with `{"content": "hello world"}`,
/// and forwards anything sent on the returned channel as a raw wire line
/// (used by tests to simulate `diff_accepted`/`diff_rejected` events).
async fn spawn_stub_editor() -> (std::path::PathBuf, tempfile::TempDir, mpsc::UnboundedSender<String>) {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("editor.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();
    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        let (stream, _addr) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Ok(Some(line)) = line else { break };
                    let Ok(value) = serde_json::from_str::<serde_json::Value>(&line) else { continue };
                    let id = value.get("id").cloned().unwrap_or(serde_json::Value::Null);
                    let method = value.get("method").and_then(serde_json::Value::as_str).unwrap_or_default();
                    let result = match method {
                        "closeDiff" => serde_json::json!({ "content": "hello world" }),
                        _ => serde_json::json!({}),
                    };
                    let response = serde_json::json!({ "jsonrpc": "2.0", "id": id, "result": result });
                    let Ok(mut bytes) = serde_json::to_vec(&response) else { continue };
                    bytes.push(b'\n');
                    let _ = write_half.write_all(&bytes).await;
                }
                Some(line) = push_rx.recv() => {
                    let mut bytes = line.into_bytes();
                    bytes.push(b'\n');
                    let _ = write_half.write_all(&bytes).await;
                }
                else => break,
            }
        }
    });

    (socket_path, dir, push_tx)
}

/// Boots a fully-wired bridge (editor attach, aggregator, diff coordinator,
/// session hub, HTTP router) bound to an ephemeral loopback port, the same
/// way `main` wires it. Returns the app handle and a sender the test can use
/// to push raw editor-RPC lines (to simulate diff outcomes) into the stub.
pub async fn spawn_app() -> (TestApp, mpsc::UnboundedSender<String>) {
    let (socket_path, editor_dir, push_tx) = spawn_stub_editor().await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    let (editor_client, mut editor_events) = EditorClient::connect(&socket_path).await.unwrap();

    let aggregator = Aggregator::new(Duration::from_millis(50));
    let (diff_coordinator, diff_outcomes_tx) = DiffCoordinator::new();
    let hub = SessionHub::new(Duration::from_secs(60), 3);

    {
        let hub = hub.clone();
        let aggregator_for_cb = aggregator.clone();
        let _ = aggregator.on_did_change(move || {
            let ctx = aggregator_for_cb.state();
            hub.broadcast_context(&ctx);
        });
    }

    {
        let aggregator = aggregator.clone();
        tokio::spawn(async move {
            while let Some(event) = editor_events.recv().await {
                match event {
                    EditorEvent::BufferEnter { path, .. } => aggregator.on_buffer_enter(&path),
                    EditorEvent::CursorMoved { line, col } => aggregator.on_cursor_moved(line, col),
                    EditorEvent::VisualChanged { selected_text } => aggregator.on_visual_changed(&selected_text),
                    EditorEvent::BufferClosed { path } => aggregator.on_buffer_closed(&path),
                    EditorEvent::DiffAccepted { file_path, content } => {
                        let outcome = DiffOutcome::Accepted(DiffAccepted { file_path, content });
                        let _ = diff_outcomes_tx.send(outcome);
                    }
                    EditorEvent::DiffRejected { file_path } => {
                        let outcome = DiffOutcome::Rejected(DiffRejected { file_path });
                        let _ = diff_outcomes_tx.send(outcome);
                    }
                }
            }
        });
    }

    {
        let hub = hub.clone();
        let mut coordinator = diff_coordinator;
        tokio::spawn(async move {
            while let Some(outcome) = coordinator.recv().await {
                hub.broadcast_diff(&outcome);
            }
        });
    }

    let auth_token = Uuid::new_v4();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let state = AppState::new(hub, aggregator, editor_client, auth_token, port, 10 * 1024 * 1024);
    let app = server::router(state);

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    (
        TestApp {
            base_url: format!("http://127.0.0.1:{port}"),
            auth_token,
            port,
            _editor_dir: editor_dir,
        },
        push_tx,
    )
}
