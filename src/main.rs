/*
 * Copyright (C) 2026 Mark Wells Dev
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! IDE Companion Bridge entry point.
//!
//! Attaches to the editor, starts the context aggregator and diff
//! coordinator, binds the HTTP/MCP front-end on an ephemeral loopback port,
//! publishes discovery files, and tears everything down cleanly on
//! `SIGINT`/`SIGTERM`.

use anyhow::{Context as _, Result};
use clap::Parser;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ide_companion_bridge::cli::Args;
use ide_companion_bridge::config::Config;
use ide_companion_bridge::context::Aggregator;
use ide_companion_bridge::diff::{DiffAccepted, DiffCoordinator, DiffOutcome, DiffRejected};
use ide_companion_bridge::discovery::{self, IdeInfo, PortDescriptor};
use ide_companion_bridge::editor::{self, EditorClient, EditorEvent, EditorEvents};
use ide_companion_bridge::server::{self, AppState};
use ide_companion_bridge::session::SessionHub;

/// Entry point for the bridge binary.
///
/// # Errors
///
/// Returns an error if the editor socket is missing, the config cannot be
/// loaded, or the HTTP listener cannot be bound.
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_directive = if args.debug { "ide_bridge=debug" } else { "ide_bridge=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_directive.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(args.config.clone())?;

    let Some(socket_path) = args.editor_socket.clone() else {
        error!("missing editor RPC socket path (--editor-socket or GEMINI_IDE_EDITOR_SOCKET)");
        std::process::exit(1);
    };

    let (editor_client, editor_events) = match EditorClient::connect(&socket_path).await {
        Ok(pair) => pair,
        Err(e) => editor::exit_on_attach_failure(&e),
    };

    let aggregator = Aggregator::new(Duration::from_millis(config.debounce_ms));
    let (diff_coordinator, diff_outcomes_tx) = DiffCoordinator::new();
    let hub = SessionHub::new(
        Duration::from_secs(config.keepalive_interval_secs),
        config.keepalive_miss_threshold,
    );

    {
        let hub = hub.clone();
        let aggregator_for_callback = aggregator.clone();
        // The returned `Disposable` is dropped immediately; dropping it does
        // not unsubscribe, and this subscription lives for the process.
        let _ = aggregator.on_did_change(move || {
            let context = aggregator_for_callback.state();
            hub.broadcast_context(&context);
        });
    }

    spawn_event_router(aggregator.clone(), diff_outcomes_tx, editor_events);
    spawn_diff_broadcaster(hub.clone(), diff_coordinator);

    let workspace_path = args
        .workspace
        .clone()
        .unwrap_or(std::env::current_dir().context("failed to read current directory")?);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind loopback listener")?;
    let port = listener.local_addr().context("failed to read bound address")?.port();

    let auth_token = uuid::Uuid::new_v4();
    let state = AppState::new(
        hub,
        aggregator,
        editor_client,
        auth_token,
        port,
        config.max_body_bytes,
    );
    let app = server::router(state);

    let discovery_dir = discovery::ensure_discovery_dir()?;
    discovery::reap_stale(&discovery_dir);

    let descriptor = PortDescriptor {
        port,
        workspace_path: workspace_path.to_string_lossy().into_owned(),
        auth_token,
        ide_info: Some(IdeInfo {
            name: args.editor_id.clone(),
            display_name: args.editor_id.clone(),
        }),
    };
    let (descriptor_path, env_path) = discovery::publish(&discovery_dir, &descriptor, &args.editor_id)?;

    info!(port, "bridge listening on loopback");

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    let serve_result = axum::serve(listener, app).with_graceful_shutdown(shutdown).await;

    discovery::unpublish(&descriptor_path, &env_path);
    serve_result.context("HTTP server error")?;
    Ok(())
}

/// Drains editor events for as long as the connection stays open, updating
/// the aggregator and forwarding diff outcomes. Runs for the process
/// lifetime; its task is not joined.
fn spawn_event_router(
    aggregator: Aggregator,
    diff_outcomes_tx: tokio::sync::mpsc::UnboundedSender<DiffOutcome>,
    mut events: EditorEvents,
) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                EditorEvent::BufferEnter { path, .. } => aggregator.on_buffer_enter(&path),
                EditorEvent::CursorMoved { line, col } => aggregator.on_cursor_moved(line, col),
                EditorEvent::VisualChanged { selected_text } => aggregator.on_visual_changed(&selected_text),
                EditorEvent::BufferClosed { path } => aggregator.on_buffer_closed(&path),
                EditorEvent::DiffAccepted { file_path, content } => {
                    let outcome = DiffOutcome::Accepted(DiffAccepted {
                        file_path,
                        content,
                    });
                    let _ = diff_outcomes_tx.send(outcome);
                }
                EditorEvent::DiffRejected { file_path } => {
                    let outcome =
                        DiffOutcome::Rejected(DiffRejected { file_path });
                    let _ = diff_outcomes_tx.send(outcome);
                }
            }
        }
    });
}

/// Broadcasts translated diff outcomes to every live session for as long as
/// the coordinator's channel stays open. Runs for the process lifetime.
fn spawn_diff_broadcaster(hub: SessionHub, mut coordinator: DiffCoordinator) {
    tokio::spawn(async move {
        while let Some(outcome) = coordinator.recv().await {
            hub.broadcast_diff(&outcome);
        }
    });
}
