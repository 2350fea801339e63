// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Attaches to the editor over a Unix domain socket supplied by the
//! environment, subscribes to a fixed event vocabulary, and exposes the two
//! editor-side diff procedures.
//!
//! Request/response correlation follows `lsp::client::LspClient`: an atomic
//! id counter and a `pending` map of oneshot senders, drained by a background
//! reader task. Framing is newline-delimited JSON, as in `notify.rs`'s IPC
//! server, rather than LSP's `Content-Length` framing — this channel is not
//! LSP.

use anyhow::{anyhow, Context as _, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, warn};

/// The fixed event vocabulary emitted upward by the editor.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum EditorEvent {
    /// The editor focused a buffer.
    BufferEnter {
        /// Absolute path of the focused buffer.
        path: String,
        /// Editor-internal buffer number, opaque to the bridge.
        #[serde(default)]
        bufnr: i64,
    },
    /// The cursor moved in the active buffer. Both fields are 1-based.
    CursorMoved {
        /// Line number.
        line: u32,
        /// Column.
        col: u32,
    },
    /// The visual selection changed.
    VisualChanged {
        /// Selected text, possibly empty.
        #[serde(rename = "selectedText")]
        selected_text: String,
    },
    /// A buffer was deleted.
    BufferClosed {
        /// Absolute path of the closed buffer.
        path: String,
    },
    /// The user accepted a pending diff.
    DiffAccepted {
        /// Path of the file the diff applied to.
        #[serde(rename = "filePath")]
        file_path: String,
        /// Final accepted content.
        content: String,
    },
    /// The user rejected a pending diff.
    DiffRejected {
        /// Path of the file the diff applied to.
        #[serde(rename = "filePath")]
        file_path: String,
    },
}

/// A cloneable handle to the attached editor, able to invoke its two diff
/// procedures. Shared freely across HTTP handlers; the event stream is
/// consumed separately (see [`connect`]).
#[derive(Clone)]
pub struct EditorClient {
    next_id: Arc<AtomicI64>,
    writer: Arc<Mutex<tokio::net::unix::OwnedWriteHalf>>,
    pending: Arc<Mutex<HashMap<i64, oneshot::Sender<Value>>>>,
}

/// Consumes the fixed event vocabulary emitted upward by the editor. Owned
/// by a single background task.
pub struct EditorEvents {
    rx: mpsc::UnboundedReceiver<EditorEvent>,
}

impl EditorEvents {
    /// Receives the next ingress event from the editor. Cancel-safe.
    pub async fn recv(&mut self) -> Option<EditorEvent> {
        self.rx.recv().await
    }
}

impl EditorClient {
    /// Connects to the editor's Unix domain socket at `socket_path`, returning
    /// a callable handle and the separate event stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established. Callers at
    /// the process boundary should log and exit non-zero on failure.
    pub async fn connect(socket_path: &std::path::Path) -> Result<(Self, EditorEvents)> {
        let stream = UnixStream::connect(socket_path)
            .await
            .with_context(|| format!("failed to attach to editor RPC socket {}", socket_path.display()))?;
        let (read_half, write_half) = stream.into_split();
        let writer = Arc::new(Mutex::new(write_half));
        let pending: Arc<Mutex<HashMap<i64, oneshot::Sender<Value>>>> = Arc::new(Mutex::new(HashMap::new()));
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::reader_task(read_half, pending.clone(), tx));

        let client = Self {
            next_id: Arc::new(AtomicI64::new(1)),
            writer,
            pending,
        };
        Ok((client, EditorEvents { rx }))
    }

    async fn reader_task(
        read_half: tokio::net::unix::OwnedReadHalf,
        pending: Arc<Mutex<HashMap<i64, oneshot::Sender<Value>>>>,
        events: mpsc::UnboundedSender<EditorEvent>,
    ) {
        let mut lines = BufReader::new(read_half).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!("editor RPC connection closed");
                    break;
                }
                Err(e) => {
                    warn!("editor RPC read error: {e}");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let value: Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(e) => {
                    warn!("dropping malformed editor RPC line: {e}");
                    continue;
                }
            };

            if let Some(id) = value.get("id").and_then(Value::as_i64) {
                let result = value.get("result").cloned().unwrap_or(Value::Null);
                let mut pending = pending.lock().await;
                if let Some(sender) = pending.remove(&id) {
                    let _ = sender.send(result);
                } else {
                    warn!(id, "response for unknown editor RPC request id");
                }
                continue;
            }

            match serde_json::from_value::<EditorEvent>(value) {
                Ok(event) => {
                    if !event_ingress_ok(&event) {
                        continue;
                    }
                    debug!(?event, "dispatching editor event");
                    if events.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("unrecognized editor RPC method: {e}"),
            }
        }
    }

    async fn call(&self, method: &str, params: impl Serialize) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let mut line = serde_json::to_vec(&request)?;
        line.push(b'\n');
        self.writer
            .lock()
            .await
            .write_all(&line)
            .await
            .context("failed to write to editor RPC socket")?;

        rx.await.map_err(|_| anyhow!("editor RPC connection closed while awaiting {method}"))
    }

    /// Invokes the editor's "show diff" remote procedure.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the connection is lost.
    pub async fn show_diff(&self, file_path: &str, new_content: &str) -> Result<()> {
        self.call(
            "showDiff",
            serde_json::json!({ "filePath": file_path, "newContent": new_content }),
        )
        .await?;
        Ok(())
    }

    /// Invokes the editor's "close diff" remote procedure, returning the
    /// current edited content, or `None` if no such diff was open.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the connection is lost.
    pub async fn close_diff(&self, file_path: &str) -> Result<Option<String>> {
        let result = self
            .call("closeDiff", serde_json::json!({ "filePath": file_path }))
            .await?;
        Ok(result.get("content").and_then(Value::as_str).map(str::to_string))
    }
}

fn event_ingress_ok(event: &EditorEvent) -> bool {
    match event {
        EditorEvent::BufferEnter { path, .. } | EditorEvent::BufferClosed { path } => {
            is_absolute_nonempty(path)
        }
        EditorEvent::DiffAccepted { file_path, .. } | EditorEvent::DiffRejected { file_path } => {
            is_absolute_nonempty(file_path)
        }
        EditorEvent::CursorMoved { .. } | EditorEvent::VisualChanged { .. } => true,
    }
}

fn is_absolute_nonempty(path: &str) -> bool {
    !path.is_empty() && std::path::Path::new(path).is_absolute()
}

/// Logs the attach failure and exits the process with status 1, per the
/// component's contract.
pub fn exit_on_attach_failure(err: &anyhow::Error) -> ! {
    error!("failed to attach to editor RPC socket: {err:#}");
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_absolute_buffer_enter() {
        let event = EditorEvent::BufferEnter {
            path: "relative.rs".to_string(),
            bufnr: 1,
        };
        assert!(!event_ingress_ok(&event));
    }

    #[test]
    fn accepts_absolute_buffer_enter() {
        let event = EditorEvent::BufferEnter {
            path: "/a/b.rs".to_string(),
            bufnr: 1,
        };
        assert!(event_ingress_ok(&event));
    }

    #[test]
    fn cursor_and_selection_events_always_pass() {
        assert!(event_ingress_ok(&EditorEvent::CursorMoved { line: 1, col: 1 }));
        assert!(event_ingress_ok(&EditorEvent::VisualChanged {
            selected_text: String::new()
        }));
    }

    #[test]
    fn parses_tagged_event_from_wire_json() {
        let json = r#"{"method":"buffer_enter","params":{"path":"/a","bufnr":3}}"#;
        let value: Value = serde_json::from_str(json).unwrap_or(Value::Null);
        let event: EditorEvent = serde_json::from_value(value).unwrap_or(EditorEvent::CursorMoved { line: 0, col: 0 });
        let EditorEvent::BufferEnter { path, bufnr } = event else {
            unreachable!("expected BufferEnter variant");
        };
        assert_eq!(path, "/a");
        assert_eq!(bufnr, 3);
    }
}
