// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Invokes the editor's diff procedures and translates editor-emitted
//! diff-outcome events into protocol notifications for the session hub.

use crate::editor::EditorClient;
use crate::rpc::Notification;
use anyhow::Result;
use serde::Serialize;
use tokio::sync::mpsc;

/// `ide/diffAccepted` notification params.
#[derive(Debug, Clone, Serialize)]
pub struct DiffAccepted {
    #[serde(rename = "filePath")]
    pub file_path: String,
    pub content: String,
}

/// `ide/diffRejected` notification params.
#[derive(Debug, Clone, Serialize)]
pub struct DiffRejected {
    #[serde(rename = "filePath")]
    pub file_path: String,
}

/// A translated diff outcome, ready to be broadcast by the session hub.
#[derive(Debug, Clone)]
pub enum DiffOutcome {
    /// The user accepted the pending diff.
    Accepted(DiffAccepted),
    /// The user rejected the pending diff.
    Rejected(DiffRejected),
}

impl DiffOutcome {
    /// Builds the JSON-RPC notification carrying this outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the params cannot be serialized, which does not
    /// happen for these concrete types but is surfaced for composition with
    /// fallible callers.
    pub fn to_notification(&self) -> Result<Notification, serde_json::Error> {
        match self {
            Self::Accepted(params) => Notification::new("ide/diffAccepted", params),
            Self::Rejected(params) => Notification::new("ide/diffRejected", params),
        }
    }
}

/// Invokes diff operations on the editor and exposes a channel of
/// translated outcomes for the session hub to broadcast.
///
/// Ordering: the coordinator never reorders; outcomes are forwarded in the
/// order their originating editor events were dispatched.
pub struct DiffCoordinator {
    outcomes: mpsc::UnboundedReceiver<DiffOutcome>,
}

impl DiffCoordinator {
    /// Creates a coordinator with its outcome channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedSender<DiffOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { outcomes: rx }, tx)
    }

    /// Receives the next translated diff outcome. Cancel-safe.
    pub async fn recv(&mut self) -> Option<DiffOutcome> {
        self.outcomes.recv().await
    }
}

/// Opens a diff view in the editor for `file_path` with `new_content`.
///
/// # Errors
///
/// Returns an error if the editor call fails; the caller surfaces this to
/// the MCP tool invoker.
pub async fn show_diff(editor: &EditorClient, file_path: &str, new_content: &str) -> Result<()> {
    editor.show_diff(file_path, new_content).await
}

/// Closes the diff view in the editor for `file_path`, returning the edited
/// content, or `None` if no such diff was open.
///
/// # Errors
///
/// Returns an error if the editor call fails.
pub async fn close_diff(editor: &EditorClient, file_path: &str) -> Result<Option<String>> {
    editor.close_diff(file_path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_outcome_builds_correct_notification() {
        let outcome = DiffOutcome::Accepted(DiffAccepted {
            file_path: "/x".to_string(),
            content: "hello world".to_string(),
        });
        let notification = outcome.to_notification().unwrap_or_else(|_| Notification {
            jsonrpc: "2.0".to_string(),
            method: String::new(),
            params: None,
        });
        assert_eq!(notification.method, "ide/diffAccepted");
        let params = notification.params.unwrap_or_default();
        assert_eq!(params["filePath"], "/x");
        assert_eq!(params["content"], "hello world");
    }

    #[test]
    fn rejected_outcome_omits_content() {
        let outcome = DiffOutcome::Rejected(DiffRejected {
            file_path: "/x".to_string(),
        });
        let notification = outcome.to_notification().unwrap_or_else(|_| Notification {
            jsonrpc: "2.0".to_string(),
            method: String::new(),
            params: None,
        });
        assert_eq!(notification.method, "ide/diffRejected");
        let params = notification.params.unwrap_or_default();
        assert!(params.get("content").is_none());
    }
}
