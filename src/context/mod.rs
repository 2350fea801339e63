// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! The open-file list and active-file/cursor/selection state, with
//! bounded-capacity and bounded-size policies and debounced change
//! notification.
//!
//! Grounded on `DocumentManager`'s `HashMap<PathBuf, OpenDocument>` (capacity
//! and eviction policy) and on `EventBroadcaster`'s coalescing-timer shape.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Maximum number of tracked open files.
pub const MAX_FILES: usize = 10;

/// Maximum stored length of `selectedText`, in bytes.
pub const MAX_SELECTED_TEXT: usize = 16_384;

/// Cursor position within the active file. Both fields are 1-based.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Cursor {
    /// Line number, 1-based.
    pub line: u32,
    /// Column ("character"), 1-based.
    pub character: u32,
}

/// A single open file tracked by the aggregator.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OpenFile {
    /// Absolute filesystem path.
    pub path: String,
    /// Logical insertion/update ordinal, not wall-clock time.
    pub timestamp: u64,
    /// Whether this is the single active file.
    #[serde(rename = "isActive")]
    pub is_active: bool,
    /// Cursor position, only present on the active file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
    /// Visual selection text, only present on the active file.
    #[serde(rename = "selectedText", skip_serializing_if = "Option::is_none")]
    pub selected_text: Option<String>,
}

/// Ordered, capacity-bounded list of open files, most-recent-active first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileList(Vec<OpenFile>);

impl FileList {
    fn position(&self, path: &str) -> Option<usize> {
        self.0.iter().position(|f| f.path == path)
    }

    fn active_index(&self) -> Option<usize> {
        self.0.iter().position(|f| f.is_active)
    }

    /// Number of tracked files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read-only view of the entries, most-recent-active first.
    #[must_use]
    pub fn entries(&self) -> &[OpenFile] {
        &self.0
    }
}

/// `{ workspaceState: { openFiles, isTrusted } }`, the single externally
/// observable snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct IdeContext {
    #[serde(rename = "workspaceState")]
    pub workspace_state: WorkspaceState,
}

/// Workspace-scoped state embedded in [`IdeContext`].
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceState {
    #[serde(rename = "openFiles")]
    pub open_files: FileList,
    #[serde(rename = "isTrusted")]
    pub is_trusted: bool,
}

/// Truncates `text` to [`MAX_SELECTED_TEXT`] bytes and normalizes an empty
/// string to `None`.
fn normalize_selection(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    if text.len() <= MAX_SELECTED_TEXT {
        return Some(text.to_string());
    }
    let mut end = MAX_SELECTED_TEXT;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    Some(text[..end].to_string())
}

struct AggregatorState {
    files: StdMutex<FileList>,
    next_ordinal: AtomicU64,
    next_subscriber_id: AtomicU64,
    subscribers: StdMutex<Vec<(u64, Box<dyn Fn() + Send + Sync>)>>,
    deadline: StdMutex<Option<Instant>>,
    notify: Notify,
}

/// Maintains the open-file list and debounces change notifications to
/// subscribers.
///
/// Cloning an `Aggregator` clones the handle, not the state; all clones
/// share the same file list and subscriber set.
#[derive(Clone)]
pub struct Aggregator {
    state: std::sync::Arc<AggregatorState>,
    debounce: Duration,
}

impl Aggregator {
    /// Creates an aggregator whose debounce timer fires `debounce` after the
    /// last mutation, and spawns its background coalescing task.
    #[must_use]
    pub fn new(debounce: Duration) -> Self {
        let state = std::sync::Arc::new(AggregatorState {
            files: StdMutex::new(FileList::default()),
            next_ordinal: AtomicU64::new(0),
            next_subscriber_id: AtomicU64::new(0),
            subscribers: StdMutex::new(Vec::new()),
            deadline: StdMutex::new(None),
            notify: Notify::new(),
        });
        let aggregator = Self { state, debounce };
        aggregator.spawn_debounce_task();
        aggregator
    }

    fn spawn_debounce_task(&self) {
        let state = self.state.clone();
        let debounce = self.debounce;
        tokio::spawn(async move {
            loop {
                state.notify.notified().await;
                loop {
                    let target = *state.deadline.lock().unwrap_or_else(|e| e.into_inner());
                    let Some(target) = target else { break };
                    if Instant::now() >= target {
                        *state.deadline.lock().unwrap_or_else(|e| e.into_inner()) = None;
                        Self::fire(&state);
                        break;
                    }
                    tokio::time::sleep_until(target.into()).await;
                }
            }
        });
    }

    fn fire(state: &std::sync::Arc<AggregatorState>) {
        let subscribers = state.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        for (_, cb) in subscribers.iter() {
            cb();
        }
    }

    fn schedule_notify(&self) {
        let fire_at = Instant::now() + self.debounce;
        *self.state.deadline.lock().unwrap_or_else(|e| e.into_inner()) = Some(fire_at);
        self.state.notify.notify_one();
    }

    /// A read-only, copy-on-read snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> IdeContext {
        let files = self.state.files.lock().unwrap_or_else(|e| e.into_inner()).clone();
        IdeContext {
            workspace_state: WorkspaceState {
                open_files: files,
                is_trusted: true,
            },
        }
    }

    /// Subscribes to debounced change notifications. Returns a `dispose`
    /// handle that is safe to call from within a subscriber callback.
    pub fn on_did_change<F>(&self, callback: F) -> Disposable
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.state.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut subs = self.state.subscribers.lock().unwrap_or_else(|e| e.into_inner());
            subs.push((id, Box::new(callback)));
        }
        Disposable {
            state: self.state.clone(),
            id,
        }
    }

    /// Handles a `buffer_enter` editor event.
    pub fn on_buffer_enter(&self, path: &str) {
        if !is_absolute(path) {
            warn!(path, "dropping buffer_enter with non-absolute path");
            return;
        }
        let ordinal = self.state.next_ordinal.fetch_add(1, Ordering::Relaxed);
        {
            let mut files = self.state.files.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(idx) = files.position(path) {
                files.0.remove(idx);
            }
            for file in &mut files.0 {
                file.is_active = false;
                file.cursor = None;
                file.selected_text = None;
            }
            files.0.insert(
                0,
                OpenFile {
                    path: path.to_string(),
                    timestamp: ordinal,
                    is_active: true,
                    cursor: None,
                    selected_text: None,
                },
            );
            if files.0.len() > MAX_FILES {
                if let Some(idx) = files.0.iter().rposition(|f| !f.is_active) {
                    files.0.remove(idx);
                } else {
                    files.0.truncate(MAX_FILES);
                }
            }
        }
        debug!(path, "buffer_enter applied");
        self.schedule_notify();
    }

    /// Handles a `cursor_moved` editor event.
    pub fn on_cursor_moved(&self, line: u32, character: u32) {
        let mut files = self.state.files.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(idx) = files.active_index() {
            files.0[idx].cursor = Some(Cursor { line, character });
        }
        drop(files);
        self.schedule_notify();
    }

    /// Handles a `visual_changed` editor event.
    pub fn on_visual_changed(&self, text: &str) {
        let mut files = self.state.files.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(idx) = files.active_index() {
            files.0[idx].selected_text = normalize_selection(text);
        }
        drop(files);
        self.schedule_notify();
    }

    /// Handles a `buffer_closed` editor event.
    pub fn on_buffer_closed(&self, path: &str) {
        {
            let mut files = self.state.files.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(idx) = files.position(path) {
                files.0.remove(idx);
            }
        }
        self.schedule_notify();
    }
}

/// Handle returned by [`Aggregator::on_did_change`]. Dropping it does not
/// unsubscribe; call [`Disposable::dispose`] explicitly.
pub struct Disposable {
    state: std::sync::Arc<AggregatorState>,
    id: u64,
}

impl Disposable {
    /// Removes the associated subscriber. Safe to call from within the
    /// subscriber's own callback, and safe regardless of how many other
    /// subscribers have since been added or disposed.
    pub fn dispose(&self) {
        let mut subs = self.state.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.retain(|(id, _)| *id != self.id);
    }
}

fn is_absolute(path: &str) -> bool {
    !path.is_empty() && std::path::Path::new(path).is_absolute()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[tokio::test]
    async fn buffer_enter_sets_active_file() {
        let agg = Aggregator::new(Duration::from_millis(10));
        agg.on_buffer_enter("/a");
        let ctx = agg.state();
        assert_eq!(ctx.workspace_state.open_files.len(), 1);
        assert!(ctx.workspace_state.open_files.entries()[0].is_active);
        assert_eq!(ctx.workspace_state.open_files.entries()[0].path, "/a");
    }

    #[tokio::test]
    async fn buffer_enter_demotes_previous_active() {
        let agg = Aggregator::new(Duration::from_millis(10));
        agg.on_buffer_enter("/a");
        agg.on_cursor_moved(3, 7);
        agg.on_buffer_enter("/b");
        let ctx = agg.state();
        let files = ctx.workspace_state.open_files.entries();
        assert_eq!(files.len(), 2);
        let a = files.iter().find(|f| f.path == "/a").unwrap_or(&files[0]);
        assert!(!a.is_active);
        assert!(a.cursor.is_none());
    }

    #[tokio::test]
    async fn rejects_non_absolute_path() {
        let agg = Aggregator::new(Duration::from_millis(10));
        agg.on_buffer_enter("relative/path");
        assert!(agg.state().workspace_state.open_files.is_empty());
    }

    #[tokio::test]
    async fn eviction_keeps_ten_and_active_at_front() {
        let agg = Aggregator::new(Duration::from_millis(10));
        for i in 1..=11 {
            agg.on_buffer_enter(&format!("/f{i}"));
        }
        let ctx = agg.state();
        let files = ctx.workspace_state.open_files.entries();
        assert_eq!(files.len(), MAX_FILES);
        assert!(!files.iter().any(|f| f.path == "/f1"));
        assert_eq!(files[0].path, "/f11");
        assert!(files[0].is_active);
    }

    #[tokio::test]
    async fn selected_text_truncated_and_empty_normalizes() {
        let agg = Aggregator::new(Duration::from_millis(10));
        agg.on_buffer_enter("/a");
        let long = "x".repeat(MAX_SELECTED_TEXT + 100);
        agg.on_visual_changed(&long);
        let ctx = agg.state();
        let selected = ctx.workspace_state.open_files.entries()[0]
            .selected_text
            .clone()
            .unwrap_or_default();
        assert_eq!(selected.len(), MAX_SELECTED_TEXT);

        agg.on_visual_changed("");
        let ctx = agg.state();
        assert!(ctx.workspace_state.open_files.entries()[0].selected_text.is_none());
    }

    #[tokio::test]
    async fn buffer_closed_removes_entry() {
        let agg = Aggregator::new(Duration::from_millis(10));
        agg.on_buffer_enter("/a");
        agg.on_buffer_closed("/a");
        assert!(agg.state().workspace_state.open_files.is_empty());
    }

    #[tokio::test]
    async fn burst_yields_bounded_callbacks() {
        let agg = Aggregator::new(Duration::from_millis(30));
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let _disposable = agg.on_did_change(move || {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        agg.on_buffer_enter("/a");
        for i in 0..20 {
            agg.on_cursor_moved(1, i);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        tokio::time::sleep(Duration::from_millis(80)).await;
        let fired = count.load(Ordering::SeqCst);
        assert!(fired >= 1 && fired <= 2, "expected 1-2 callbacks, got {fired}");
    }

    #[tokio::test]
    async fn dispose_stops_future_callbacks() {
        let agg = Aggregator::new(Duration::from_millis(10));
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let disposable = agg.on_did_change(move || {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        agg.on_buffer_enter("/a");
        tokio::time::sleep(Duration::from_millis(40)).await;
        disposable.dispose();
        agg.on_buffer_enter("/b");
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dispose_removes_only_the_associated_subscriber() {
        let agg = Aggregator::new(Duration::from_millis(10));
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let third = Arc::new(AtomicUsize::new(0));

        let first_handle = agg.on_did_change({
            let first = first.clone();
            move || { first.fetch_add(1, Ordering::SeqCst); }
        });
        let _second_handle = agg.on_did_change({
            let second = second.clone();
            move || { second.fetch_add(1, Ordering::SeqCst); }
        });
        let _third_handle = agg.on_did_change({
            let third = third.clone();
            move || { third.fetch_add(1, Ordering::SeqCst); }
        });

        first_handle.dispose();

        agg.on_buffer_enter("/a");
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(third.load(Ordering::SeqCst), 1);
    }
}
