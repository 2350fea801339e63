// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Owns the set of live client sessions, fans context and diff notifications
//! out to them, and enforces the keep-alive contract.
//!
//! The concurrent session map is grounded on `ahma_mcp`'s `SessionManager`
//! (a `DashMap<SessionId, Arc<Session>>`); per-session outbox delivery is
//! grounded on `EventBroadcaster`'s cheaply-cloneable fan-out handle.

use crate::context::IdeContext;
use crate::diff::DiffOutcome;
use crate::rpc::Notification;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Per-session keep-alive health, driven only by ping outcome and transport
/// close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAliveState {
    /// Zero missed pings.
    Active,
    /// At least one missed ping, fewer than the threshold.
    Failing,
    /// Missed-ping threshold reached; the timer has stopped.
    Abandoned,
}

/// A live client session: its outbound transport and keep-alive bookkeeping.
pub struct Session {
    id: Uuid,
    outbox: mpsc::UnboundedSender<Bytes>,
    missed_pings: AtomicU32,
    initial_context_sent: AtomicBool,
    closed: AtomicBool,
}

impl Session {
    /// This session's identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Sends a raw frame (one JSON-RPC message) to this session's transport.
    /// Never holds a lock across the send; `mpsc` senders are lock-free.
    fn send(&self, payload: Bytes) -> bool {
        self.outbox.send(payload).is_ok()
    }

    fn send_json(&self, value: &serde_json::Value) -> bool {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.send(Bytes::from(bytes)),
            Err(e) => {
                warn!(session = %self.id, "failed to serialize outbound message: {e}");
                false
            }
        }
    }

    /// Whether this session has delivered its one-time initial context
    /// update. Marks it delivered as a side effect of the first `true`-path
    /// check.
    pub fn take_initial_context_flag(&self) -> bool {
        self.initial_context_sent.swap(true, Ordering::SeqCst)
    }
}

/// Owns live sessions and drives their keep-alive timers.
#[derive(Clone)]
pub struct SessionHub {
    sessions: Arc<DashMap<Uuid, Arc<Session>>>,
    keepalive_interval: Duration,
    miss_threshold: u32,
}

impl SessionHub {
    /// Creates an empty hub with the given keep-alive interval and miss
    /// threshold.
    #[must_use]
    pub fn new(keepalive_interval: Duration, miss_threshold: u32) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            keepalive_interval,
            miss_threshold,
        }
    }

    /// Creates a new session bound to a new UUID v4, returning its handle
    /// and the receiving half of its outbox (fed to the HTTP transport).
    /// Starts the session's keep-alive timer.
    pub fn create(&self) -> (Arc<Session>, mpsc::UnboundedReceiver<Bytes>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(Session {
            id,
            outbox: tx,
            missed_pings: AtomicU32::new(0),
            initial_context_sent: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });
        self.sessions.insert(id, session.clone());
        info!(session = %id, "session created");
        self.spawn_keepalive(session.clone());
        (session, rx)
    }

    fn spawn_keepalive(&self, session: Arc<Session>) {
        let hub = self.clone();
        tokio::spawn(async move {
            let ping = serde_json::json!({ "jsonrpc": "2.0", "method": "ping" });
            loop {
                tokio::time::sleep(hub.keepalive_interval).await;
                if session.closed.load(Ordering::SeqCst) {
                    break;
                }
                if session.send_json(&ping) {
                    session.missed_pings.store(0, Ordering::SeqCst);
                } else {
                    let misses = session.missed_pings.fetch_add(1, Ordering::SeqCst) + 1;
                    warn!(session = %session.id, misses, "keep-alive ping failed");
                    if misses >= hub.miss_threshold {
                        hub.destroy(session.id);
                        break;
                    }
                }
            }
        });
    }

    /// Looks up a live session by id.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|entry| entry.clone())
    }

    /// Removes a session from the map and marks its keep-alive timer for
    /// shutdown. Idempotent.
    pub fn destroy(&self, id: Uuid) {
        if let Some((_, session)) = self.sessions.remove(&id) {
            session.closed.store(true, Ordering::SeqCst);
            info!(session = %id, "session destroyed");
        }
    }

    /// Broadcasts an `ide/contextUpdate` notification built from `context` to
    /// every live session.
    pub fn broadcast_context(&self, context: &IdeContext) {
        let Ok(notification) = Notification::new("ide/contextUpdate", context) else {
            warn!("failed to serialize context for broadcast");
            return;
        };
        self.broadcast(&notification);
    }

    /// Sends an `ide/contextUpdate` notification to a single session, used
    /// for the one-time initial push on a session's first `GET`. Does
    /// nothing if `id` is not a live session.
    pub fn send_context_to(&self, id: Uuid, context: &IdeContext) {
        let Ok(notification) = Notification::new("ide/contextUpdate", context) else {
            warn!("failed to serialize context for initial push");
            return;
        };
        let Ok(value) = serde_json::to_value(&notification) else {
            return;
        };
        if let Some(session) = self.get(id) {
            session.send_json(&value);
        }
    }

    /// Broadcasts a diff outcome notification to every live session.
    pub fn broadcast_diff(&self, outcome: &DiffOutcome) {
        match outcome.to_notification() {
            Ok(notification) => self.broadcast(&notification),
            Err(e) => warn!("failed to serialize diff outcome: {e}"),
        }
    }

    fn broadcast(&self, notification: &Notification) {
        let Ok(value) = serde_json::to_value(notification) else {
            return;
        };
        for entry in self.sessions.iter() {
            entry.value().send_json(&value);
        }
    }

    /// Number of currently live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the hub has no live sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
