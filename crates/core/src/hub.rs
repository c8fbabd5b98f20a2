// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-user seq-numbered event log backing SSE replay (C6, §4.5).
//!
//! Publishing never blocks: sends to subscriber channels are best-effort
//! (`try_send`), and a full channel is treated as a dropped delivery, not a
//! stall — no subscriber can slow down another or the publisher (§5).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::event::{StreamEvent, StreamEventKind};
use crate::ids::UserId;

/// Default bounded capacity of each subscriber's channel (§4.5).
pub const SUBSCRIBER_CHANNEL_CAPACITY: usize = 256;
/// Default number of most-recent events retained per user for replay (§4.5).
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

struct UserHubInner {
    seq: u64,
    history: VecDeque<StreamEvent>,
    subscribers: HashMap<u64, mpsc::Sender<StreamEvent>>,
    next_sub_id: u64,
}

struct UserHub {
    inner: Mutex<UserHubInner>,
    dropped: AtomicU64,
    history_capacity: usize,
}

impl UserHub {
    fn new(history_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(UserHubInner {
                seq: 0,
                history: VecDeque::new(),
                subscribers: HashMap::new(),
                next_sub_id: 0,
            }),
            dropped: AtomicU64::new(0),
            history_capacity,
        }
    }
}

/// Per-user seq-numbered event hub backing SSE `/api/stream` replay.
pub struct EventHub {
    users: Mutex<HashMap<UserId, Arc<UserHub>>>,
    history_capacity: usize,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

/// Removes a subscriber entry from its hub when dropped. Split out from
/// [`Subscription`] so callers can still move `receiver`/`history` out of a
/// subscription (a type implementing `Drop` directly cannot have its fields
/// moved out of it).
struct SubscriberGuard {
    hub: Arc<UserHub>,
    id: u64,
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        self.hub.inner.lock().subscribers.remove(&self.id);
    }
}

/// A live subscription to a user's event hub.
pub struct Subscription {
    _guard: SubscriberGuard,
    pub receiver: mpsc::Receiver<StreamEvent>,
    pub current_seq: u64,
    pub history: Vec<StreamEvent>,
}

impl EventHub {
    pub fn new(history_capacity: usize) -> Self {
        Self { users: Mutex::new(HashMap::new()), history_capacity }
    }

    fn user_hub(&self, user: &UserId) -> Arc<UserHub> {
        let mut users = self.users.lock();
        users
            .entry(user.clone())
            .or_insert_with(|| Arc::new(UserHub::new(self.history_capacity)))
            .clone()
    }

    /// Subscribe a new client for `user`. Returns the live receiver plus
    /// everything needed to reproduce the exactly-once view (§4.5): the
    /// seq the subscriber starts from and a snapshot of retained history.
    pub fn subscribe(&self, user: &UserId) -> Subscription {
        let hub = self.user_hub(user);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        let mut inner = hub.inner.lock();
        let id = inner.next_sub_id;
        inner.next_sub_id += 1;
        inner.subscribers.insert(id, tx);
        let current_seq = inner.seq;
        let history = inner.history.iter().cloned().collect();
        drop(inner);
        Subscription { _guard: SubscriberGuard { hub, id }, receiver: rx, current_seq, history }
    }

    /// Publish a new event, returning its assigned seq. Per-user seq is
    /// strictly monotonic across all event kinds (§5, §8 invariant 3).
    pub fn publish(&self, user: &UserId, kind: StreamEventKind, payload: serde_json::Value) -> u64 {
        let hub = self.user_hub(user);
        let mut inner = hub.inner.lock();
        inner.seq += 1;
        let event = StreamEvent { seq: inner.seq, kind, payload, timestamp_ms: now_ms() };

        inner.history.push_back(event.clone());
        while inner.history.len() > hub.history_capacity {
            inner.history.pop_front();
        }

        let mut dead = Vec::new();
        for (id, tx) in inner.subscribers.iter() {
            match tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    hub.dropped.fetch_add(1, Ordering::Relaxed);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    dead.push(*id);
                }
            }
        }
        for id in dead {
            inner.subscribers.remove(&id);
        }
        event.seq
    }

    pub fn on_output(&self, user: &UserId, line: &str) -> u64 {
        self.publish(user, StreamEventKind::Output, serde_json::json!({ "line": line }))
    }

    pub fn on_system_output(&self, user: &UserId, line: &str) -> u64 {
        self.publish(user, StreamEventKind::System, serde_json::json!({ "line": line }))
    }

    pub fn on_tab_event(&self, user: &UserId, payload: serde_json::Value) -> u64 {
        self.publish(user, StreamEventKind::Tab, payload)
    }

    /// Events with `seq > after_seq`, in order, for `Last-Event-ID` replay.
    pub fn replay(&self, user: &UserId, after_seq: u64) -> Vec<StreamEvent> {
        let hub = self.user_hub(user);
        let inner = hub.inner.lock();
        inner.history.iter().filter(|e| e.seq > after_seq).cloned().collect()
    }

    /// Count of events dropped due to a full subscriber channel.
    pub fn dropped_count(&self, user: &UserId) -> u64 {
        self.user_hub(user).dropped.load(Ordering::Relaxed)
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
