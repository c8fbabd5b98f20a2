// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-user bounded broadcast channels for TUI/SSH subscribers (C7).
//!
//! Unlike the hub (C6), the bus has no seq numbers or replay — each SSH
//! terminal session is expected to redraw from the current buffer snapshot
//! on (re)attach, then follow live events. A lagging subscriber simply
//! misses intermediate events (`broadcast::error::RecvError::Lagged`); it is
//! the subscriber's job to resync from a fresh `GetBuffer` call.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::ids::UserId;

/// Default bounded channel capacity per user (§5: one task per terminal
/// session reads from this channel).
pub const BUS_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum BusEvent {
    Output(String),
    System(String),
    Tab(serde_json::Value),
}

pub struct TerminalBus {
    channels: Mutex<HashMap<UserId, broadcast::Sender<BusEvent>>>,
    capacity: usize,
}

impl Default for TerminalBus {
    fn default() -> Self {
        Self::new(BUS_CHANNEL_CAPACITY)
    }
}

impl TerminalBus {
    pub fn new(capacity: usize) -> Self {
        Self { channels: Mutex::new(HashMap::new()), capacity }
    }

    fn sender(&self, user: &UserId) -> broadcast::Sender<BusEvent> {
        let mut channels = self.channels.lock();
        channels
            .entry(user.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    pub fn subscribe(&self, user: &UserId) -> broadcast::Receiver<BusEvent> {
        self.sender(user).subscribe()
    }

    /// Best-effort publish; a channel with no subscribers is a normal no-op
    /// (the `send` error is ignored, matching the hub's nonblocking-fanout
    /// contract in §5).
    pub fn publish(&self, user: &UserId, event: BusEvent) {
        let _ = self.sender(user).send(event);
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
