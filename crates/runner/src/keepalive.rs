// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keepalive-based self-termination (§4.3, §8 boundary behavior): the
//! daemon tracks the last time the host pinged it and shuts itself down once
//! `misses × interval` has elapsed without one. This is the liveness
//! contract a crashed host relies on — no ping means no runner left behind.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

pub struct Keepalive {
    last_ping: Mutex<Instant>,
    interval: Duration,
    misses: u32,
}

impl Keepalive {
    pub fn new(interval: Duration, misses: u32) -> Self {
        Self { last_ping: Mutex::new(Instant::now()), interval, misses }
    }

    /// `Ping()` RPC handler: record that the host is still alive.
    pub fn ping(&self) {
        *self.last_ping.lock() = Instant::now();
    }

    fn window(&self) -> Duration {
        self.interval * self.misses
    }

    fn expired(&self) -> bool {
        self.last_ping.lock().elapsed() > self.window()
    }

    /// Poll at `interval` until the miss window elapses, then cancel
    /// `shutdown`. Exits early if `shutdown` is cancelled by some other
    /// path first (e.g. a signal handler).
    pub async fn watch(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = ticker.tick() => {}
            }
            if self.expired() {
                tracing::warn!(misses = self.misses, interval_secs = self.interval.as_secs(), "keepalive window elapsed, shutting down");
                shutdown.cancel();
                return;
            }
        }
    }
}

#[cfg(test)]
#[path = "keepalive_tests.rs"]
mod tests;
