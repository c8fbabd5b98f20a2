// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `EventSink` fanout (§4.1, §9): every buffer mutation is pushed
//! through one sink. When the hub, the terminal bus, and an audit log are
//! all present, they compose into a single `Fanout` value — delivery to
//! each is independent and none can block the others.

use std::sync::Arc;

use crate::bus::{BusEvent, TerminalBus};
use crate::hub::EventHub;
use crate::ids::UserId;

/// A destination for tab/session output deltas.
pub trait EventSink: Send + Sync {
    fn on_output(&self, user: &UserId, line: &str);
    fn on_system_output(&self, user: &UserId, line: &str);
    fn on_tab_event(&self, user: &UserId, payload: serde_json::Value);
}

/// Composes any number of sinks into one value. Not a pointer cycle: each
/// member is an owned `Arc`, and `Fanout` itself is cheaply cloneable.
#[derive(Clone, Default)]
pub struct Fanout {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for Fanout {
    fn on_output(&self, user: &UserId, line: &str) {
        for sink in &self.sinks {
            sink.on_output(user, line);
        }
    }

    fn on_system_output(&self, user: &UserId, line: &str) {
        for sink in &self.sinks {
            sink.on_system_output(user, line);
        }
    }

    fn on_tab_event(&self, user: &UserId, payload: serde_json::Value) {
        for sink in &self.sinks {
            sink.on_tab_event(user, payload.clone());
        }
    }
}

/// Adapts the SSE hub (C6) to `EventSink`.
pub struct HubSink(pub Arc<EventHub>);

impl EventSink for HubSink {
    fn on_output(&self, user: &UserId, line: &str) {
        self.0.on_output(user, line);
    }

    fn on_system_output(&self, user: &UserId, line: &str) {
        self.0.on_system_output(user, line);
    }

    fn on_tab_event(&self, user: &UserId, payload: serde_json::Value) {
        self.0.on_tab_event(user, payload);
    }
}

/// Adapts the terminal event bus (C7) to `EventSink`.
pub struct BusSink(pub Arc<TerminalBus>);

impl EventSink for BusSink {
    fn on_output(&self, user: &UserId, line: &str) {
        self.0.publish(user, BusEvent::Output(line.to_string()));
    }

    fn on_system_output(&self, user: &UserId, line: &str) {
        self.0.publish(user, BusEvent::System(line.to_string()));
    }

    fn on_tab_event(&self, user: &UserId, payload: serde_json::Value) {
        self.0.publish(user, BusEvent::Tab(payload));
    }
}

/// Logs every delta at debug level — the audit log sink referenced in §4.1.
/// Command audit entries themselves are logged directly by the service
/// before dispatch (structured `command_type`/`command`/`tab`/`user`
/// fields); this sink covers the buffer-delta side of the contract.
pub struct AuditSink;

impl EventSink for AuditSink {
    fn on_output(&self, user: &UserId, line: &str) {
        tracing::debug!(user = %user, kind = "output", %line, "buffer delta");
    }

    fn on_system_output(&self, user: &UserId, line: &str) {
        tracing::debug!(user = %user, kind = "system", %line, "buffer delta");
    }

    fn on_tab_event(&self, user: &UserId, payload: serde_json::Value) {
        tracing::debug!(user = %user, kind = "tab", %payload, "buffer delta");
    }
}

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;
