// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The data model (§3): tabs, per-user state, and the snapshots handed to
//! transports.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::ids::TabId;
use crate::ring::{HistoryBuffer, OutputBuffer};
use crate::runner_client::RunControl;

/// Maximum length of a sanitized tab name before the numeric disambiguator.
pub const TAB_NAME_MAX: usize = 10;
/// Suffix appended when a tab name had to be truncated to fit `TAB_NAME_MAX`.
pub const TAB_NAME_SUFFIX: &str = "\u{2026}";
/// Default output ring buffer capacity, in rendered lines.
pub const BUFFER_MAX_LINES: usize = 2000;
/// Maximum command-history entries retained per tab.
pub const HISTORY_MAX: usize = 200;

/// Runtime status of a tab (§3 invariant 1: exactly one holds, and
/// `Running <=> Run.is_some()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabStatus {
    Idle,
    Running,
    Stopping,
    Failed,
}

/// Token usage reported at the end of a turn (`turn.completed`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cached_input_tokens: u64,
}

/// A reference to the repo a tab is bound to (host-relative path plus the
/// human-facing name used to resolve/clone it, §4.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub name: String,
    pub path: String,
}

/// Per-user UI preferences (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub theme: String,
    pub full_command_output: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self { theme: "default".into(), full_command_output: false }
    }
}

/// An active run's cancellation hook, held by the tab and invoked by
/// `StopSession`/`CloseTab`/user teardown — the only valid cancellation
/// paths (§5).
#[derive(Debug, Clone, Default)]
pub struct RunCancel(Option<CancellationToken>);

impl RunCancel {
    pub fn new(token: CancellationToken) -> Self {
        Self(Some(token))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn cancel(&self) {
        if let Some(token) = &self.0 {
            token.cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.0.is_some()
    }

    /// The underlying token, for a caller that needs to select on it
    /// alongside other work (the `SendPrompt` run task).
    pub fn token(&self) -> Option<CancellationToken> {
        self.0.clone()
    }
}

/// An interactive slot belonging to one user (§3).
pub struct Tab {
    pub id: TabId,
    pub name: String,
    pub repo: RepoRef,
    pub model: String,
    pub reasoning_effort: Option<String>,
    /// Empty until the first `thread.started` event (§3 invariant 5).
    pub session_id: String,
    pub status: TabStatus,
    pub run_cancel: RunCancel,
    pub output: OutputBuffer,
    pub history: HistoryBuffer,
    pub last_usage: Option<TurnUsage>,
}

impl Tab {
    pub fn new(id: TabId, name: String, repo: RepoRef, model: String) -> Self {
        Self {
            id,
            name,
            repo,
            model,
            reasoning_effort: None,
            session_id: String::new(),
            status: TabStatus::Idle,
            run_cancel: RunCancel::none(),
            output: OutputBuffer::new(BUFFER_MAX_LINES),
            history: HistoryBuffer::new(HISTORY_MAX),
            last_usage: None,
        }
    }

    /// Invariant 1 (§8): `Running <=> run_cancel.is_active()`. The service
    /// sets both together on every transition; this asserts it held.
    pub fn is_running(&self) -> bool {
        let running = matches!(self.status, TabStatus::Running);
        debug_assert_eq!(running, self.run_cancel.is_active());
        running
    }

    pub fn snapshot(&self) -> TabSnapshot {
        TabSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            repo: self.repo.clone(),
            model: self.model.clone(),
            reasoning_effort: self.reasoning_effort.clone(),
            session_id: self.session_id.clone(),
            status: self.status,
            last_usage: self.last_usage,
        }
    }
}

/// Read-only projection of a [`Tab`] safe to hand to transports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabSnapshot {
    pub id: TabId,
    pub name: String,
    pub repo: RepoRef,
    pub model: String,
    pub reasoning_effort: Option<String>,
    pub session_id: String,
    pub status: TabStatus,
    pub last_usage: Option<TurnUsage>,
}

/// All per-user state the service holds (§3): tabs in creation order, the
/// single active tab (if any), the system message ring, and UI preferences.
pub struct UserState {
    pub tabs: IndexMap<TabId, Tab>,
    pub active_tab: Option<TabId>,
    pub system_buffer: OutputBuffer,
    pub preferences: Preferences,
    /// Signal capability for each tab's in-flight run, kept alongside the
    /// run task's own (exclusive) `RunHandle` so `CloseTab`/`StopSession`
    /// can signal it independently (§4.1, §5).
    pub active_runs: HashMap<TabId, Arc<dyn RunControl>>,
}

impl UserState {
    pub fn new() -> Self {
        Self {
            tabs: IndexMap::new(),
            active_tab: None,
            system_buffer: OutputBuffer::new(BUFFER_MAX_LINES),
            preferences: Preferences::default(),
            active_runs: HashMap::new(),
        }
    }
}

impl Default for UserState {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle describing where a runner mounted a user's workspace (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerInfo {
    pub repo_root: String,
    pub home_dir: String,
    pub ssh_auth_sock: String,
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
