// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tab/session service (C5, §4.1): per-user tab state machines, prompt
//! dispatch, and event fanout. A single lock per user protects that user's
//! tab map; run tasks hold no lock across the blocking calls they make into
//! the runner.

pub mod render;
pub mod sanitize;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, CoreResult};
use crate::event::{ExecEvent, Item, Signal};
use crate::ids::{RunId, TabId, UserId};
use crate::model::{RunCancel, Tab, TabSnapshot, TabStatus, UserState};
use crate::repo::RepoResolver;
use crate::runner_client::{CommandStream, RunOutcome, RunnerClient, RunnerProvider};
use crate::sink::Fanout;

use render::{render_event, render_worked_for, RenderState};
use sanitize::unique_sanitized_name;

/// Aggregated summary shown to `ListTabs` callers (§4.1).
pub struct TabList {
    pub tabs: Vec<TabSnapshot>,
    pub active_tab: Option<TabId>,
    pub theme: String,
}

pub struct TabSessionService {
    users: parking_lot::RwLock<HashMap<UserId, Arc<Mutex<UserState>>>>,
    repos: Arc<dyn RepoResolver>,
    runners: Arc<dyn RunnerProvider>,
    sink: Fanout,
    /// Base context every detached run task derives its lifetime from; an
    /// HTTP request's own cancellation never reaches it (§4.1, §5).
    background: CancellationToken,
}

impl TabSessionService {
    pub fn new(repos: Arc<dyn RepoResolver>, runners: Arc<dyn RunnerProvider>, sink: Fanout, background: CancellationToken) -> Self {
        Self { users: parking_lot::RwLock::new(HashMap::new()), repos, runners, sink, background }
    }

    fn user_state(&self, user: &UserId) -> Arc<Mutex<UserState>> {
        if let Some(state) = self.users.read().get(user) {
            return state.clone();
        }
        self.users.write().entry(user.clone()).or_insert_with(|| Arc::new(Mutex::new(UserState::new()))).clone()
    }

    fn with_tab<T>(&self, user: &UserId, tab_id: &TabId, f: impl FnOnce(&mut Tab) -> CoreResult<T>) -> CoreResult<T> {
        let state = self.user_state(user);
        let mut guard = state.lock();
        let tab = guard.tabs.get_mut(tab_id).ok_or_else(|| CoreError::tab_not_found(tab_id.as_str()))?;
        f(tab)
    }

    fn append_output_line(&self, user: &UserId, tab_id: &TabId, line: &str) {
        let state = self.user_state(user);
        {
            let mut guard = state.lock();
            if let Some(tab) = guard.tabs.get_mut(tab_id) {
                tab.output.push(line.to_string());
            }
        }
        self.sink.on_output(user, line);
    }

    fn append_system_line(&self, user: &UserId, line: &str) {
        let state = self.user_state(user);
        {
            let mut guard = state.lock();
            guard.system_buffer.push(line.to_string());
        }
        self.sink.on_system_output(user, line);
    }

    fn emit_tab_event(&self, user: &UserId, snapshot: &TabSnapshot) {
        let payload = serde_json::to_value(snapshot).unwrap_or(serde_json::Value::Null);
        self.sink.on_tab_event(user, payload);
    }

    // -- CRUD (§4.1) ---------------------------------------------------

    /// `CreateTab{repoName, createRepo?, model?}`.
    pub fn create_tab(&self, user: &UserId, repo_name: &str, create_repo: bool, model: Option<String>) -> CoreResult<TabSnapshot> {
        let repo = self.repos.resolve_or_create(user, repo_name, create_repo)?;
        let state = self.user_state(user);
        let tab_id = TabId::generate();
        let snapshot = {
            let mut guard = state.lock();
            let name = unique_sanitized_name(repo_name, guard.tabs.values().map(|t| t.name.clone()));
            let model = model.unwrap_or_else(|| "gpt-5".to_string());
            let tab = Tab::new(tab_id.clone(), name, repo, model);
            let snapshot = tab.snapshot();
            guard.tabs.insert(tab_id.clone(), tab);
            if guard.active_tab.is_none() {
                guard.active_tab = Some(tab_id.clone());
            }
            snapshot
        };
        self.emit_tab_event(user, &snapshot);
        Ok(snapshot)
    }

    /// `CloseTab{tabID}`.
    pub async fn close_tab(&self, user: &UserId, tab_id: &TabId) -> CoreResult<()> {
        self.stop_active_run(user, tab_id).await?;

        let state = self.user_state(user);
        {
            let mut guard = state.lock();
            guard.tabs.shift_remove(tab_id).ok_or_else(|| CoreError::tab_not_found(tab_id.as_str()))?;
            if guard.active_tab.as_ref() == Some(tab_id) {
                guard.active_tab = guard.tabs.keys().next_back().cloned();
            }
        }
        self.runners.close_tab(user, tab_id).await;
        Ok(())
    }

    /// `ListTabs`.
    pub fn list_tabs(&self, user: &UserId) -> TabList {
        let state = self.user_state(user);
        let guard = state.lock();
        TabList {
            tabs: guard.tabs.values().map(Tab::snapshot).collect(),
            active_tab: guard.active_tab.clone(),
            theme: guard.preferences.theme.clone(),
        }
    }

    /// `ActivateTab{tabID}`.
    pub fn activate_tab(&self, user: &UserId, tab_id: &TabId) -> CoreResult<TabSnapshot> {
        let state = self.user_state(user);
        let snapshot = {
            let mut guard = state.lock();
            let Some(tab) = guard.tabs.get(tab_id) else {
                return Err(CoreError::tab_not_found(tab_id.as_str()));
            };
            let snapshot = tab.snapshot();
            guard.active_tab = Some(tab_id.clone());
            snapshot
        };
        self.emit_tab_event(user, &snapshot);
        Ok(snapshot)
    }

    /// `RenewSession{tabID}`: clears SessionID so the next run starts fresh.
    pub fn renew_session(&self, user: &UserId, tab_id: &TabId) -> CoreResult<()> {
        self.with_tab(user, tab_id, |tab| {
            tab.session_id.clear();
            Ok(())
        })
    }

    /// `StopSession{tabID}`: same signal sequence as `CloseTab`, but the tab
    /// survives and is reset to `Idle`.
    pub async fn stop_session(&self, user: &UserId, tab_id: &TabId) -> CoreResult<()> {
        self.stop_active_run(user, tab_id).await?;
        self.with_tab(user, tab_id, |tab| {
            tab.status = TabStatus::Idle;
            tab.run_cancel = RunCancel::none();
            Ok(())
        })
    }

    /// `AppendOutput{tabID, line}`: used by the command router for shell
    /// command results that don't come from an agent run (§4.7 `!command`).
    pub fn append_output(&self, user: &UserId, tab_id: &TabId, line: &str) -> CoreResult<()> {
        self.with_tab(user, tab_id, |_| Ok(()))?;
        self.append_output_line(user, tab_id, line);
        Ok(())
    }

    /// `AppendSystemOutput{line}`.
    pub fn append_system_output(&self, user: &UserId, line: &str) {
        self.append_system_line(user, line);
    }

    pub fn append_history(&self, user: &UserId, tab_id: &TabId, entry: &str) -> CoreResult<()> {
        self.with_tab(user, tab_id, |tab| {
            tab.history.push(entry.to_string());
            Ok(())
        })
    }

    pub fn get_buffer(&self, user: &UserId, tab_id: &TabId, offset: usize, limit: usize) -> CoreResult<Vec<String>> {
        self.with_tab(user, tab_id, |tab| Ok(tab.output.scroll(offset, limit)))
    }

    pub fn get_system_buffer(&self, user: &UserId, limit: usize) -> Vec<String> {
        let state = self.user_state(user);
        let guard = state.lock();
        guard.system_buffer.scroll(0, limit)
    }

    pub fn get_history(&self, user: &UserId, tab_id: &TabId) -> CoreResult<Vec<String>> {
        self.with_tab(user, tab_id, |tab| Ok(tab.history.entries()))
    }

    pub fn get_tab_usage(&self, user: &UserId, tab_id: &TabId) -> CoreResult<crate::model::TurnUsage> {
        self.with_tab(user, tab_id, |tab| Ok(tab.last_usage.unwrap_or_default()))
    }

    pub fn set_model(&self, user: &UserId, tab_id: &TabId, model: String) -> CoreResult<()> {
        self.with_tab(user, tab_id, |tab| {
            tab.model = model;
            Ok(())
        })
    }

    pub fn preferences(&self, user: &UserId) -> crate::model::Preferences {
        let state = self.user_state(user);
        state.lock().preferences.clone()
    }

    pub fn set_theme(&self, user: &UserId, theme: String) {
        let state = self.user_state(user);
        state.lock().preferences.theme = theme;
    }

    pub fn set_full_output(&self, user: &UserId, full: bool) {
        let state = self.user_state(user);
        state.lock().preferences.full_command_output = full;
    }

    /// `SwitchRepo{tabID, repoName}`.
    pub fn switch_repo(&self, user: &UserId, tab_id: &TabId, repo_name: &str, create_repo: bool) -> CoreResult<TabSnapshot> {
        let repo = self.repos.resolve_or_create(user, repo_name, create_repo)?;
        let state = self.user_state(user);
        let snapshot = {
            let mut guard = state.lock();
            let tab = guard.tabs.get_mut(tab_id).ok_or_else(|| CoreError::tab_not_found(tab_id.as_str()))?;
            tab.repo = repo;
            tab.session_id.clear();
            tab.snapshot()
        };
        self.emit_tab_event(user, &snapshot);
        Ok(snapshot)
    }

    pub fn list_repos(&self, user: &UserId) -> CoreResult<Vec<crate::model::RepoRef>> {
        self.repos.list(user)
    }

    pub async fn save_codex_auth(&self, user: &UserId, bytes: Vec<u8>) -> CoreResult<()> {
        self.runners.save_codex_auth(user, bytes).await
    }

    // -- Run dispatch (§4.1 SendPrompt) --------------------------------

    /// `SendPrompt{tabID, prompt}`. Returns once the run has been accepted
    /// and dispatched; the run itself continues on a detached task.
    pub async fn send_prompt(self: &Arc<Self>, user: &UserId, tab_id: &TabId, prompt: String) -> CoreResult<()> {
        let (full_output, session_id) = {
            let state = self.user_state(user);
            let mut guard = state.lock();
            let tab = guard.tabs.get_mut(tab_id).ok_or_else(|| CoreError::tab_not_found(tab_id.as_str()))?;
            if !matches!(tab.status, TabStatus::Idle) {
                return Err(CoreError::invalid_state(format!("tab {} is not idle", tab_id.as_str())));
            }
            tab.status = TabStatus::Running;
            tab.run_cancel = RunCancel::new(CancellationToken::new());
            (guard.preferences.full_command_output, tab.session_id.clone())
        };

        self.append_output_line(user, tab_id, "Starting agent exec");

        let (client, _info) = match self.runners.runner_for(user, tab_id).await {
            Ok(v) => v,
            Err(e) => {
                self.fail_run(user, tab_id, &e);
                return Err(e);
            }
        };

        for line in collect_git_metadata(client.as_ref()).await {
            self.append_output_line(user, tab_id, &line);
        }

        // Mirrors the invocation the runner's `build_argv` actually spawns
        // (centaurx-runner/src/service.rs), so the audit trail is
        // verifiable against what ran, not an internal exec/resume tag.
        let invocation = if session_id.is_empty() {
            format!("codex exec --json {prompt}")
        } else {
            format!("codex exec resume {session_id} --json {prompt}")
        };
        tracing::debug!(user = %user, tab = %tab_id.as_str(), command_type = "codex", command = %invocation, "dispatching prompt");

        let run_id = RunId::generate();
        let handle = if session_id.is_empty() {
            client.exec(run_id.clone(), prompt).await
        } else {
            client.exec_resume(run_id.clone(), session_id, prompt).await
        };

        let mut handle = match handle {
            Ok(h) => h,
            Err(e) => {
                self.fail_run(user, tab_id, &e);
                return Err(e);
            }
        };

        let run_cancel = self.run_cancel_token(user, tab_id);
        {
            let state = self.user_state(user);
            let mut guard = state.lock();
            guard.active_runs.insert(tab_id.clone(), handle.control());
        }

        let service = self.clone();
        let user = user.clone();
        let tab_id = tab_id.clone();
        tokio::spawn(async move {
            let mut render_state = RenderState::new();
            let mut thread_id = String::new();
            let mut usage = None;
            let mut worked_for_emitted = false;
            let started = Instant::now();

            loop {
                tokio::select! {
                    biased;
                    _ = run_cancel.cancelled() => break,
                    event = handle.next_event() => {
                        let Some(event) = event else { break };
                        match &event {
                            ExecEvent::ThreadStarted { thread_id: id } => thread_id = id.clone(),
                            ExecEvent::TurnCompleted { usage: u } => usage = *u,
                            _ => {}
                        }
                        // The "Worked for Ns" separator precedes the final
                        // agent message, not the run-wide trailer (§4.1).
                        if !worked_for_emitted && matches!(&event, ExecEvent::ItemCompleted { item: Item::AgentMessage { .. } }) {
                            service.append_output_line(&user, &tab_id, &render_worked_for(started.elapsed().as_secs()));
                            worked_for_emitted = true;
                        }
                        for line in render_event(&event, full_output, &mut render_state) {
                            service.append_output_line(&user, &tab_id, &line);
                        }
                    }
                }
            }

            if !worked_for_emitted && !thread_id.is_empty() {
                service.append_output_line(&user, &tab_id, &render_worked_for(started.elapsed().as_secs()));
            }

            let outcome = handle.wait().await;
            service.finish_run(&user, &tab_id, thread_id, usage, outcome);
        });

        Ok(())
    }

    fn run_cancel_token(&self, user: &UserId, tab_id: &TabId) -> CancellationToken {
        let state = self.user_state(user);
        let guard = state.lock();
        guard
            .tabs
            .get(tab_id)
            .and_then(|t| t.run_cancel.token())
            .unwrap_or_else(|| self.background.child_token())
    }

    fn finish_run(
        &self,
        user: &UserId,
        tab_id: &TabId,
        thread_id: String,
        usage: Option<crate::model::TurnUsage>,
        outcome: CoreResult<RunOutcome>,
    ) {
        let state = self.user_state(user);
        let snapshot = {
            let mut guard = state.lock();
            guard.active_runs.remove(tab_id);
            let Some(tab) = guard.tabs.get_mut(tab_id) else { return };

            if !thread_id.is_empty() {
                tab.session_id = thread_id;
            }
            if let Some(usage) = usage {
                tab.last_usage = Some(usage);
            }
            tab.status = match &outcome {
                Ok(o) if !o.failed => TabStatus::Idle,
                _ => TabStatus::Failed,
            };
            tab.run_cancel = RunCancel::none();
            tab.snapshot()
        };

        if let Err(e) = outcome {
            self.append_output_line(user, tab_id, &e.to_buffer_line());
        }
        self.emit_tab_event(user, &snapshot);
    }

    fn fail_run(&self, user: &UserId, tab_id: &TabId, error: &CoreError) {
        self.append_output_line(user, tab_id, &error.to_buffer_line());
        let snapshot = {
            let state = self.user_state(user);
            let mut guard = state.lock();
            let Some(tab) = guard.tabs.get_mut(tab_id) else { return };
            tab.status = TabStatus::Failed;
            tab.run_cancel = RunCancel::none();
            tab.snapshot()
        };
        self.emit_tab_event(user, &snapshot);
    }

    /// Graceful-then-forceful signal sequence shared by `CloseTab` and
    /// `StopSession` (§4.1, §5, §8 boundary behavior). Transitions the tab
    /// to `Stopping` for the duration of the grace window and, if the
    /// runner doesn't tear down its stream before `KILL`, cancels the run
    /// task's own token so it exits locally regardless (§8 invariant 6).
    async fn stop_active_run(&self, user: &UserId, tab_id: &TabId) -> CoreResult<()> {
        let control = {
            let state = self.user_state(user);
            let mut guard = state.lock();
            let control = guard.active_runs.get(tab_id).cloned();
            if control.is_some() {
                if let Some(tab) = guard.tabs.get_mut(tab_id) {
                    tab.status = TabStatus::Stopping;
                }
            }
            control
        };
        let Some(control) = control else { return Ok(()) };

        let _ = control.signal(Signal::Term).await;
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.has_active_run(user, tab_id) {
            if Instant::now() >= deadline {
                let _ = control.signal(Signal::Kill).await;
                self.cancel_run(user, tab_id);
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        Ok(())
    }

    fn has_active_run(&self, user: &UserId, tab_id: &TabId) -> bool {
        let state = self.user_state(user);
        let guard = state.lock();
        guard.active_runs.contains_key(tab_id)
    }

    /// Cancels the tab's local run task directly, for the case where the
    /// remote `KILL` signal doesn't make the runner's event stream close
    /// promptly.
    fn cancel_run(&self, user: &UserId, tab_id: &TabId) {
        let state = self.user_state(user);
        let guard = state.lock();
        if let Some(tab) = guard.tabs.get(tab_id) {
            tab.run_cancel.cancel();
        }
    }
}

/// Issues the three `RunCommand` calls `SendPrompt` uses to build its
/// header (branch, deduped remote, short status) before dispatching the
/// run proper (§4.1). Failures are folded into an error line rather than
/// aborting the prompt — git metadata is cosmetic, not load-bearing.
async fn collect_git_metadata(client: &dyn RunnerClient) -> Vec<String> {
    let mut lines = Vec::new();
    for (label, command) in [
        ("branch", "git rev-parse --abbrev-ref HEAD"),
        ("remote", "git remote get-url origin"),
        ("status", "git status --short"),
    ] {
        let run_id = RunId::generate();
        match client.run_command(run_id, command.to_string(), true).await {
            Ok(mut handle) => {
                let mut output = String::new();
                while let Some(line) = handle.next_line().await {
                    if matches!(line.stream, CommandStream::Stdout) {
                        output.push_str(&line.text);
                        output.push('\n');
                    }
                }
                let _ = handle.wait().await;
                if !output.trim().is_empty() {
                    lines.push(format!("{label}: {}", output.trim()));
                }
            }
            Err(_) => continue,
        }
    }
    lines
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
