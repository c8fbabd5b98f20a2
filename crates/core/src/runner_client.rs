// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The contract the tab/session service dispatches runs through (§4.3's
//! `Exec`/`ExecResume`/`RunCommand`/`SignalSession`/`Ping`), kept free of
//! gRPC and container concerns so the service can be tested against a fake
//! implementation. `centaurx-provider` implements [`RunnerClient`] over a
//! real gRPC connection to a containerized runner daemon.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::error::{CoreError, CoreResult};
use crate::event::{ExecEvent, Signal};
use crate::ids::{RunId, TabId, UserId};
use crate::model::{RunnerInfo, TurnUsage};

/// Issues runs against a user's runner and reports its liveness/usage.
#[async_trait]
pub trait RunnerClient: Send + Sync {
    /// Start a new agent invocation (§4.3 `Exec`).
    async fn exec(&self, run_id: RunId, prompt: String) -> CoreResult<RunHandle>;

    /// Resume a prior conversation by session id (§4.3 `ExecResume`).
    async fn exec_resume(&self, run_id: RunId, session_id: String, prompt: String) -> CoreResult<RunHandle>;

    /// Run an arbitrary shell command through the runner (§4.3 `RunCommand`).
    async fn run_command(&self, run_id: RunId, command: String, use_shell: bool) -> CoreResult<RunCommandHandle>;

    /// Keepalive ping; the runner daemon terminates itself once it has gone
    /// unpinged for `misses × interval` (§4.3, §8).
    async fn ping(&self) -> CoreResult<()>;

    /// Token usage accumulated by the runner since it started.
    async fn usage(&self) -> CoreResult<TurnUsage>;
}

/// The terminal state of a run, delivered once its event stream ends
/// (§4.3 `Status{FINISHED|FAILED, exitCode}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub exit_code: Option<i32>,
    pub failed: bool,
    pub message: Option<String>,
}

/// Out-of-band control surface for a run, separate from its event stream so
/// `Signal` can be sent while `Events` is still being drained.
#[async_trait]
pub trait RunControl: Send + Sync {
    async fn signal(&self, signal: Signal) -> CoreResult<()>;
}

/// Owner-exclusive handle to an in-flight run (§3): an `Events` iterator,
/// `Signal`, `Wait`, and `Close`. Only the caller that created it may drive
/// it; there is no cloning or sharing.
pub struct RunHandle {
    pub run_id: RunId,
    events: mpsc::Receiver<ExecEvent>,
    outcome: oneshot::Receiver<RunOutcome>,
    control: Arc<dyn RunControl>,
}

impl RunHandle {
    pub fn new(
        run_id: RunId,
        events: mpsc::Receiver<ExecEvent>,
        outcome: oneshot::Receiver<RunOutcome>,
        control: Arc<dyn RunControl>,
    ) -> Self {
        Self { run_id, events, outcome, control }
    }

    /// Pull the next translated event, or `None` once the runner has closed
    /// the stream (§3 "Events iterator").
    pub async fn next_event(&mut self) -> Option<ExecEvent> {
        self.events.recv().await
    }

    /// Deliver `signal` to the run's process (tree), per §4.3 `SignalSession`.
    pub async fn signal(&self, signal: Signal) -> CoreResult<()> {
        self.control.signal(signal).await
    }

    /// Await the run's terminal outcome. Callers normally drain `next_event`
    /// to `None` first; `wait` resolves as soon as the runner reports it,
    /// which may race the last few buffered events.
    pub async fn wait(self) -> CoreResult<RunOutcome> {
        self.outcome.await.map_err(|_| CoreError::internal("run outcome channel closed before completion"))
    }

    /// Best-effort teardown used by `CloseTab`/`StopSession`: send TERM. The
    /// caller escalates to KILL after its own grace window (§4.1).
    pub async fn close(&self) -> CoreResult<()> {
        self.signal(Signal::Term).await
    }

    /// A clone of this run's signal capability, retained by the service so
    /// `CloseTab`/`StopSession` can signal it independently of whichever
    /// task is draining `Events` (§4.1, §5).
    pub fn control(&self) -> Arc<dyn RunControl> {
        self.control.clone()
    }
}

/// Which of a command's two output streams a [`CommandLine`] came from
/// (§4.3 `RunCommand`'s `CommandOutput{stream, text}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStream {
    Stdout,
    Stderr,
}

/// One line of output from a `RunCommand` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub stream: CommandStream,
    pub text: String,
}

/// Owner-exclusive handle to an in-flight `RunCommand` invocation. Mirrors
/// [`RunHandle`] but yields [`CommandLine`]s instead of `ExecEvent`s, since
/// shell commands have no agent-event structure to translate.
pub struct RunCommandHandle {
    pub run_id: RunId,
    lines: mpsc::Receiver<CommandLine>,
    outcome: oneshot::Receiver<RunOutcome>,
    control: Arc<dyn RunControl>,
}

impl RunCommandHandle {
    pub fn new(
        run_id: RunId,
        lines: mpsc::Receiver<CommandLine>,
        outcome: oneshot::Receiver<RunOutcome>,
        control: Arc<dyn RunControl>,
    ) -> Self {
        Self { run_id, lines, outcome, control }
    }

    pub async fn next_line(&mut self) -> Option<CommandLine> {
        self.lines.recv().await
    }

    pub async fn signal(&self, signal: Signal) -> CoreResult<()> {
        self.control.signal(signal).await
    }

    pub async fn wait(self) -> CoreResult<RunOutcome> {
        self.outcome.await.map_err(|_| CoreError::internal("run outcome channel closed before completion"))
    }

    pub fn control(&self) -> Arc<dyn RunControl> {
        self.control.clone()
    }
}

/// Owns container lifecycle and hands the service a [`RunnerClient`] bound
/// to (user, tab) (§4.2 C3). Implemented by `centaurx-provider`; the service
/// depends only on this trait, never on containers or gRPC directly.
#[async_trait]
pub trait RunnerProvider: Send + Sync {
    /// Ensure a runner is available for `tab` and return a client bound to
    /// it, allocating a container on first use (§4.2 `RunnerFor`).
    async fn runner_for(&self, user: &UserId, tab: &TabId) -> CoreResult<(Arc<dyn RunnerClient>, RunnerInfo)>;

    /// Release per-tab resources; starts the idle timer once `user` has no
    /// tabs left (§4.2 `CloseTab`).
    async fn close_tab(&self, user: &UserId, tab: &TabId);

    /// Materialize `bytes` as the user's agent-auth credentials inside their
    /// seeded home (§4.1 `SaveCodexAuth`); a host-side concern, not core's.
    async fn save_codex_auth(&self, user: &UserId, bytes: Vec<u8>) -> CoreResult<()>;
}

#[cfg(test)]
#[path = "runner_client_tests.rs"]
mod tests;
