// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Runner` trait implementation (§4.3): the gRPC surface the runner
//! provider dials into from the host side.

use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use centaurx_runner_proto::proto::runner_server::Runner;
use centaurx_runner_proto::proto::{
    self, CommandOutput, CommandStream as ProtoCommandStream, ExecEventRecord, GetUsageRequest, GetUsageResponse,
    PingRequest, PingResponse, RunCommandRequest, RunState, RunnerEvent, RunnerSignal, SignalSessionRequest,
    SignalSessionResponse, Status,
};
use nix::sys::signal::Signal as NixSignal;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status as GrpcStatus};

use crate::decoder::EventDecoder;
use crate::keepalive::Keepalive;
use crate::process::{signal_tree, SpawnedProcess};
use crate::registry::RunRegistry;

type EventStream = Pin<Box<dyn tokio_stream::Stream<Item = Result<RunnerEvent, GrpcStatus>> + Send + 'static>>;

/// Cumulative token usage across every turn this runner has executed
/// (§4.3 `GetUsage`), updated as `turn.completed` events are decoded.
#[derive(Default)]
struct UsageTotals {
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    cached_input_tokens: AtomicU64,
}

impl UsageTotals {
    fn record(&self, usage: &centaurx_core::model::TurnUsage) {
        self.input_tokens.fetch_add(usage.input_tokens, Ordering::Relaxed);
        self.output_tokens.fetch_add(usage.output_tokens, Ordering::Relaxed);
        self.cached_input_tokens.fetch_add(usage.cached_input_tokens, Ordering::Relaxed);
    }
}

/// How the daemon was told to invoke the agent (§6 `runner{binary, args,
/// env}`), plus the registry/keepalive/usage state shared across RPCs.
pub struct RunnerDaemon {
    binary: String,
    base_args: Vec<String>,
    env: HashMap<String, String>,
    cwd: PathBuf,
    nice: Option<i32>,
    registry: Arc<RunRegistry>,
    keepalive: Arc<Keepalive>,
    usage: Arc<UsageTotals>,
}

impl RunnerDaemon {
    pub fn new(
        binary: String,
        base_args: Vec<String>,
        env: HashMap<String, String>,
        cwd: PathBuf,
        nice: Option<i32>,
        keepalive: Arc<Keepalive>,
    ) -> Self {
        Self { binary, base_args, env, cwd, nice, registry: Arc::new(RunRegistry::new()), keepalive, usage: Arc::new(UsageTotals::default()) }
    }

    /// `codex exec --json <prompt>` or, resuming, `codex exec resume <id>
    /// --json <prompt>` — the convention implied by the audit log example
    /// in §8 scenario 2.
    fn build_argv(&self, resume_session_id: Option<&str>, prompt: &str) -> Vec<String> {
        let mut argv = self.base_args.clone();
        if let Some(id) = resume_session_id {
            argv.push("resume".to_string());
            argv.push(id.to_string());
        }
        argv.push(prompt.to_string());
        argv
    }

    fn status_event(state: RunState, exit_code: Option<i32>, message: impl Into<String>) -> RunnerEvent {
        RunnerEvent { payload: Some(proto::runner_event::Payload::Status(Status { state: state.into(), exit_code, message: message.into() })) }
    }

    async fn run_exec(&self, run_id: String, resume_session_id: Option<String>, prompt: String) -> Result<Response<EventStream>, GrpcStatus> {
        if run_id.trim().is_empty() || prompt.trim().is_empty() {
            return Err(GrpcStatus::invalid_argument("run_id and prompt must be nonempty"));
        }

        let argv = self.build_argv(resume_session_id.as_deref(), &prompt);
        let mut process = SpawnedProcess::spawn(&self.binary, &argv, &self.env, &self.cwd, self.nice)
            .map_err(|e| GrpcStatus::unavailable(format!("failed to spawn agent: {e}")))?;
        self.registry.insert(run_id.clone(), process.pgid());

        let stdout = process.take_stdout().ok_or_else(|| GrpcStatus::internal("missing stdout pipe"))?;
        let stderr = process.take_stderr().ok_or_else(|| GrpcStatus::internal("missing stderr pipe"))?;
        let mut decoder = EventDecoder::spawn(stdout, stderr, tokio_util::sync::CancellationToken::new());

        let (tx, rx) = mpsc::channel(256);
        let registry = self.registry.clone();
        let usage = self.usage.clone();

        let _ = tx.send(Ok(Self::status_event(RunState::Started, None, ""))).await;

        tokio::spawn(async move {
            while let Some(event) = decoder.next().await {
                if let centaurx_core::event::ExecEvent::TurnCompleted { usage: Some(u) } = &event {
                    usage.record(u);
                }
                let Ok(json) = serde_json::to_string(&event) else { continue };
                let record = RunnerEvent { payload: Some(proto::runner_event::Payload::ExecEvent(ExecEventRecord { json })) };
                if tx.send(Ok(record)).await.is_err() {
                    break;
                }
            }

            let exit_code = process.wait().await.ok().flatten();
            registry.remove(&run_id);
            let (state, message) = match exit_code {
                Some(0) => (RunState::Finished, String::new()),
                Some(code) => (RunState::Failed, format!("agent exited with code {code}")),
                None => (RunState::Failed, "agent terminated by signal".to_string()),
            };
            let _ = tx.send(Ok(Self::status_event(state, exit_code, message))).await;
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }
}

#[tonic::async_trait]
impl Runner for RunnerDaemon {
    async fn ping(&self, _request: Request<PingRequest>) -> Result<Response<PingResponse>, GrpcStatus> {
        self.keepalive.ping();
        Ok(Response::new(PingResponse { ok: true }))
    }

    async fn get_usage(&self, _request: Request<GetUsageRequest>) -> Result<Response<GetUsageResponse>, GrpcStatus> {
        Ok(Response::new(GetUsageResponse {
            input_tokens: self.usage.input_tokens.load(Ordering::Relaxed),
            output_tokens: self.usage.output_tokens.load(Ordering::Relaxed),
            cached_input_tokens: self.usage.cached_input_tokens.load(Ordering::Relaxed),
        }))
    }

    type ExecStream = EventStream;

    async fn exec(&self, request: Request<proto::ExecRequest>) -> Result<Response<Self::ExecStream>, GrpcStatus> {
        let req = request.into_inner();
        self.run_exec(req.run_id, None, req.prompt).await
    }

    type ExecResumeStream = EventStream;

    async fn exec_resume(&self, request: Request<proto::ExecResumeRequest>) -> Result<Response<Self::ExecResumeStream>, GrpcStatus> {
        let req = request.into_inner();
        if req.resume_session_id.trim().is_empty() {
            return Err(GrpcStatus::invalid_argument("resume_session_id must be nonempty"));
        }
        self.run_exec(req.run_id, Some(req.resume_session_id), req.prompt).await
    }

    type RunCommandStream = EventStream;

    async fn run_command(&self, request: Request<RunCommandRequest>) -> Result<Response<Self::RunCommandStream>, GrpcStatus> {
        let req = request.into_inner();
        if req.run_id.trim().is_empty() {
            return Err(GrpcStatus::invalid_argument("run_id must be nonempty"));
        }

        let mut process = SpawnedProcess::spawn_command(&req.command, req.use_shell, &self.env, &self.cwd, self.nice)
            .map_err(|e| GrpcStatus::unavailable(format!("failed to spawn command: {e}")))?;
        self.registry.insert(req.run_id.clone(), process.pgid());

        let stdout = process.take_stdout().ok_or_else(|| GrpcStatus::internal("missing stdout pipe"))?;
        let stderr = process.take_stderr().ok_or_else(|| GrpcStatus::internal("missing stderr pipe"))?;

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(scan_command_output(stdout, ProtoCommandStream::Stdout, tx.clone()));
        tokio::spawn(scan_command_output(stderr, ProtoCommandStream::Stderr, tx.clone()));

        let registry = self.registry.clone();
        let run_id = req.run_id;
        tokio::spawn(async move {
            // Give the two scanners a chance to drain before reaping; exit
            // status is what matters, buffered lines already flowed.
            let exit_code = process.wait().await.ok().flatten();
            registry.remove(&run_id);
            let (state, message) = match exit_code {
                Some(0) => (RunState::Finished, String::new()),
                Some(code) => (RunState::Failed, format!("command exited with code {code}")),
                None => (RunState::Failed, "command terminated by signal".to_string()),
            };
            let _ = tx.send(Ok(Self::status_event(state, exit_code, message))).await;
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }

    async fn signal_session(&self, request: Request<SignalSessionRequest>) -> Result<Response<SignalSessionResponse>, GrpcStatus> {
        let req = request.into_inner();
        let Some(pgid) = self.registry.get(&req.run_id) else {
            return Ok(Response::new(SignalSessionResponse { ok: false, message: "run not found".to_string() }));
        };

        let signal = match RunnerSignal::try_from(req.signal).unwrap_or(RunnerSignal::Unspecified) {
            RunnerSignal::Hup => NixSignal::SIGHUP,
            RunnerSignal::Term => NixSignal::SIGTERM,
            RunnerSignal::Kill => NixSignal::SIGKILL,
            RunnerSignal::Unspecified => return Ok(Response::new(SignalSessionResponse { ok: false, message: "unspecified signal".to_string() })),
        };

        signal_tree(pgid, signal);
        Ok(Response::new(SignalSessionResponse { ok: true, message: String::new() }))
    }
}

async fn scan_command_output(reader: impl tokio::io::AsyncRead + Unpin, stream: ProtoCommandStream, tx: mpsc::Sender<Result<RunnerEvent, GrpcStatus>>) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(text)) = lines.next_line().await {
        let event = RunnerEvent { payload: Some(proto::runner_event::Payload::CommandOutput(CommandOutput { stream: stream.into(), text })) };
        if tx.send(Ok(event)).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
