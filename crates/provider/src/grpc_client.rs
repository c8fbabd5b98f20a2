// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`RunnerClient`] implementation over the generated `centaurx-runner-proto`
//! tonic client (§4.3): dials the in-container gRPC socket, translates
//! `RunnerEvent` frames back into `ExecEvent`s, and exposes `SignalSession`
//! as [`RunControl`].

use async_trait::async_trait;
use centaurx_core::error::{CoreError, CoreResult, ErrorCode};
use centaurx_core::event::{ExecEvent, Signal};
use centaurx_core::ids::RunId;
use centaurx_core::model::TurnUsage;
use centaurx_core::runner_client::{CommandLine, CommandStream, RunCommandHandle, RunControl, RunHandle, RunOutcome, RunnerClient};
use centaurx_runner_proto::proto::runner_client::RunnerClient as GeneratedClient;
use centaurx_runner_proto::proto::{
    self, ExecRequest, ExecResumeRequest, GetUsageRequest, PingRequest, RunCommandRequest, RunState, RunnerSignal,
    SignalSessionRequest,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::StreamExt;
use tonic::transport::Channel;
use tonic::Streaming;

fn status_to_core_error(status: tonic::Status) -> CoreError {
    let code = match status.code() {
        tonic::Code::Unavailable => ErrorCode::RunnerContainerSocket,
        tonic::Code::Unauthenticated => ErrorCode::RunnerUnauthorized,
        tonic::Code::InvalidArgument => ErrorCode::InvalidRequest,
        _ => ErrorCode::RunnerStreamError,
    };
    CoreError::new(code, status.message().to_string())
}

/// Dials a runner daemon's gRPC socket and implements [`RunnerClient`] over it.
#[derive(Clone)]
pub struct GrpcRunnerClient {
    client: GeneratedClient<Channel>,
}

impl GrpcRunnerClient {
    pub fn new(channel: Channel) -> Self {
        Self { client: GeneratedClient::new(channel) }
    }
}

#[async_trait]
impl RunnerClient for GrpcRunnerClient {
    async fn exec(&self, run_id: RunId, prompt: String) -> CoreResult<RunHandle> {
        let mut client = self.client.clone();
        let req = ExecRequest { run_id: run_id.as_str().to_string(), prompt, model: String::new(), reasoning_effort: String::new() };
        let stream = client.exec(req).await.map_err(status_to_core_error)?.into_inner();
        Ok(spawn_run_handle(run_id, stream, client))
    }

    async fn exec_resume(&self, run_id: RunId, session_id: String, prompt: String) -> CoreResult<RunHandle> {
        let mut client = self.client.clone();
        let req = ExecResumeRequest {
            run_id: run_id.as_str().to_string(),
            resume_session_id: session_id,
            prompt,
            model: String::new(),
            reasoning_effort: String::new(),
        };
        let stream = client.exec_resume(req).await.map_err(status_to_core_error)?.into_inner();
        Ok(spawn_run_handle(run_id, stream, client))
    }

    async fn run_command(&self, run_id: RunId, command: String, use_shell: bool) -> CoreResult<RunCommandHandle> {
        let mut client = self.client.clone();
        let req = RunCommandRequest { run_id: run_id.as_str().to_string(), command, use_shell };
        let stream = client.run_command(req).await.map_err(status_to_core_error)?.into_inner();
        Ok(spawn_command_handle(run_id, stream, client))
    }

    async fn ping(&self) -> CoreResult<()> {
        let mut client = self.client.clone();
        client.ping(PingRequest {}).await.map_err(status_to_core_error)?;
        Ok(())
    }

    async fn usage(&self) -> CoreResult<TurnUsage> {
        let mut client = self.client.clone();
        let resp = client.get_usage(GetUsageRequest {}).await.map_err(status_to_core_error)?.into_inner();
        Ok(TurnUsage { input_tokens: resp.input_tokens, output_tokens: resp.output_tokens, cached_input_tokens: resp.cached_input_tokens })
    }
}

/// Delivers `SignalSession` for a single run id over a cloned gRPC client.
struct GrpcRunControl {
    run_id: RunId,
    client: GeneratedClient<Channel>,
}

#[async_trait]
impl RunControl for GrpcRunControl {
    async fn signal(&self, signal: Signal) -> CoreResult<()> {
        let proto_signal = match signal {
            Signal::Hup => RunnerSignal::Hup,
            Signal::Term => RunnerSignal::Term,
            Signal::Kill => RunnerSignal::Kill,
        };
        let mut client = self.client.clone();
        let req = SignalSessionRequest { run_id: self.run_id.as_str().to_string(), signal: proto_signal as i32 };
        let resp = client.signal_session(req).await.map_err(status_to_core_error)?.into_inner();
        if !resp.ok {
            return Err(CoreError::new(ErrorCode::RunnerStreamError, resp.message));
        }
        Ok(())
    }
}

fn spawn_run_handle(run_id: RunId, mut stream: Streaming<proto::RunnerEvent>, client: GeneratedClient<Channel>) -> RunHandle {
    let (event_tx, event_rx) = mpsc::channel(256);
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let control = Arc::new(GrpcRunControl { run_id: run_id.clone(), client });

    tokio::spawn(async move {
        let mut outcome = None;
        while let Some(frame) = stream.next().await {
            let event = match frame {
                Ok(event) => event,
                Err(status) => {
                    outcome = Some(RunOutcome { exit_code: None, failed: true, message: Some(status.message().to_string()) });
                    break;
                }
            };
            match event.payload {
                Some(proto::runner_event::Payload::ExecEvent(record)) => match serde_json::from_str::<ExecEvent>(&record.json) {
                    Ok(parsed) => {
                        if event_tx.send(parsed).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = event_tx.send(ExecEvent::Error { message: format!("malformed event from runner: {e}") }).await;
                    }
                },
                Some(proto::runner_event::Payload::Status(status)) => {
                    if status.state == RunState::Finished as i32 || status.state == RunState::Failed as i32 {
                        outcome = Some(RunOutcome {
                            exit_code: status.exit_code,
                            failed: status.state == RunState::Failed as i32,
                            message: if status.message.is_empty() { None } else { Some(status.message) },
                        });
                    }
                }
                Some(proto::runner_event::Payload::CommandOutput(_)) | None => {}
            }
        }
        let _ = outcome_tx.send(outcome.unwrap_or(RunOutcome { exit_code: None, failed: true, message: Some("runner closed the stream without a final status".to_string()) }));
    });

    RunHandle::new(run_id, event_rx, outcome_rx, control)
}

fn spawn_command_handle(run_id: RunId, mut stream: Streaming<proto::RunnerEvent>, client: GeneratedClient<Channel>) -> RunCommandHandle {
    let (line_tx, line_rx) = mpsc::channel(256);
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let control = Arc::new(GrpcRunControl { run_id: run_id.clone(), client });

    tokio::spawn(async move {
        let mut outcome = None;
        while let Some(frame) = stream.next().await {
            let event = match frame {
                Ok(event) => event,
                Err(status) => {
                    outcome = Some(RunOutcome { exit_code: None, failed: true, message: Some(status.message().to_string()) });
                    break;
                }
            };
            match event.payload {
                Some(proto::runner_event::Payload::CommandOutput(out)) => {
                    let stream_kind = if out.stream == proto::CommandStream::Stderr as i32 { CommandStream::Stderr } else { CommandStream::Stdout };
                    if line_tx.send(CommandLine { stream: stream_kind, text: out.text }).await.is_err() {
                        break;
                    }
                }
                Some(proto::runner_event::Payload::Status(status)) => {
                    if status.state == RunState::Finished as i32 || status.state == RunState::Failed as i32 {
                        outcome = Some(RunOutcome {
                            exit_code: status.exit_code,
                            failed: status.state == RunState::Failed as i32,
                            message: if status.message.is_empty() { None } else { Some(status.message) },
                        });
                    }
                }
                Some(proto::runner_event::Payload::ExecEvent(_)) | None => {}
            }
        }
        let _ = outcome_tx.send(outcome.unwrap_or(RunOutcome { exit_code: None, failed: true, message: Some("runner closed the stream without a final status".to_string()) }));
    });

    RunCommandHandle::new(run_id, line_rx, outcome_rx, control)
}

#[cfg(test)]
#[path = "grpc_client_tests.rs"]
mod tests;
