// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::pin::Pin;

use centaurx_core::ids::RunId;
use centaurx_runner_proto::proto::runner_server::{Runner, RunnerServer};
use centaurx_runner_proto::proto::{
    self, CommandOutput, ExecEventRecord, GetUsageRequest, GetUsageResponse, PingRequest, PingResponse, RunState,
    RunnerEvent, SignalSessionRequest, SignalSessionResponse, Status as ProtoStatus,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tonic::transport::Channel;
use tonic::{Request, Response, Status};

use super::*;

type EventStream = Pin<Box<dyn tokio_stream::Stream<Item = Result<RunnerEvent, Status>> + Send>>;

fn status_event(state: RunState, message: &str) -> RunnerEvent {
    RunnerEvent { payload: Some(proto::runner_event::Payload::Status(ProtoStatus { state: state.into(), exit_code: Some(0), message: message.to_string() })) }
}

/// A fixed fake runner daemon: `Exec` streams one decoded event then
/// finishes, `RunCommand` streams one stdout line, `SignalSession` always
/// succeeds. Enough to exercise [`GrpcRunnerClient`]'s translation without a
/// real container.
struct FakeRunner;

#[tonic::async_trait]
impl Runner for FakeRunner {
    async fn ping(&self, _request: Request<PingRequest>) -> Result<Response<PingResponse>, Status> {
        Ok(Response::new(PingResponse { ok: true }))
    }

    async fn get_usage(&self, _request: Request<GetUsageRequest>) -> Result<Response<GetUsageResponse>, Status> {
        Ok(Response::new(GetUsageResponse { input_tokens: 11, output_tokens: 22, cached_input_tokens: 3 }))
    }

    type ExecStream = EventStream;

    async fn exec(&self, _request: Request<proto::ExecRequest>) -> Result<Response<Self::ExecStream>, Status> {
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            let _ = tx.send(Ok(status_event(RunState::Started, ""))).await;
            let json = serde_json::to_string(&centaurx_core::event::ExecEvent::ThreadStarted { thread_id: "t-1".into() }).unwrap();
            let _ = tx.send(Ok(RunnerEvent { payload: Some(proto::runner_event::Payload::ExecEvent(ExecEventRecord { json })) })).await;
            let _ = tx.send(Ok(status_event(RunState::Finished, ""))).await;
        });
        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }

    type ExecResumeStream = EventStream;

    async fn exec_resume(&self, request: Request<proto::ExecResumeRequest>) -> Result<Response<Self::ExecResumeStream>, Status> {
        let req = request.into_inner();
        self.exec(Request::new(proto::ExecRequest { run_id: req.run_id, prompt: req.prompt, model: req.model, reasoning_effort: req.reasoning_effort })).await
    }

    type RunCommandStream = EventStream;

    async fn run_command(&self, _request: Request<proto::RunCommandRequest>) -> Result<Response<Self::RunCommandStream>, Status> {
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            let out = RunnerEvent { payload: Some(proto::runner_event::Payload::CommandOutput(CommandOutput { stream: proto::CommandStream::Stdout.into(), text: "hi".into() })) };
            let _ = tx.send(Ok(out)).await;
            let _ = tx.send(Ok(status_event(RunState::Finished, ""))).await;
        });
        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }

    async fn signal_session(&self, _request: Request<SignalSessionRequest>) -> Result<Response<SignalSessionResponse>, Status> {
        Ok(Response::new(SignalSessionResponse { ok: true, message: String::new() }))
    }
}

async fn connected_client() -> GrpcRunnerClient {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local_addr");

    tokio::spawn(async move {
        let _ = tonic::transport::Server::builder()
            .add_service(RunnerServer::new(FakeRunner))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await;
    });

    let channel = Channel::from_shared(format!("http://{addr}")).expect("uri").connect().await.expect("connect");
    GrpcRunnerClient::new(channel)
}

#[tokio::test]
async fn ping_and_usage_round_trip() {
    let client = connected_client().await;
    client.ping().await.expect("ping");
    let usage = client.usage().await.expect("usage");
    assert_eq!(usage.input_tokens, 11);
    assert_eq!(usage.output_tokens, 22);
    assert_eq!(usage.cached_input_tokens, 3);
}

#[tokio::test]
async fn exec_decodes_events_and_reports_outcome() {
    let client = connected_client().await;
    let mut handle = client.exec(RunId::from_raw("r1"), "hello".into()).await.expect("exec");

    let mut saw_thread_started = false;
    while let Some(event) = handle.next_event().await {
        if matches!(event, centaurx_core::event::ExecEvent::ThreadStarted { .. }) {
            saw_thread_started = true;
        }
    }
    assert!(saw_thread_started);

    let outcome = handle.wait().await.expect("wait");
    assert!(!outcome.failed);
    assert_eq!(outcome.exit_code, Some(0));
}

#[tokio::test]
async fn run_command_yields_command_lines() {
    let client = connected_client().await;
    let mut handle = client.run_command(RunId::from_raw("r2"), "echo hi".into(), true).await.expect("run_command");

    let mut saw_hi = false;
    while let Some(line) = handle.next_line().await {
        if line.text == "hi" {
            saw_hi = true;
        }
    }
    assert!(saw_hi);
    handle.wait().await.expect("wait");
}

#[tokio::test]
async fn signal_session_reports_ok() {
    let client = connected_client().await;
    let handle = client.exec(RunId::from_raw("r3"), "hello".into()).await.expect("exec");
    handle.signal(centaurx_core::event::Signal::Term).await.expect("signal");
}
