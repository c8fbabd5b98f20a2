// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use centaurx_runner_proto::proto::{ExecRequest, GetUsageRequest, PingRequest, RunCommandRequest, SignalSessionRequest};
use tokio_stream::StreamExt;
use tonic::Request;

use super::*;

fn daemon(binary: &str, args: &[&str]) -> RunnerDaemon {
    let keepalive = Arc::new(Keepalive::new(Duration::from_secs(60), 3));
    RunnerDaemon::new(
        binary.to_string(),
        args.iter().map(|s| s.to_string()).collect(),
        HashMap::new(),
        PathBuf::from("/"),
        None,
        keepalive,
    )
}

#[tokio::test]
async fn ping_updates_keepalive_and_returns_ok() {
    let daemon = daemon("sh", &["-c", "true"]);
    let response = daemon.ping(Request::new(PingRequest {})).await.expect("ping");
    assert!(response.into_inner().ok);
}

#[tokio::test]
async fn get_usage_starts_at_zero() {
    let daemon = daemon("sh", &["-c", "true"]);
    let usage = daemon.get_usage(Request::new(GetUsageRequest {})).await.expect("usage").into_inner();
    assert_eq!(usage.input_tokens, 0);
    assert_eq!(usage.output_tokens, 0);
}

#[tokio::test]
async fn exec_rejects_empty_prompt() {
    let daemon = daemon("sh", &["-c", "true"]);
    let err = daemon.exec(Request::new(ExecRequest { run_id: "r1".into(), prompt: "".into(), model: String::new(), reasoning_effort: String::new() })).await;
    assert!(err.is_err());
}

#[tokio::test]
async fn exec_streams_status_started_then_decoded_events_then_finished() {
    let script = r#"echo '{"type":"thread.started","thread_id":"t-1"}'"#;
    let daemon = daemon("sh", &["-c", script]);

    let mut stream = daemon
        .exec(Request::new(ExecRequest { run_id: "r1".into(), prompt: "hello".into(), model: String::new(), reasoning_effort: String::new() }))
        .await
        .expect("exec")
        .into_inner();

    let mut saw_started = false;
    let mut saw_thread_event = false;
    let mut saw_finished = false;
    while let Some(Ok(event)) = stream.next().await {
        match event.payload {
            Some(proto::runner_event::Payload::Status(s)) if s.state == RunState::Started as i32 => saw_started = true,
            Some(proto::runner_event::Payload::Status(s)) if s.state == RunState::Finished as i32 => saw_finished = true,
            Some(proto::runner_event::Payload::ExecEvent(record)) if record.json.contains("thread.started") => saw_thread_event = true,
            _ => {}
        }
    }

    assert!(saw_started && saw_thread_event && saw_finished);
}

#[tokio::test]
async fn run_command_streams_stdout_lines() {
    let daemon = daemon("sh", &["-c", "true"]);
    let mut stream = daemon
        .run_command(Request::new(RunCommandRequest { run_id: "r2".into(), command: "echo hi".into(), use_shell: true }))
        .await
        .expect("run_command")
        .into_inner();

    let mut saw_hi = false;
    while let Some(Ok(event)) = stream.next().await {
        if let Some(proto::runner_event::Payload::CommandOutput(out)) = event.payload {
            if out.text == "hi" {
                saw_hi = true;
            }
        }
    }
    assert!(saw_hi);
}

#[tokio::test]
async fn signal_session_on_unknown_run_reports_not_found() {
    let daemon = daemon("sh", &["-c", "true"]);
    let response = daemon
        .signal_session(Request::new(SignalSessionRequest { run_id: "missing".into(), signal: RunnerSignal::Term as i32 }))
        .await
        .expect("signal_session")
        .into_inner();
    assert!(!response.ok);
}
