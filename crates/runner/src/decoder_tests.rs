// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::path::Path;

use centaurx_core::event::ExecEvent;

use super::*;
use crate::process::SpawnedProcess;

async fn decode(script: &str) -> Vec<ExecEvent> {
    let mut proc = SpawnedProcess::spawn("sh", &["-c".to_string(), script.to_string()], &HashMap::new(), Path::new("/"))
        .expect("spawn");
    let stdout = proc.take_stdout().expect("stdout");
    let stderr = proc.take_stderr().expect("stderr");
    let mut decoder = EventDecoder::spawn(stdout, stderr, CancellationToken::new());

    let mut events = Vec::new();
    while let Some(event) = decoder.next().await {
        events.push(event);
    }
    let _ = proc.wait().await;
    events
}

#[tokio::test]
async fn well_formed_stdout_line_decodes_to_its_variant() {
    let events = decode(r#"echo '{"type":"thread.started","thread_id":"t-1"}'"#).await;
    assert!(events.iter().any(|e| matches!(e, ExecEvent::ThreadStarted { thread_id } if thread_id == "t-1")));
}

#[tokio::test]
async fn malformed_stdout_line_becomes_an_error_event() {
    let events = decode("echo '{broken'").await;
    assert!(events.iter().any(|e| matches!(e, ExecEvent::Error { message } if message.contains("{broken"))));
}

#[tokio::test]
async fn stderr_lines_become_error_events() {
    let events = decode("echo oops 1>&2").await;
    assert!(events.iter().any(|e| matches!(e, ExecEvent::Error { message } if message == "oops")));
}

#[tokio::test]
async fn decoder_closes_after_both_streams_eof() {
    let events = decode("true").await;
    assert!(events.is_empty());
}
