// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event stream decoder (C4, §4.4): turns the agent's line-delimited JSON
//! stdout, plus its raw stderr, into a single ordered stream of
//! [`ExecEvent`]s. A malformed stdout line never aborts the stream — it
//! becomes an `Error` event carrying the raw text, truncated for logs.

use centaurx_core::event::ExecEvent;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Raw lines longer than this are truncated before becoming an `Error`
/// event, so one pathological line can't blow out a log line (§4.4).
const MAX_RAW_LINE_LEN: usize = 200;

/// Merges decoded stdout records and raw stderr lines into one channel.
/// Ordering within stdout is preserved; interleaving with stderr is
/// best-effort, matching two independent reader tasks racing to send.
pub struct EventDecoder {
    events: mpsc::Receiver<ExecEvent>,
}

impl EventDecoder {
    pub fn spawn(stdout: ChildStdout, stderr: ChildStderr, cancel: CancellationToken) -> Self {
        let (tx, events) = mpsc::channel(256);

        tokio::spawn(decode_stdout(stdout, tx.clone(), cancel.clone()));
        tokio::spawn(decode_stderr(stderr, tx, cancel));

        Self { events }
    }

    /// Pull the next event, or `None` once both stdout and stderr have EOF'd
    /// (§4.4 `Next(ctx)`).
    pub async fn next(&mut self) -> Option<ExecEvent> {
        self.events.recv().await
    }
}

async fn decode_stdout(stdout: ChildStdout, tx: mpsc::Sender<ExecEvent>, cancel: CancellationToken) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(raw)) => {
                let event = match serde_json::from_str::<ExecEvent>(&raw) {
                    Ok(event) => event,
                    Err(_) => ExecEvent::Error { message: raw.chars().take(MAX_RAW_LINE_LEN).collect() },
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            Ok(None) | Err(_) => break,
        }
    }
}

async fn decode_stderr(stderr: ChildStderr, tx: mpsc::Sender<ExecEvent>, cancel: CancellationToken) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(raw)) => {
                if tx.send(ExecEvent::Error { message: raw }).await.is_err() {
                    break;
                }
            }
            Ok(None) | Err(_) => break,
        }
    }
}

#[cfg(test)]
#[path = "decoder_tests.rs"]
mod tests;
