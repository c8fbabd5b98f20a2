// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use super::*;

#[tokio::test]
async fn spawn_and_wait_reports_exit_code() {
    let mut proc = SpawnedProcess::spawn("sh", &["-c".to_string(), "exit 7".to_string()], &HashMap::new(), Path::new("/"), None)
        .expect("spawn");
    let code = proc.wait().await.expect("wait");
    assert_eq!(code, Some(7));
}

#[tokio::test]
async fn stdout_is_captured() {
    use tokio::io::AsyncReadExt;

    let mut proc = SpawnedProcess::spawn(
        "sh",
        &["-c".to_string(), "echo hello".to_string()],
        &HashMap::new(),
        Path::new("/"),
        None,
    )
    .expect("spawn");
    let stdout = proc.take_stdout().expect("stdout pipe");
    let mut buf = Vec::new();
    tokio::io::BufReader::new(stdout).read_to_end(&mut buf).await.expect("read stdout");
    let _ = proc.wait().await;

    assert_eq!(String::from_utf8_lossy(&buf).trim(), "hello");
}

#[test]
fn spawn_command_without_shell_splits_argv() {
    let proc = SpawnedProcess::spawn_command("true", false, &HashMap::new(), Path::new("/"), None);
    assert!(proc.is_ok());
}

#[test]
fn parse_ppid_reads_the_fourth_stat_field() {
    assert_eq!(parse_ppid("123 (sh) S 1 123 123 0 -1 ..."), Some(1));
}

#[test]
fn parse_ppid_handles_parens_in_comm() {
    assert_eq!(parse_ppid("123 (my (cmd)) S 42 ..."), Some(42));
}

#[test]
fn nice_wrap_prefixes_the_command_when_set() {
    let (program, args) = SpawnedProcess::nice_wrap("codex", &["exec".to_string()], Some(10));
    assert_eq!(program, "nice");
    assert_eq!(args, vec!["-n", "10", "codex", "exec"]);
}

#[test]
fn nice_wrap_is_a_no_op_without_a_value() {
    let (program, args) = SpawnedProcess::nice_wrap("codex", &["exec".to_string()], None);
    assert_eq!(program, "codex");
    assert_eq!(args, vec!["exec"]);
}
