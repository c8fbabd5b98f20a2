// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parses_thread_started() {
    let e: ExecEvent = serde_json::from_str(r#"{"type":"thread.started","thread_id":"t1"}"#).unwrap();
    assert_eq!(e, ExecEvent::ThreadStarted { thread_id: "t1".into() });
}

#[test]
fn parses_turn_completed_with_usage() {
    let json = r#"{"type":"turn.completed","usage":{"input_tokens":10,"output_tokens":5,"cached_input_tokens":0}}"#;
    let e: ExecEvent = serde_json::from_str(json).unwrap();
    match e {
        ExecEvent::TurnCompleted { usage: Some(u) } => {
            assert_eq!(u.input_tokens, 10);
            assert_eq!(u.output_tokens, 5);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn parses_turn_failed() {
    let json = r#"{"type":"turn.failed","error":{"message":"boom"}}"#;
    let e: ExecEvent = serde_json::from_str(json).unwrap();
    assert_eq!(e, ExecEvent::TurnFailed { error: WireMessage { message: "boom".into() } });
}

#[test]
fn parses_command_execution_item() {
    let json = r#"{"type":"item.completed","item":{"type":"command_execution","id":"c1","command":"ls -la","aggregated_output":"a\nb\n","exit_code":0,"status":"completed"}}"#;
    let e: ExecEvent = serde_json::from_str(json).unwrap();
    match e {
        ExecEvent::ItemCompleted { item: Item::CommandExecution { command, exit_code, .. } } => {
            assert_eq!(command, "ls -la");
            assert_eq!(exit_code, Some(0));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn unrecognized_item_type_falls_back_to_unknown() {
    let json = r#"{"type":"item.started","item":{"type":"mystery_thing","id":"z9"}}"#;
    let e: ExecEvent = serde_json::from_str(json).unwrap();
    match e {
        ExecEvent::ItemStarted { item: Item::Unknown { id, kind } } => {
            assert_eq!(id, "z9");
            assert_eq!(kind, "mystery_thing");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn item_id_extracts_across_variants() {
    let item = Item::AgentMessage { id: "a1".into(), text: "hi".into() };
    assert_eq!(item.id(), "a1");
}
