// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::event::{CommandStatus, FileChangeEntry};

fn command_item(id: &str, output: &str) -> Item {
    Item::CommandExecution {
        id: id.into(),
        command: "echo hi".into(),
        aggregated_output: output.into(),
        exit_code: Some(0),
        status: CommandStatus::Completed,
    }
}

#[test]
fn agent_message_completed_is_rendered_with_its_marker() {
    let mut state = RenderState::new();
    let event = ExecEvent::ItemCompleted { item: Item::AgentMessage { id: "1".into(), text: "hello".into() } };
    let lines = render_event(&event, false, &mut state);
    assert_eq!(lines, vec![format!("{}hello", MARKER_AGENT_MESSAGE as char)]);
}

#[test]
fn command_header_is_emitted_once_across_started_and_completed() {
    let mut state = RenderState::new();
    let started = ExecEvent::ItemStarted { item: command_item("c1", "") };
    let started_lines = render_event(&started, false, &mut state);
    assert_eq!(started_lines.len(), 1);

    let completed = ExecEvent::ItemCompleted { item: command_item("c1", "one\ntwo") };
    let completed_lines = render_event(&completed, false, &mut state);
    assert!(!completed_lines[0].ends_with("$ echo hi"));
}

#[test]
fn terse_output_caps_at_three_lines_with_elision_marker() {
    let mut state = RenderState::new();
    let event = ExecEvent::ItemCompleted { item: command_item("c2", "l1\nl2\nl3\nl4\nl5") };
    let lines = render_event(&event, false, &mut state);
    // header + 3 lines + elision + exit code
    assert_eq!(lines.len(), 1 + 3 + 1 + 1);
    assert!(lines[4].contains("2 more lines"));
}

#[test]
fn full_output_includes_every_line() {
    let mut state = RenderState::new();
    let event = ExecEvent::ItemCompleted { item: command_item("c3", "l1\nl2\nl3\nl4\nl5") };
    let lines = render_event(&event, true, &mut state);
    assert_eq!(lines.len(), 1 + 5 + 1);
}

#[test]
fn updated_items_render_nothing() {
    let mut state = RenderState::new();
    let event = ExecEvent::ItemUpdated { item: command_item("c4", "partial") };
    assert!(render_event(&event, false, &mut state).is_empty());
}

#[test]
fn file_change_summarizes_count() {
    let mut state = RenderState::new();
    let item = Item::FileChange {
        id: "f1".into(),
        changes: vec![FileChangeEntry { path: "a.rs".into(), kind: "modified".into() }],
    };
    let lines = render_event(&ExecEvent::ItemCompleted { item }, false, &mut state);
    assert_eq!(lines, vec![format!("{}1 file(s) changed", MARKER_AGENT_MESSAGE as char)]);
}

#[test]
fn unknown_item_is_rendered_as_stderr_with_its_tag_preserved() {
    let mut state = RenderState::new();
    let item = Item::Unknown { id: "u1".into(), kind: "future_feature".into() };
    let lines = render_event(&ExecEvent::ItemCompleted { item }, false, &mut state);
    assert!(lines[0].contains("future_feature"));
}

#[test]
fn worked_for_uses_its_own_marker() {
    let line = render_worked_for(42);
    assert!(line.starts_with(MARKER_WORKED_FOR as char));
    assert!(line.ends_with("Worked for 42s"));
}
