// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event translation (§4.1, §6): maps `ExecEvent`s into buffer lines
//! prefixed with an in-band marker byte that downstream renderers (terminal,
//! browser) strip and style.

use std::collections::HashSet;

use crate::event::{CommandStatus, ExecEvent, Item};

pub const MARKER_AGENT_MESSAGE: u8 = 0x1c;
pub const MARKER_REASONING: u8 = 0x1d;
pub const MARKER_COMMAND: u8 = 0x1a;
pub const MARKER_WORKED_FOR: u8 = 0x1e;
pub const MARKER_STDERR: u8 = 0x1f;
pub const MARKER_HELP: u8 = 0x16;
pub const MARKER_ABOUT_VERSION: u8 = 0x17;
pub const MARKER_ABOUT_COPYRIGHT: u8 = 0x18;
pub const MARKER_ABOUT_LINK: u8 = 0x19;

/// Output lines shown for a completed command in terse mode, before an
/// elision marker replaces the rest (§4.1 "up to 3 output lines").
const TERSE_OUTPUT_LINES: usize = 3;

fn marker_line(marker: u8, text: &str) -> String {
    let mut line = String::with_capacity(text.len() + 1);
    line.push(marker as char);
    line.push_str(text);
    line
}

/// Per-run dedup state: which command item ids have already had their
/// `$ command` header rendered (§4.1: identical prefixes across
/// Started/Updated/Completed for the same item id are emitted once).
#[derive(Default)]
pub struct RenderState {
    rendered_headers: HashSet<String>,
}

impl RenderState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Render one `ExecEvent` into zero or more buffer lines. `full_output`
/// selects the per-session preference (§3 `fullCommandOutput`).
pub fn render_event(event: &ExecEvent, full_output: bool, state: &mut RenderState) -> Vec<String> {
    match event {
        ExecEvent::ThreadStarted { .. } | ExecEvent::TurnStarted | ExecEvent::TurnCompleted { .. } => Vec::new(),
        ExecEvent::TurnFailed { error } => vec![marker_line(MARKER_STDERR, &error.message)],
        ExecEvent::Error { message } => vec![marker_line(MARKER_STDERR, message)],
        ExecEvent::ItemStarted { item } => render_started(item, state),
        ExecEvent::ItemUpdated { item } => render_updated(item),
        ExecEvent::ItemCompleted { item } => render_completed(item, full_output, state),
    }
}

fn render_started(item: &Item, state: &mut RenderState) -> Vec<String> {
    match item {
        Item::CommandExecution { id, command, .. } => {
            if state.rendered_headers.insert(id.clone()) {
                vec![marker_line(MARKER_COMMAND, &format!("$ {command}"))]
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}

fn render_updated(_item: &Item) -> Vec<String> {
    // Intermediate progress isn't rendered; the terse contract renders a
    // command's output once, at completion.
    Vec::new()
}

fn render_completed(item: &Item, full_output: bool, state: &mut RenderState) -> Vec<String> {
    match item {
        Item::AgentMessage { text, .. } => vec![marker_line(MARKER_AGENT_MESSAGE, text)],
        Item::Reasoning { text, .. } => vec![marker_line(MARKER_REASONING, text)],
        Item::CommandExecution { id, command, aggregated_output, exit_code, status } => {
            let mut lines = Vec::new();
            if state.rendered_headers.insert(id.clone()) {
                lines.push(marker_line(MARKER_COMMAND, &format!("$ {command}")));
            }
            lines.extend(render_command_output(aggregated_output, full_output));
            let code = exit_code.map(|c| c.to_string()).unwrap_or_else(|| "?".to_string());
            lines.push(marker_line(MARKER_COMMAND, &format!("exit {code} ({})", status_label(*status))));
            lines
        }
        Item::FileChange { changes, .. } => {
            vec![marker_line(MARKER_AGENT_MESSAGE, &format!("{} file(s) changed", changes.len()))]
        }
        Item::WebSearch { query, .. } => vec![marker_line(MARKER_AGENT_MESSAGE, &format!("web search: {query}"))],
        Item::TodoList { items, .. } => {
            let done = items.iter().filter(|i| i.completed).count();
            vec![marker_line(MARKER_AGENT_MESSAGE, &format!("todo: {done}/{} complete", items.len()))]
        }
        Item::Unknown { kind, .. } => vec![marker_line(MARKER_STDERR, &format!("unrecognized item type: {kind}"))],
    }
}

fn render_command_output(aggregated_output: &str, full_output: bool) -> Vec<String> {
    let all_lines: Vec<&str> = aggregated_output.lines().collect();
    if full_output {
        return all_lines.iter().map(|l| marker_line(MARKER_COMMAND, l)).collect();
    }

    let mut lines: Vec<String> = all_lines.iter().take(TERSE_OUTPUT_LINES).map(|l| marker_line(MARKER_COMMAND, l)).collect();
    if all_lines.len() > TERSE_OUTPUT_LINES {
        lines.push(marker_line(MARKER_COMMAND, &format!("… ({} more lines)", all_lines.len() - TERSE_OUTPUT_LINES)));
    }
    lines
}

fn status_label(status: CommandStatus) -> &'static str {
    match status {
        CommandStatus::Running => "running",
        CommandStatus::Completed => "completed",
        CommandStatus::Failed => "failed",
    }
}

/// The `"Worked for Ns"` separator emitted before the final agent message
/// of a run (§4.1).
pub fn render_worked_for(seconds: u64) -> String {
    marker_line(MARKER_WORKED_FOR, &format!("Worked for {seconds}s"))
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
