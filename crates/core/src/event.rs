// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain event types: the agent's JSON-lines wire protocol (§6) translated
//! into typed `ExecEvent`s (C4), and the hub's `StreamEvent` envelope (§3).

use serde::{Deserialize, Serialize};

use crate::model::TurnUsage;

/// A single parsed record from the agent's stdout (§6 "Event JSON on the
/// wire"). Deserializes directly from each JSON-lines record; unknown
/// top-level `type` values are preserved by [`Item::Unknown`], never by
/// failing the whole record (§4.4, §7: decode failures never abort the
/// stream).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecEvent {
    #[serde(rename = "thread.started")]
    ThreadStarted { thread_id: String },
    #[serde(rename = "turn.started")]
    TurnStarted,
    #[serde(rename = "turn.completed")]
    TurnCompleted {
        #[serde(default)]
        usage: Option<TurnUsage>,
    },
    #[serde(rename = "turn.failed")]
    TurnFailed { error: WireMessage },
    #[serde(rename = "error")]
    Error { message: String },
    #[serde(rename = "item.started")]
    ItemStarted { item: Item },
    #[serde(rename = "item.updated")]
    ItemUpdated { item: Item },
    #[serde(rename = "item.completed")]
    ItemCompleted { item: Item },
}

/// `{"message": "..."}` nested object used by `turn.failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub message: String,
}

/// Status of a command execution item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Running,
    Completed,
    Failed,
}

/// One entry in a `FileChange` item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChangeEntry {
    pub path: String,
    pub kind: String,
}

/// One entry in a `TodoList` item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoEntry {
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

/// An agent-emitted item, carried inside `ItemStarted/Updated/Completed` (§3).
///
/// Deserialized by hand (not `#[serde(tag = ...)]`) so that an item `type`
/// the decoder doesn't recognize falls through to [`Item::Unknown`] with the
/// original tag preserved, rather than failing the whole record — spec §4.4
/// treats forward-compatibility the same as line-level decode resilience.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Item {
    #[serde(rename = "agent_message")]
    AgentMessage { id: String, text: String },
    Reasoning { id: String, text: String },
    #[serde(rename = "command_execution")]
    CommandExecution {
        id: String,
        command: String,
        #[serde(default)]
        aggregated_output: String,
        #[serde(default)]
        exit_code: Option<i32>,
        status: CommandStatus,
    },
    #[serde(rename = "file_change")]
    FileChange { id: String, changes: Vec<FileChangeEntry> },
    #[serde(rename = "web_search")]
    WebSearch { id: String, query: String },
    #[serde(rename = "todo_list")]
    TodoList { id: String, items: Vec<TodoEntry> },
    Unknown { id: String, kind: String },
}

impl Item {
    /// Stable identity used to dedupe repeated `$ command` prefixes across
    /// Started/Updated/Completed events for the same item (§4.1).
    pub fn id(&self) -> &str {
        match self {
            Item::AgentMessage { id, .. }
            | Item::Reasoning { id, .. }
            | Item::CommandExecution { id, .. }
            | Item::FileChange { id, .. }
            | Item::WebSearch { id, .. }
            | Item::TodoList { id, .. }
            | Item::Unknown { id, .. } => id,
        }
    }
}

impl<'de> Deserialize<'de> for Item {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Tagged {
            #[serde(rename = "type")]
            kind: String,
            #[serde(flatten)]
            rest: serde_json::Value,
        }

        let tagged = Tagged::deserialize(deserializer)?;
        let id = tagged.rest.get("id").and_then(|v| v.as_str()).unwrap_or("").to_string();

        macro_rules! from_rest {
            () => {
                serde_json::from_value(tagged.rest).map_err(serde::de::Error::custom)
            };
        }

        match tagged.kind.as_str() {
            "agent_message" => from_rest!().map(|r: AgentMessageFields| Item::AgentMessage { id: r.id, text: r.text }),
            "reasoning" => from_rest!().map(|r: ReasoningFields| Item::Reasoning { id: r.id, text: r.text }),
            "command_execution" => from_rest!().map(|r: CommandExecutionFields| Item::CommandExecution {
                id: r.id,
                command: r.command,
                aggregated_output: r.aggregated_output,
                exit_code: r.exit_code,
                status: r.status,
            }),
            "file_change" => from_rest!().map(|r: FileChangeFields| Item::FileChange { id: r.id, changes: r.changes }),
            "web_search" => from_rest!().map(|r: WebSearchFields| Item::WebSearch { id: r.id, query: r.query }),
            "todo_list" => from_rest!().map(|r: TodoListFields| Item::TodoList { id: r.id, items: r.items }),
            other => Ok(Item::Unknown { id, kind: other.to_string() }),
        }
    }
}

#[derive(Deserialize)]
struct AgentMessageFields {
    id: String,
    text: String,
}

#[derive(Deserialize)]
struct ReasoningFields {
    id: String,
    text: String,
}

#[derive(Deserialize)]
struct CommandExecutionFields {
    id: String,
    command: String,
    #[serde(default)]
    aggregated_output: String,
    #[serde(default)]
    exit_code: Option<i32>,
    status: CommandStatus,
}

#[derive(Deserialize)]
struct FileChangeFields {
    id: String,
    changes: Vec<FileChangeEntry>,
}

#[derive(Deserialize)]
struct WebSearchFields {
    id: String,
    query: String,
}

#[derive(Deserialize)]
struct TodoListFields {
    id: String,
    items: Vec<TodoEntry>,
}

/// Hub event kinds (§3 `StreamEvent`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventKind {
    Snapshot,
    Output,
    System,
    Tab,
}

/// A seq-numbered envelope delivered to hub subscribers and replayed on
/// reconnect (§3, §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    pub seq: u64,
    #[serde(rename = "type")]
    pub kind: StreamEventKind,
    pub payload: serde_json::Value,
    pub timestamp_ms: u64,
}

/// Signals the service/provider may deliver to a run (§4.1, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Hup,
    Term,
    Kill,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hup => "HUP",
            Self::Term => "TERM",
            Self::Kill => "KILL",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
