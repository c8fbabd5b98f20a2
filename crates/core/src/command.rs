// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command router (C9): classifies raw transport input into a slash
//! command, a shell command (`!`), or a prompt, before it reaches the
//! tab/session service (§4.7).

/// What a target like `/activate <id|n>` refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivateTarget {
    Id(String),
    Index(usize),
}

/// Slash commands enumerated in §4.7.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    New { repo: String },
    Open { url: String },
    Close,
    Tabs,
    Activate(ActivateTarget),
    Model { id: String },
    Theme { name: String },
    History,
    Logout,
    Quit,
    Chpasswd,
    CodexAuth,
    Help,
    Version,
    Stop,
    Renew,
    FullOutput(Option<bool>),
    /// An unrecognized `/foo` command; surfaced as a buffer-line error (§4.7).
    Unknown { raw: String },
}

/// The result of routing one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutedCommand {
    Slash(SlashCommand),
    Shell(String),
    Prompt(String),
}

/// Route `input` per §4.7: `/` → slash command, `!` → shell command,
/// otherwise a prompt for `SendPrompt`.
pub fn route(input: &str) -> RoutedCommand {
    let trimmed = input.trim_end_matches(['\n', '\r']);

    if let Some(rest) = trimmed.strip_prefix('!') {
        return RoutedCommand::Shell(rest.trim_start().to_string());
    }

    if let Some(rest) = trimmed.strip_prefix('/') {
        return RoutedCommand::Slash(parse_slash(rest));
    }

    RoutedCommand::Prompt(input.to_string())
}

fn parse_slash(rest: &str) -> SlashCommand {
    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("").to_lowercase();
    let arg = parts.next().map(str::trim).unwrap_or("");

    match name.as_str() {
        "new" => SlashCommand::New { repo: arg.to_string() },
        "open" => SlashCommand::Open { url: arg.to_string() },
        "close" => SlashCommand::Close,
        "tabs" => SlashCommand::Tabs,
        "activate" => SlashCommand::Activate(parse_activate_target(arg)),
        "model" => SlashCommand::Model { id: arg.to_string() },
        "theme" => SlashCommand::Theme { name: arg.to_string() },
        "history" => SlashCommand::History,
        "logout" => SlashCommand::Logout,
        "quit" | "exit" | "q" => SlashCommand::Quit,
        "chpasswd" => SlashCommand::Chpasswd,
        "codexauth" => SlashCommand::CodexAuth,
        "help" => SlashCommand::Help,
        "version" => SlashCommand::Version,
        "stop" => SlashCommand::Stop,
        "renew" => SlashCommand::Renew,
        "full-output" => SlashCommand::FullOutput(parse_on_off(arg)),
        _ => SlashCommand::Unknown { raw: format!("/{rest}") },
    }
}

fn parse_activate_target(arg: &str) -> ActivateTarget {
    match arg.parse::<usize>() {
        Ok(n) => ActivateTarget::Index(n),
        Err(_) => ActivateTarget::Id(arg.to_string()),
    }
}

fn parse_on_off(arg: &str) -> Option<bool> {
    match arg.to_lowercase().as_str() {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
