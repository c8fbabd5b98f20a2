// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn plain_text_is_a_prompt() {
    assert_eq!(route("fix the bug"), RoutedCommand::Prompt("fix the bug".into()));
}

#[test]
fn bang_prefix_is_shell() {
    assert_eq!(route("!ls -la"), RoutedCommand::Shell("ls -la".into()));
}

#[parameterized(
    quit = { "/quit", SlashCommand::Quit },
    exit = { "/exit", SlashCommand::Quit },
    q = { "/q", SlashCommand::Quit },
    tabs = { "/tabs", SlashCommand::Tabs },
    close = { "/close", SlashCommand::Close },
    history = { "/history", SlashCommand::History },
    stop = { "/stop", SlashCommand::Stop },
    renew = { "/renew", SlashCommand::Renew },
)]
fn slash_aliases_and_bare_commands(input: &str, expected: SlashCommand) {
    assert_eq!(route(input), RoutedCommand::Slash(expected));
}

#[test]
fn new_carries_repo_argument() {
    assert_eq!(
        route("/new demo-repo"),
        RoutedCommand::Slash(SlashCommand::New { repo: "demo-repo".into() })
    );
}

#[test]
fn activate_numeric_argument_is_index() {
    assert_eq!(
        route("/activate 2"),
        RoutedCommand::Slash(SlashCommand::Activate(ActivateTarget::Index(2)))
    );
}

#[test]
fn activate_non_numeric_argument_is_id() {
    assert_eq!(
        route("/activate tab-abc"),
        RoutedCommand::Slash(SlashCommand::Activate(ActivateTarget::Id("tab-abc".into())))
    );
}

#[test]
fn full_output_parses_on_off() {
    assert_eq!(route("/full-output on"), RoutedCommand::Slash(SlashCommand::FullOutput(Some(true))));
    assert_eq!(route("/full-output off"), RoutedCommand::Slash(SlashCommand::FullOutput(Some(false))));
    assert_eq!(route("/full-output"), RoutedCommand::Slash(SlashCommand::FullOutput(None)));
}

#[test]
fn unknown_slash_command_is_preserved_verbatim() {
    assert_eq!(
        route("/frobnicate now"),
        RoutedCommand::Slash(SlashCommand::Unknown { raw: "/frobnicate now".into() })
    );
}

#[test]
fn command_name_is_case_insensitive() {
    assert_eq!(route("/TABS"), RoutedCommand::Slash(SlashCommand::Tabs));
}
