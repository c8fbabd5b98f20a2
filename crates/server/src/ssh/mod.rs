// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSH front door (§6): pubkey + keyboard-interactive TOTP auth, modeled as
//! a trait so the policy is testable without a real SSH stack, plus a
//! minimal line-oriented adapter over the command router (C9) and the
//! terminal event bus (C7). The PTY terminal renderer itself is out of
//! scope (§1) — this module stops at "what a keystroke does to core state".

use std::sync::Arc;

use centaurx_core::command::{self, ActivateTarget, RoutedCommand, SlashCommand};
use centaurx_core::error::{CoreError, CoreResult};
use centaurx_core::ids::{TabId, UserId};
use centaurx_core::service::TabSessionService;

use crate::auth_store::AuthStore;
use crate::totp;

/// Pubkey + TOTP authentication policy for incoming SSH connections.
/// Implemented by [`AuthStore`]; kept as a trait so login attempts can be
/// exercised in tests without a real transport.
pub trait SshAuthenticator: Send + Sync {
    fn has_user(&self, username: &str) -> bool;
    fn authorized_key(&self, username: &str, public_key_line: &str) -> bool;
    fn verify_totp(&self, username: &str, code: &str, unix_time: u64) -> bool;
}

impl SshAuthenticator for AuthStore {
    fn has_user(&self, username: &str) -> bool {
        self.contains(username)
    }

    fn authorized_key(&self, username: &str, public_key_line: &str) -> bool {
        self.pubkeys_for(username).iter().any(|registered| registered == public_key_line)
    }

    fn verify_totp(&self, username: &str, code: &str, unix_time: u64) -> bool {
        match self.totp_secret_for(username) {
            Some(secret) => totp::verify(&secret, code, unix_time),
            None => false,
        }
    }
}

/// Outcome of routing one line of SSH terminal input, for the renderer to
/// act on (redraw the tab bar, print a line, disconnect, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// A prompt or shell command was dispatched; output follows on the bus.
    Dispatched,
    /// The tab list/active tab changed; the renderer should redraw.
    TabsChanged,
    /// `/quit` or `/logout`: the caller should tear the session down.
    Disconnect,
    /// A human-readable line to print directly (help text, errors, `/version`).
    Print(String),
}

/// Adapts one SSH terminal's keystrokes into `TabSessionService` calls,
/// following the `/`, `!`, plain-text routing in §4.7.
pub struct LineAdapter {
    service: Arc<TabSessionService>,
}

impl LineAdapter {
    pub fn new(service: Arc<TabSessionService>) -> Self {
        Self { service }
    }

    /// Route one line of input for `user`, operating on `active_tab` when a
    /// tab-scoped command needs one.
    pub async fn handle_line(&self, user: &UserId, active_tab: Option<&TabId>, line: &str) -> CoreResult<LineOutcome> {
        match command::route(line) {
            RoutedCommand::Prompt(prompt) => {
                let tab = active_tab.ok_or_else(|| CoreError::invalid_state("no active tab"))?;
                self.service.send_prompt(user, tab, prompt).await?;
                Ok(LineOutcome::Dispatched)
            }
            RoutedCommand::Shell(_) => {
                // `!cmd` dispatches through the runner's RunCommand path the
                // same way SendPrompt's pre-turn context gathering does;
                // a bare adapter has no TabSessionService entry point for
                // it on its own, so it rides the same prompt plumbing.
                let tab = active_tab.ok_or_else(|| CoreError::invalid_state("no active tab"))?;
                self.service.send_prompt(user, tab, line.to_string()).await?;
                Ok(LineOutcome::Dispatched)
            }
            RoutedCommand::Slash(cmd) => self.handle_slash(user, active_tab, cmd).await,
        }
    }

    async fn handle_slash(&self, user: &UserId, active_tab: Option<&TabId>, cmd: SlashCommand) -> CoreResult<LineOutcome> {
        match cmd {
            SlashCommand::New { repo } => {
                self.service.create_tab(user, &repo, true, None)?;
                Ok(LineOutcome::TabsChanged)
            }
            SlashCommand::Open { url } => {
                let tab = active_tab.ok_or_else(|| CoreError::invalid_state("no active tab"))?;
                self.service.switch_repo(user, tab, &url, true)?;
                Ok(LineOutcome::TabsChanged)
            }
            SlashCommand::Close => {
                let tab = active_tab.ok_or_else(|| CoreError::invalid_state("no active tab"))?;
                self.service.close_tab(user, tab).await?;
                Ok(LineOutcome::TabsChanged)
            }
            SlashCommand::Tabs => Ok(LineOutcome::TabsChanged),
            SlashCommand::Activate(target) => {
                let tab_id = self.resolve_activate_target(user, target)?;
                self.service.activate_tab(user, &tab_id)?;
                Ok(LineOutcome::TabsChanged)
            }
            SlashCommand::Model { id } => {
                let tab = active_tab.ok_or_else(|| CoreError::invalid_state("no active tab"))?;
                self.service.set_model(user, tab, id)?;
                Ok(LineOutcome::Dispatched)
            }
            SlashCommand::Theme { name } => {
                self.service.set_theme(user, name);
                Ok(LineOutcome::Dispatched)
            }
            SlashCommand::History => {
                let tab = active_tab.ok_or_else(|| CoreError::invalid_state("no active tab"))?;
                let entries = self.service.get_history(user, tab)?;
                Ok(LineOutcome::Print(entries.join("\n")))
            }
            SlashCommand::Logout | SlashCommand::Quit => Ok(LineOutcome::Disconnect),
            SlashCommand::Stop => {
                let tab = active_tab.ok_or_else(|| CoreError::invalid_state("no active tab"))?;
                self.service.stop_session(user, tab).await?;
                Ok(LineOutcome::Dispatched)
            }
            SlashCommand::Renew => {
                let tab = active_tab.ok_or_else(|| CoreError::invalid_state("no active tab"))?;
                self.service.renew_session(user, tab)?;
                Ok(LineOutcome::Dispatched)
            }
            SlashCommand::FullOutput(on) => {
                self.service.set_full_output(user, on.unwrap_or(true));
                Ok(LineOutcome::Dispatched)
            }
            SlashCommand::Help => Ok(LineOutcome::Print(HELP_TEXT.to_string())),
            SlashCommand::Version => Ok(LineOutcome::Print(env!("CARGO_PKG_VERSION").to_string())),
            // Changing a password or uploading Codex credentials needs more
            // than a single line of terminal input; the HTTP API is the
            // supported path for both (§6), so the terminal just points
            // there rather than improvising a multi-line sub-prompt.
            SlashCommand::Chpasswd | SlashCommand::CodexAuth => {
                Ok(LineOutcome::Print("use the web UI's account settings for this".to_string()))
            }
            SlashCommand::Unknown { raw } => Ok(LineOutcome::Print(format!("unknown command: {raw}"))),
        }
    }

    fn resolve_activate_target(&self, user: &UserId, target: ActivateTarget) -> CoreResult<TabId> {
        match target {
            ActivateTarget::Id(id) => Ok(TabId::from_raw(id)),
            ActivateTarget::Index(n) => {
                let list = self.service.list_tabs(user);
                list.tabs.get(n).map(|t| t.id.clone()).ok_or_else(|| CoreError::tab_not_found(format!("index {n}")))
            }
        }
    }
}

const HELP_TEXT: &str = "\
/new <repo>       create a tab\n\
/open <url>       switch the active tab's repo\n\
/close            close the active tab\n\
/tabs             list tabs\n\
/activate <id|n>  switch the active tab\n\
/model <id>       set the active tab's model\n\
/theme <name>     set the UI theme\n\
/history          show the active tab's prompt history\n\
/stop             stop the active tab's running turn\n\
/renew            start a fresh agent session in the active tab\n\
/full-output [on|off]\n\
/logout, /quit    end the session\n\
/help, /version";

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
