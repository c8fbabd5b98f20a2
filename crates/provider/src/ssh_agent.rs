// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-user SSH-agent sockets (§4.2 `RunnerFor`): one `ssh-agent` process per
//! user, started lazily and reused across container allocations, with keys
//! loaded from the user's key bundle via `ssh-add`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use centaurx_core::error::{CoreError, CoreResult};
use centaurx_core::ids::UserId;
use parking_lot::Mutex;
use tokio::process::{Child, Command};

struct Agent {
    child: Child,
    sock_path: PathBuf,
}

/// Pool of running `ssh-agent` processes, one per user, rooted under
/// `ssh/agent/<user>.sock` (§6 `ssh{agent_dir}`).
pub struct SshAgentPool {
    agent_dir: PathBuf,
    agents: Mutex<HashMap<String, Agent>>,
}

impl SshAgentPool {
    pub fn new(agent_dir: impl Into<PathBuf>) -> Self {
        Self { agent_dir: agent_dir.into(), agents: Mutex::new(HashMap::new()) }
    }

    /// Return the running agent's socket path for `user`, starting one (and
    /// loading `key_bundle_path` into it) if none is running yet.
    pub async fn ensure(&self, user: &UserId, key_bundle_path: &Path) -> CoreResult<PathBuf> {
        if let Some(sock) = self.running_sock(user) {
            return Ok(sock);
        }

        std::fs::create_dir_all(&self.agent_dir)
            .map_err(|e| CoreError::internal(format!("create agent dir: {e}")))?;
        let sock_path = self.agent_dir.join(format!("{}.sock", user.as_str()));
        if sock_path.exists() {
            let _ = std::fs::remove_file(&sock_path);
        }

        let child = Command::new("ssh-agent")
            .arg("-D")
            .arg("-a")
            .arg(&sock_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CoreError::internal(format!("spawn ssh-agent: {e}")))?;

        wait_for_socket(&sock_path).await?;

        if key_bundle_path.is_file() {
            load_keys(&sock_path, key_bundle_path).await?;
        }

        self.agents.lock().insert(user.as_str().to_string(), Agent { child, sock_path: sock_path.clone() });
        Ok(sock_path)
    }

    fn running_sock(&self, user: &UserId) -> Option<PathBuf> {
        let mut agents = self.agents.lock();
        let agent = agents.get_mut(user.as_str())?;
        match agent.child.try_wait() {
            Ok(None) => Some(agent.sock_path.clone()),
            _ => {
                agents.remove(user.as_str());
                None
            }
        }
    }

    /// Stop `user`'s agent process, if running.
    pub fn stop(&self, user: &UserId) {
        self.agents.lock().remove(user.as_str());
    }
}

async fn wait_for_socket(sock_path: &Path) -> CoreResult<()> {
    const DEADLINE: std::time::Duration = std::time::Duration::from_secs(5);
    const POLL: std::time::Duration = std::time::Duration::from_millis(50);

    let start = tokio::time::Instant::now();
    loop {
        if sock_path.exists() {
            return Ok(());
        }
        if start.elapsed() > DEADLINE {
            return Err(CoreError::internal(format!("ssh-agent socket never appeared at {}", sock_path.display())));
        }
        tokio::time::sleep(POLL).await;
    }
}

async fn load_keys(sock_path: &Path, key_bundle_path: &Path) -> CoreResult<()> {
    let status = Command::new("ssh-add")
        .env("SSH_AUTH_SOCK", sock_path)
        .arg(key_bundle_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|e| CoreError::internal(format!("run ssh-add: {e}")))?;

    if !status.success() {
        return Err(CoreError::internal(format!("ssh-add exited with {status}")));
    }
    Ok(())
}

#[cfg(test)]
#[path = "ssh_agent_tests.rs"]
mod tests;
