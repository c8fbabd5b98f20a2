// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process spawning and process-tree signal delivery (§4.3, §5, §9
//! "Process-tree kill"). Every spawned child becomes the leader of its own
//! process group so a single `kill(-pgid, sig)` reaches every descendant
//! that hasn't escaped via double-fork; a `/proc` sweep catches those too.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::process::Stdio;

use nix::sys::signal::{self, Signal as NixSignal};
use nix::unistd::Pid;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

/// A spawned agent or shell-command process, tracked by its own pgid so it
/// can be torn down as a tree (§9).
pub struct SpawnedProcess {
    child: Child,
    pgid: Pid,
}

impl SpawnedProcess {
    /// Spawn `binary args...` in `cwd` with `env` merged over the runner's
    /// own environment, piping stdout/stderr for the event decoder (C4).
    /// `nice`, when set, runs the process under `nice -n <value>` (§4.2
    /// "resource caps": niceness applies to the agent exec process and to
    /// shell commands alike).
    pub fn spawn(binary: &str, args: &[String], env: &HashMap<String, String>, cwd: &Path, nice: Option<i32>) -> io::Result<Self> {
        let (program, full_args) = Self::nice_wrap(binary, args, nice);
        let mut cmd = Command::new(program);
        cmd.args(full_args)
            .current_dir(cwd)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .process_group(0);

        let child = cmd.spawn()?;
        let pid = child.id().ok_or_else(|| io::Error::other("spawned process has no pid"))?;
        let pgid = Pid::from_raw(pid as i32);
        Ok(Self { child, pgid })
    }

    /// Run a shell command: `sh -lc cmd` when `use_shell`, else an argv split
    /// on whitespace (§4.3 `RunCommand`).
    pub fn spawn_command(command: &str, use_shell: bool, env: &HashMap<String, String>, cwd: &Path, nice: Option<i32>) -> io::Result<Self> {
        if use_shell {
            Self::spawn("sh", &["-lc".to_string(), command.to_string()], env, cwd, nice)
        } else {
            let mut parts = command.split_whitespace();
            let program = parts.next().ok_or_else(|| io::Error::other("empty command"))?;
            let args: Vec<String> = parts.map(str::to_string).collect();
            Self::spawn(program, &args, env, cwd, nice)
        }
    }

    fn nice_wrap(binary: &str, args: &[String], nice: Option<i32>) -> (String, Vec<String>) {
        match nice {
            Some(n) => {
                let mut full = vec!["-n".to_string(), n.to_string(), binary.to_string()];
                full.extend_from_slice(args);
                ("nice".to_string(), full)
            }
            None => (binary.to_string(), args.to_vec()),
        }
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    pub fn pgid(&self) -> Pid {
        self.pgid
    }

    /// Reap the process, returning its exit code (`None` if killed by a
    /// signal rather than exiting).
    pub async fn wait(&mut self) -> io::Result<Option<i32>> {
        let status = self.child.wait().await?;
        Ok(status.code())
    }
}

/// Deliver `signal` to the process group, then sweep `/proc` for any
/// descendant that re-parented outside the group (§9 "Process-tree kill").
pub fn signal_tree(pgid: Pid, signal: NixSignal) {
    let _ = signal::kill(Pid::from_raw(-pgid.as_raw()), signal);
    for descendant in discover_descendants(pgid) {
        let _ = signal::kill(descendant, signal);
    }
}

/// Walk `/proc/<pid>/stat` to find every process transitively parented by
/// `root`, regardless of process group membership.
fn discover_descendants(root: Pid) -> Vec<Pid> {
    let mut children_of: HashMap<i32, Vec<i32>> = HashMap::new();

    let Ok(entries) = fs::read_dir("/proc") else { return Vec::new() };
    for entry in entries.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<i32>().ok()) else { continue };
        let Ok(stat) = fs::read_to_string(entry.path().join("stat")) else { continue };
        let Some(ppid) = parse_ppid(&stat) else { continue };
        children_of.entry(ppid).or_default().push(pid);
    }

    let mut descendants = Vec::new();
    let mut frontier = vec![root.as_raw()];
    while let Some(pid) = frontier.pop() {
        if let Some(children) = children_of.get(&pid) {
            for &child in children {
                descendants.push(Pid::from_raw(child));
                frontier.push(child);
            }
        }
    }
    descendants
}

/// `/proc/<pid>/stat` is `pid (comm) state ppid ...`; `comm` may itself
/// contain spaces or parens, so split on the last `)` before reading fields.
fn parse_ppid(stat: &str) -> Option<i32> {
    let after_comm = stat.rsplit_once(')')?.1;
    after_comm.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
