// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Seeded home materialization (§4.2 `RunnerFor`, §6 `home/<user>/`): lays
//! out a user's container home directory from a skeleton template, refreshed
//! with a host-managed SSH `known_hosts` and the agent's `config.toml` on
//! every container allocation.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use centaurx_core::error::{CoreError, CoreResult};
use centaurx_core::ids::UserId;

/// Where a user's home lives on the host, and what seeds it.
pub struct HomeMaterializer {
    /// `home/<user>/` under `state_dir` (§6).
    state_home_root: PathBuf,
    /// Template directory copied in on first materialization (dotfiles,
    /// shell rc, editor config — anything the image doesn't already bake in).
    skel_dir: Option<PathBuf>,
}

impl HomeMaterializer {
    pub fn new(state_home_root: impl Into<PathBuf>, skel_dir: Option<PathBuf>) -> Self {
        Self { state_home_root: state_home_root.into(), skel_dir }
    }

    fn home_dir(&self, user: &UserId) -> PathBuf {
        self.state_home_root.join(user.as_str())
    }

    /// Ensure `home/<user>/` exists, seeded from `skel_dir` on first use,
    /// then (re)write `known_hosts` and `config.toml` from the current host
    /// configuration. Returns the host path to mount into the container.
    pub fn materialize(&self, user: &UserId, known_hosts: &str, codex_config_toml: &str) -> CoreResult<PathBuf> {
        let home = self.home_dir(user);
        if !home.is_dir() {
            fs::create_dir_all(&home)
                .map_err(|e| CoreError::internal(format!("create home dir {}: {e}", home.display())))?;
            if let Some(skel) = &self.skel_dir {
                copy_dir_recursive(skel, &home)
                    .map_err(|e| CoreError::internal(format!("seed home from skel {}: {e}", skel.display())))?;
            }
        }

        let ssh_dir = home.join(".ssh");
        fs::create_dir_all(&ssh_dir).map_err(|e| CoreError::internal(format!("create .ssh dir: {e}")))?;
        atomic_write(&ssh_dir.join("known_hosts"), known_hosts)
            .map_err(|e| CoreError::internal(format!("write known_hosts: {e}")))?;

        let codex_dir = home.join(".codex");
        fs::create_dir_all(&codex_dir).map_err(|e| CoreError::internal(format!("create .codex dir: {e}")))?;
        atomic_write(&codex_dir.join("config.toml"), codex_config_toml)
            .map_err(|e| CoreError::internal(format!("write config.toml: {e}")))?;

        Ok(home)
    }

    /// Materialize `bytes` as the agent's auth credentials file inside the
    /// user's home (§4.1 `SaveCodexAuth`).
    pub fn save_auth(&self, user: &UserId, bytes: &[u8]) -> CoreResult<()> {
        let codex_dir = self.home_dir(user).join(".codex");
        fs::create_dir_all(&codex_dir).map_err(|e| CoreError::internal(format!("create .codex dir: {e}")))?;
        atomic_write_bytes(&codex_dir.join("auth.json"), bytes)
            .map_err(|e| CoreError::internal(format!("write auth.json: {e}")))
    }
}

fn atomic_write(path: &Path, contents: &str) -> std::io::Result<()> {
    atomic_write_bytes(path, contents.as_bytes())
}

fn atomic_write_bytes(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut f = fs::File::create(&tmp_path)?;
        f.write_all(contents)?;
        f.sync_all()?;
    }
    fs::rename(&tmp_path, path)
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let dest_path = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            fs::create_dir_all(&dest_path)?;
            copy_dir_recursive(&entry.path(), &dest_path)?;
        } else {
            fs::copy(entry.path(), &dest_path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "home_tests.rs"]
mod tests;
