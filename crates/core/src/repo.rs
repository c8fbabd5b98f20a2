// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repo resolver (C10): owns each user's git working trees under a shared
//! root directory, creating, cloning, and listing them on demand for
//! `CreateTab`/`SwitchRepo`/`ListRepos` (§2, §4.1).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use crate::error::{CoreError, CoreResult};
use crate::ids::UserId;
use crate::model::RepoRef;

/// Resolves the repo a tab binds to. Implementations own the on-disk
/// layout under a user-scoped directory; callers only see [`RepoRef`]s.
pub trait RepoResolver: Send + Sync {
    /// Resolve `name` to an existing working tree, or create an empty
    /// repo at that name when `create` is set and none exists.
    fn resolve_or_create(&self, user: &UserId, name: &str, create: bool) -> CoreResult<RepoRef>;

    /// Clone `url` into a fresh working tree named `name` for `user`.
    fn clone_from(&self, user: &UserId, name: &str, url: &str) -> CoreResult<RepoRef>;

    /// List every working tree currently resolved for `user`.
    fn list(&self, user: &UserId) -> CoreResult<Vec<RepoRef>>;
}

/// [`RepoResolver`] backed by `gix`, laying out repos at
/// `<root>/<user>/<name>`.
pub struct GixRepoResolver {
    root: PathBuf,
}

impl GixRepoResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn user_dir(&self, user: &UserId) -> PathBuf {
        self.root.join(user.as_str())
    }

    fn repo_path(&self, user: &UserId, name: &str) -> CoreResult<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(CoreError::invalid_request(format!("invalid repo name: {name}")));
        }
        Ok(self.user_dir(user).join(name))
    }

    fn to_ref(name: &str, path: &Path) -> RepoRef {
        RepoRef { name: name.to_string(), path: path.display().to_string() }
    }
}

impl RepoResolver for GixRepoResolver {
    fn resolve_or_create(&self, user: &UserId, name: &str, create: bool) -> CoreResult<RepoRef> {
        let path = self.repo_path(user, name)?;

        if path.is_dir() && gix::open(&path).is_ok() {
            return Ok(Self::to_ref(name, &path));
        }

        if !create {
            return Err(CoreError::repo_not_found(name));
        }

        fs::create_dir_all(&path)
            .map_err(|e| CoreError::internal(format!("create repo dir {}: {e}", path.display())))?;
        gix::init(&path).map_err(|e| CoreError::internal(format!("git init {name}: {e}")))?;
        Ok(Self::to_ref(name, &path))
    }

    fn clone_from(&self, user: &UserId, name: &str, url: &str) -> CoreResult<RepoRef> {
        let path = self.repo_path(user, name)?;
        if path.exists() {
            return Err(CoreError::invalid_request(format!("repo already exists: {name}")));
        }
        fs::create_dir_all(self.user_dir(user))
            .map_err(|e| CoreError::internal(format!("create user dir: {e}")))?;

        let interrupt = AtomicBool::new(false);
        let mut prepare = gix::prepare_clone(url, &path)
            .map_err(|e| CoreError::invalid_request(format!("invalid clone source {url}: {e}")))?;
        let (mut checkout, _outcome) = prepare
            .fetch_then_checkout(gix::progress::Discard, &interrupt)
            .map_err(|e| CoreError::internal(format!("clone fetch {url}: {e}")))?;
        checkout
            .main_worktree(gix::progress::Discard, &interrupt)
            .map_err(|e| CoreError::internal(format!("clone checkout {url}: {e}")))?;

        Ok(Self::to_ref(name, &path))
    }

    fn list(&self, user: &UserId) -> CoreResult<Vec<RepoRef>> {
        let dir = self.user_dir(user);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir)
            .map_err(|e| CoreError::internal(format!("list repos for {}: {e}", user.as_str())))?;

        let mut repos = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CoreError::internal(format!("read dir entry: {e}")))?;
            let path = entry.path();
            if !path.is_dir() || gix::open(&path).is_err() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            repos.push(Self::to_ref(name, &path));
        }
        repos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(repos)
    }
}

#[cfg(test)]
#[path = "repo_tests.rs"]
mod tests;
