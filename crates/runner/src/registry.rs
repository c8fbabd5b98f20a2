// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run registry (§4.3 "concurrent map of runId → process interface"):
//! tracks the process group of every in-flight `Exec`/`ExecResume`/
//! `RunCommand` invocation so `SignalSession` can reach it by run id.

use std::collections::HashMap;

use nix::unistd::Pid;
use parking_lot::Mutex;

pub struct RunRegistry {
    runs: Mutex<HashMap<String, Pid>>,
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RunRegistry {
    pub fn new() -> Self {
        Self { runs: Mutex::new(HashMap::new()) }
    }

    pub fn insert(&self, run_id: String, pgid: Pid) {
        self.runs.lock().insert(run_id, pgid);
    }

    /// Removed from the handler's deferred block once the process has
    /// reaped, per §4.3 "cleaned up in the handler's deferred block".
    pub fn remove(&self, run_id: &str) {
        self.runs.lock().remove(run_id);
    }

    pub fn get(&self, run_id: &str) -> Option<Pid> {
        self.runs.lock().get(run_id).copied()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
