// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn insert_then_get_returns_the_pgid() {
    let registry = RunRegistry::new();
    registry.insert("run-1".into(), Pid::from_raw(123));
    assert_eq!(registry.get("run-1"), Some(Pid::from_raw(123)));
}

#[test]
fn remove_clears_the_entry() {
    let registry = RunRegistry::new();
    registry.insert("run-1".into(), Pid::from_raw(123));
    registry.remove("run-1");
    assert_eq!(registry.get("run-1"), None);
}

#[test]
fn unknown_run_id_is_none() {
    let registry = RunRegistry::new();
    assert_eq!(registry.get("missing"), None);
}
