// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn short_name_is_unchanged() {
    assert_eq!(sanitize_name("demo"), "demo");
}

#[test]
fn blank_name_falls_back_to_tab() {
    assert_eq!(sanitize_name("   "), "tab");
}

#[test]
fn long_name_is_truncated_with_suffix() {
    let sanitized = sanitize_name("a-very-long-repository-name");
    assert_eq!(sanitized.chars().count(), TAB_NAME_MAX);
    assert!(sanitized.ends_with(TAB_NAME_SUFFIX));
}

#[test]
fn unique_name_is_unchanged() {
    let existing = vec!["other".to_string()];
    assert_eq!(disambiguate("demo", existing.iter()), "demo");
}

#[test]
fn colliding_name_gets_a_numeric_suffix() {
    let existing = vec!["demo".to_string()];
    assert_eq!(disambiguate("demo", existing.iter()), "demo-2");
}

#[test]
fn disambiguation_skips_over_existing_suffixes() {
    let existing = vec!["demo".to_string(), "demo-2".to_string(), "demo-3".to_string()];
    assert_eq!(disambiguate("demo", existing.iter()), "demo-4");
}

#[test]
fn truncated_name_stays_within_max_after_disambiguation() {
    let sanitized = sanitize_name("a-very-long-repository-name");
    assert_eq!(sanitized.chars().count(), TAB_NAME_MAX);
    let existing = vec![sanitized.clone()];
    let unique = disambiguate(&sanitized, existing.iter());
    assert!(unique.chars().count() <= TAB_NAME_MAX, "{unique} exceeds TAB_NAME_MAX");
    assert_ne!(unique, sanitized);
}

#[test]
fn unique_sanitized_name_stays_within_max_through_many_collisions() {
    let mut existing = vec![sanitize_name("a-very-long-repository-name")];
    for n in 2..12 {
        existing.push(with_suffix(&sanitize_name("a-very-long-repository-name"), &format!("-{n}")));
    }
    let unique = unique_sanitized_name("a-very-long-repository-name", existing.iter());
    assert!(unique.chars().count() <= TAB_NAME_MAX, "{unique} exceeds TAB_NAME_MAX");
    assert!(!existing.contains(&unique));
}
