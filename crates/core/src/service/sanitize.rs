// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tab name sanitization (§3, §4.1, §8 invariant 4): truncate to
//! `TAB_NAME_MAX` characters (appending `TAB_NAME_SUFFIX` when truncated),
//! then disambiguate against the user's existing tab names.

use crate::model::{TAB_NAME_MAX, TAB_NAME_SUFFIX};

/// Truncate `raw` to fit within `TAB_NAME_MAX` characters, appending
/// `TAB_NAME_SUFFIX` when truncation happened. Operates on `char`s, not
/// bytes, so multi-byte names truncate safely.
pub fn sanitize_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let name = if trimmed.is_empty() { "tab" } else { trimmed };

    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= TAB_NAME_MAX {
        return chars.into_iter().collect();
    }

    let keep = TAB_NAME_MAX.saturating_sub(TAB_NAME_SUFFIX.chars().count());
    let mut truncated: String = chars.into_iter().take(keep).collect();
    truncated.push_str(TAB_NAME_SUFFIX);
    truncated
}

/// Append a numeric disambiguator (`name-2`, `name-3`, ...) until `name` is
/// unique among `existing`, re-truncating the base name so the result never
/// exceeds `TAB_NAME_MAX` (§8 invariant 4 — sanitization alone isn't enough
/// once a suffix is appended). Returns `name` unchanged if already unique.
pub fn disambiguate(name: &str, existing: impl Iterator<Item = impl AsRef<str>>) -> String {
    let existing: Vec<String> = existing.map(|s| s.as_ref().to_string()).collect();
    if !existing.iter().any(|e| e == name) {
        return name.to_string();
    }

    let mut n = 2;
    loop {
        let candidate = with_suffix(name, &format!("-{n}"));
        if !existing.iter().any(|e| e == &candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Truncate `name` to leave room for `suffix` within `TAB_NAME_MAX` chars,
/// then append it.
fn with_suffix(name: &str, suffix: &str) -> String {
    let budget = TAB_NAME_MAX.saturating_sub(suffix.chars().count());
    let base: String = name.chars().take(budget).collect();
    format!("{base}{suffix}")
}

/// Sanitize and disambiguate in one step, as `CreateTab` does (§4.1).
pub fn unique_sanitized_name(raw: &str, existing: impl Iterator<Item = impl AsRef<str>>) -> String {
    disambiguate(&sanitize_name(raw), existing)
}

#[cfg(test)]
#[path = "sanitize_tests.rs"]
mod tests;
