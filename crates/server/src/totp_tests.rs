// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const SECRET: &str = "JBSWY3DPEHPK3PXP";

#[test]
fn base32_decode_rejects_invalid_characters() {
    assert!(base32_decode("not-base32!!!").is_none());
}

#[test]
fn base32_decode_ignores_padding_and_case() {
    let lower = base32_decode("jbswy3dpehpk3pxp").expect("decode lower");
    let upper = base32_decode("JBSWY3DPEHPK3PXP").expect("decode upper");
    assert_eq!(lower, upper);
}

#[test]
fn code_is_six_digits() {
    let code = code_at(SECRET, 1_700_000_000).expect("code");
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));
}

#[test]
fn verify_accepts_the_current_code() {
    let now = 1_700_000_000;
    let code = code_at(SECRET, now).expect("code");
    assert!(verify(SECRET, &code, now));
}

#[test]
fn verify_rejects_a_wrong_code() {
    let now = 1_700_000_000;
    let code = code_at(SECRET, now).expect("code");
    let wrong = if code == "000000" { "111111".to_string() } else { "000000".to_string() };
    assert!(!verify(SECRET, &wrong, now));
}

#[test]
fn verify_absorbs_one_step_of_clock_skew() {
    let now = 1_700_000_000;
    let previous_step = code_at(SECRET, now - STEP_SECONDS).expect("code");
    assert!(verify(SECRET, &previous_step, now));
}

#[test]
fn verify_rejects_two_steps_of_skew() {
    let now = 1_700_000_000;
    let far = code_at(SECRET, now - 3 * STEP_SECONDS).expect("code");
    assert!(!verify(SECRET, &far, now));
}

#[test]
fn constant_time_eq_matches_standard_equality() {
    assert!(constant_time_eq(b"abc", b"abc"));
    assert!(!constant_time_eq(b"abc", b"abd"));
    assert!(!constant_time_eq(b"abc", b"ab"));
}
