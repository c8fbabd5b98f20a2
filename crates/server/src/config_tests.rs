// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn minimal_yaml() -> String {
    "config_version: 4\nrunner:\n  image: centaurx/runner:latest\n".to_string()
}

#[test]
fn default_round_trips_through_yaml() {
    let marshaled = serde_yaml::to_string(&ServerConfig::default()).expect("marshal default");
    let parsed = ServerConfig::parse(&marshaled).expect("parse marshaled default");
    assert_eq!(parsed.config_version, ServerConfig::default().config_version);
    assert_eq!(parsed.runner.image, ServerConfig::default().runner.image);
    assert_eq!(parsed.http.addr, ServerConfig::default().http.addr);
}

#[test]
fn minimal_document_fills_in_defaults() {
    let config = ServerConfig::parse(&minimal_yaml()).expect("parse minimal");
    assert_eq!(config.http.addr, default_http_addr());
    assert_eq!(config.runner.keepalive_misses, default_keepalive_misses());
}

#[test]
fn rejects_unsupported_version() {
    let yaml = "config_version: 3\nrunner:\n  image: x\n";
    let err = ServerConfig::parse(yaml).expect_err("should reject");
    assert!(matches!(err, ConfigError::UnsupportedVersion { found: 3, expected: 4 }));
}

#[test]
fn substitutes_env_vars_and_uid_gid_builtins() {
    std::env::set_var("CENTAURX_TEST_VAR", "sock-from-env");
    let yaml = format!("config_version: 4\nrunner:\n  image: x\n  sock_dir: /run/${{CENTAURX_TEST_VAR}}/$UID-$GID\n");
    let config = ServerConfig::parse(&yaml).expect("parse");
    let expected = format!("/run/sock-from-env/{}-{}", current_uid(), current_gid());
    assert_eq!(config.runner.sock_dir.display().to_string(), expected);
    std::env::remove_var("CENTAURX_TEST_VAR");
}

#[test]
fn unset_env_var_substitutes_empty_string() {
    std::env::remove_var("CENTAURX_DEFINITELY_UNSET");
    let yaml = "config_version: 4\nrunner:\n  image: \"${CENTAURX_DEFINITELY_UNSET}\"\n";
    let config = ServerConfig::parse(yaml).expect("parse");
    assert_eq!(config.runner.image, "");
}
