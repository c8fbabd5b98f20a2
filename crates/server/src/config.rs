// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! YAML server configuration (§6): a versioned schema loaded from a
//! `--config` path, with `${VAR}`/`$UID`/`$GID` substitution before
//! parsing. The outer CLI surface (config path, log format/level overrides)
//! is `clap`-derived, matching the teacher's CLI idiom; the schema body
//! itself has no CLI equivalent and is YAML-only.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The only `config_version` this build understands.
pub const CONFIG_VERSION: u32 = 4;

/// CLI surface: everything is either a config file path or a logging
/// override, mirroring the teacher's `--log-format`/`--log-level` flags.
#[derive(Debug, Clone, clap::Parser)]
pub struct Cli {
    /// Path to the YAML server configuration.
    #[arg(long, env = "CENTAURX_CONFIG", default_value = "/etc/centaurx/config.yaml")]
    pub config: PathBuf,

    /// Override `logging.format` from the config file.
    #[arg(long, env = "CENTAURX_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    /// Override `logging.level` from the config file.
    #[arg(long, env = "CENTAURX_LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::Text
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Runtime {
    Podman,
    Containerd,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::Podman
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodmanConfig {
    #[serde(default = "default_podman_socket")]
    pub socket: String,
}

fn default_podman_socket() -> String {
    "/run/podman/podman.sock".to_string()
}

impl Default for PodmanConfig {
    fn default() -> Self {
        Self { socket: default_podman_socket() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerdConfig {
    #[serde(default)]
    pub socket: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub runtime: Runtime,
    pub image: String,
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default = "default_sock_dir")]
    pub sock_dir: PathBuf,
    #[serde(default = "default_container_sock_dir")]
    pub container_sock_dir: String,
    #[serde(default = "default_repo_root_in_container")]
    pub repo_root: String,
    #[serde(default = "default_host_repo_root")]
    pub host_repo_root: PathBuf,
    #[serde(default = "default_host_state_dir")]
    pub host_state_dir: PathBuf,
    #[serde(default = "default_keepalive_interval_seconds")]
    pub keepalive_interval_seconds: u64,
    #[serde(default = "default_keepalive_misses")]
    pub keepalive_misses: u32,
    #[serde(default = "default_idle_timeout_hours")]
    pub idle_timeout_hours: f64,
    #[serde(default)]
    pub podman: PodmanConfig,
    #[serde(default)]
    pub containerd: ContainerdConfig,
    #[serde(default)]
    pub cpu_percent: Option<f64>,
    #[serde(default)]
    pub memory_percent: Option<f64>,
    #[serde(default)]
    pub nice: Option<i32>,
    /// Host path to an `ssh_known_hosts` file materialized into every
    /// runner container's home directory, if set.
    #[serde(default)]
    pub known_hosts_path: Option<PathBuf>,
    /// Host path to a `config.toml` template materialized into every
    /// runner container's Codex config directory, if set.
    #[serde(default)]
    pub codex_config_path: Option<PathBuf>,
}

fn default_binary() -> String {
    "centaurx-runner".to_string()
}

fn default_container_sock_dir() -> String {
    "/run/centaurx".to_string()
}

fn default_repo_root_in_container() -> String {
    "/repo".to_string()
}

fn default_sock_dir() -> PathBuf {
    PathBuf::from("/var/lib/centaurx/sock")
}

fn default_host_repo_root() -> PathBuf {
    PathBuf::from("/var/lib/centaurx/repos")
}

fn default_host_state_dir() -> PathBuf {
    PathBuf::from("/var/lib/centaurx/state")
}

fn default_keepalive_interval_seconds() -> u64 {
    20
}

fn default_keepalive_misses() -> u32 {
    3
}

fn default_idle_timeout_hours() -> f64 {
    8.0
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            runtime: Runtime::default(),
            image: "centaurx/runner:latest".to_string(),
            binary: default_binary(),
            args: Vec::new(),
            env: HashMap::new(),
            sock_dir: PathBuf::from("/var/lib/centaurx/sock"),
            container_sock_dir: default_container_sock_dir(),
            repo_root: default_repo_root_in_container(),
            host_repo_root: PathBuf::from("/var/lib/centaurx/repos"),
            host_state_dir: PathBuf::from("/var/lib/centaurx/state"),
            keepalive_interval_seconds: default_keepalive_interval_seconds(),
            keepalive_misses: default_keepalive_misses(),
            idle_timeout_hours: default_idle_timeout_hours(),
            podman: PodmanConfig::default(),
            containerd: ContainerdConfig::default(),
            cpu_percent: None,
            memory_percent: None,
            nice: None,
            known_hosts_path: None,
            codex_config_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_addr")]
    pub addr: String,
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: u64,
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_base_path")]
    pub base_path: String,
    #[serde(default = "default_initial_buffer_lines")]
    pub initial_buffer_lines: usize,
    #[serde(default = "default_ui_max_buffer_lines")]
    pub ui_max_buffer_lines: usize,
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_session_cookie() -> String {
    "centaurx_session".to_string()
}

fn default_session_ttl_hours() -> u64 {
    24
}

fn default_base_path() -> String {
    "/".to_string()
}

fn default_initial_buffer_lines() -> usize {
    500
}

fn default_ui_max_buffer_lines() -> usize {
    2000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: default_http_addr(),
            session_cookie: default_session_cookie(),
            session_ttl_hours: default_session_ttl_hours(),
            base_url: String::new(),
            base_path: default_base_path(),
            initial_buffer_lines: default_initial_buffer_lines(),
            ui_max_buffer_lines: default_ui_max_buffer_lines(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    #[serde(default = "default_ssh_addr")]
    pub addr: String,
    pub host_key_path: PathBuf,
    pub key_store_path: PathBuf,
    pub key_dir: PathBuf,
    pub agent_dir: PathBuf,
}

fn default_ssh_addr() -> String {
    "0.0.0.0:2222".to_string()
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            addr: default_ssh_addr(),
            host_key_path: PathBuf::from("/var/lib/centaurx/state/ssh/host_key"),
            key_store_path: PathBuf::from("/var/lib/centaurx/state/ssh/keys.bundle"),
            key_dir: PathBuf::from("/var/lib/centaurx/state/ssh/keys"),
            agent_dir: PathBuf::from("/var/lib/centaurx/state/ssh/agent"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub totp_secret: Option<String>,
    #[serde(default)]
    pub login_pubkeys: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_user_file")]
    pub user_file: PathBuf,
    #[serde(default)]
    pub seed_users: Vec<SeedUser>,
}

fn default_user_file() -> PathBuf {
    PathBuf::from("/var/lib/centaurx/state/users.json")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub disable_audit_trails: bool,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Top-level server configuration, the root of the YAML document (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub config_version: u32,
    #[serde(default = "default_repo_root")]
    pub repo_root: PathBuf,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub service: ServiceConfig,
    pub runner: RunnerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub ssh: SshConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub name: Option<String>,
}

fn default_repo_root() -> PathBuf {
    PathBuf::from("/var/lib/centaurx/repos")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("/var/lib/centaurx/state")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_version: CONFIG_VERSION,
            repo_root: default_repo_root(),
            state_dir: default_state_dir(),
            models: vec!["gpt-5".to_string()],
            service: ServiceConfig::default(),
            runner: RunnerConfig::default(),
            http: HttpConfig::default(),
            ssh: SshConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("unsupported config_version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
}

impl ServerConfig {
    /// Load and validate the config at `path`, substituting `${VAR}` (and
    /// the `$UID`/`$GID` builtins) before parsing the YAML body.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read { path: path.to_path_buf(), source: e })?;
        Self::parse(&raw)
    }

    /// Parse an already-read config document (substitution + YAML decode +
    /// version check), split out from [`Self::load`] so it is directly
    /// testable without touching the filesystem.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let substituted = substitute_env(raw);
        let config: Self = serde_yaml::from_str(&substituted)?;
        if config.config_version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion { found: config.config_version, expected: CONFIG_VERSION });
        }
        Ok(config)
    }

    pub fn keepalive_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.runner.keepalive_interval_seconds)
    }

    pub fn idle_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.runner.idle_timeout_hours * 3600.0)
    }

    pub fn session_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http.session_ttl_hours * 3600)
    }
}

/// Replace `${VAR}` references with environment values, plus the `$UID`/
/// `$GID` builtins (§6). An unset variable substitutes the empty string,
/// matching typical shell-adjacent env-substitution semantics rather than
/// failing the whole config load over one optional field.
fn substitute_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let rest = &input[i + 1..];
        if let Some(stripped) = rest.strip_prefix('{') {
            if let Some(end) = stripped.find('}') {
                let var = &stripped[..end];
                out.push_str(&lookup_var(var));
                for _ in 0..(var.len() + 2) {
                    chars.next();
                }
                continue;
            }
        }
        if rest.starts_with("UID") {
            out.push_str(&current_uid().to_string());
            for _ in 0..3 {
                chars.next();
            }
            continue;
        }
        if rest.starts_with("GID") {
            out.push_str(&current_gid().to_string());
            for _ in 0..3 {
                chars.next();
            }
            continue;
        }
        out.push(c);
    }
    out
}

fn lookup_var(name: &str) -> String {
    match name {
        "UID" => current_uid().to_string(),
        "GID" => current_gid().to_string(),
        _ => std::env::var(name).unwrap_or_default(),
    }
}

#[cfg(unix)]
fn current_uid() -> u32 {
    nix::unistd::Uid::current().as_raw()
}

#[cfg(unix)]
fn current_gid() -> u32 {
    nix::unistd::Gid::current().as_raw()
}

#[cfg(not(unix))]
fn current_uid() -> u32 {
    0
}

#[cfg(not(unix))]
fn current_gid() -> u32 {
    0
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
