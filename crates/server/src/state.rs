// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composition root: wires the core domain services (C5-C10), the host
//! runner provider (C3), and the auth/session stores into one `AppState`
//! handed to every transport (HTTP handlers, the SSH adapter).

use std::sync::Arc;

use centaurx_core::bus::TerminalBus;
use centaurx_core::hub::EventHub;
use centaurx_core::repo::GixRepoResolver;
use centaurx_core::service::TabSessionService;
use centaurx_core::session_store::SessionStore;
use centaurx_core::sink::{AuditSink, BusSink, Fanout, HubSink};
use centaurx_provider::container::{BollardRuntime, ContainerRuntime};
use centaurx_provider::provider::{HostRunnerProvider, ProviderConfig};
use tokio_util::sync::CancellationToken;

use crate::auth_store::AuthStore;
use crate::config::{Runtime, ServerConfig};

pub struct AppState {
    pub config: ServerConfig,
    pub service: Arc<TabSessionService>,
    pub hub: Arc<EventHub>,
    pub bus: Arc<TerminalBus>,
    pub sessions: Arc<SessionStore>,
    pub auth: Arc<AuthStore>,
    pub runners: Arc<HostRunnerProvider>,
    pub shutdown: CancellationToken,
}

/// Read an optional template file (`known_hosts`/Codex `config.toml`),
/// treating "not configured" as an empty document rather than an error.
fn read_optional(path: Option<&std::path::Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("read {}: {e}", path.display())),
        None => Ok(String::new()),
    }
}

impl AppState {
    /// Build every long-lived component from `config`. Does not start any
    /// background task; the caller spawns those after construction so it
    /// controls startup ordering and can hold onto the task handles.
    pub fn build(config: ServerConfig, shutdown: CancellationToken) -> anyhow::Result<Arc<Self>> {
        let repos = Arc::new(GixRepoResolver::new(config.repo_root.clone()));

        let runtime: Arc<dyn ContainerRuntime> = match config.runner.runtime {
            Runtime::Podman => Arc::new(BollardRuntime::connect_socket(&config.runner.podman.socket)?),
            Runtime::Containerd => match &config.runner.containerd.socket {
                Some(socket) => Arc::new(BollardRuntime::connect_socket(socket)?),
                None => Arc::new(BollardRuntime::connect_local()?),
            },
        };

        let known_hosts = read_optional(config.runner.known_hosts_path.as_deref())?;
        let codex_config_toml = read_optional(config.runner.codex_config_path.as_deref())?;

        let provider_config = ProviderConfig {
            image: config.runner.image.clone(),
            binary: config.runner.binary.clone(),
            args: config.runner.args.clone(),
            env: config.runner.env.clone(),
            sock_dir: config.runner.sock_dir.clone(),
            container_sock_dir: config.runner.container_sock_dir.clone(),
            repo_root: config.runner.repo_root.clone(),
            host_repo_root: config.runner.host_repo_root.clone(),
            host_state_dir: config.runner.host_state_dir.clone(),
            container_home_dir: "/home/agent".to_string(),
            keepalive_interval: config.keepalive_interval(),
            keepalive_misses: config.runner.keepalive_misses,
            idle_timeout: config.idle_timeout(),
            cpu_percent: config.runner.cpu_percent,
            memory_percent: config.runner.memory_percent,
            nice: config.runner.nice,
            known_hosts,
            codex_config_toml,
            key_bundle_dir: config.ssh.key_dir.clone(),
        };
        let runners = Arc::new(HostRunnerProvider::new(provider_config, runtime)?);

        let hub = Arc::new(EventHub::default());
        let bus = Arc::new(TerminalBus::default());
        let sink = Fanout::new()
            .with(Arc::new(HubSink(hub.clone())) as Arc<dyn centaurx_core::sink::EventSink>)
            .with(Arc::new(BusSink(bus.clone())) as Arc<dyn centaurx_core::sink::EventSink>);
        let sink = if config.logging.disable_audit_trails { sink } else { sink.with(Arc::new(AuditSink)) };

        let service = Arc::new(TabSessionService::new(repos, runners.clone(), sink, shutdown.clone()));

        let sessions = Arc::new(SessionStore::new(shutdown.clone(), config.session_ttl()));
        let auth = Arc::new(AuthStore::new(config.auth.user_file.clone()));
        auth.load().map_err(|e| anyhow::anyhow!("load users.json: {e}"))?;
        auth.seed(&config.auth.seed_users)?;

        Ok(Arc::new(Self { config, service, hub, bus, sessions, auth, runners, shutdown }))
    }
}
