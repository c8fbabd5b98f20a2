// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-side [`RunnerProvider`] (C3, §4.2): one container per user, dialed
//! over a Unix domain socket mapped from the host, with a keepalive ping
//! task, an SSH-agent socket, and an idle-eviction janitor.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use centaurx_core::error::{CoreError, CoreResult, ErrorCode};
use centaurx_core::ids::{TabId, UserId};
use centaurx_core::model::RunnerInfo;
use centaurx_core::runner_client::{RunnerClient, RunnerProvider};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use tokio::net::UnixStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;
use tracing::{info, warn};

use crate::container::{BindMount, ContainerRuntime, ContainerSpec};
use crate::grpc_client::GrpcRunnerClient;
use crate::home::HomeMaterializer;
use crate::ssh_agent::SshAgentPool;

/// Static configuration for the provider, mirrored from §6's
/// `runner{...}` config block.
#[derive(Clone)]
pub struct ProviderConfig {
    pub image: String,
    /// Argv the container's entrypoint is invoked with, e.g. `["centaurx-runner",
    /// "--sock-path", ..., "--binary", "codex", "--args", "exec --json"]`.
    pub binary: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    /// Host directory holding one socket subdirectory per user.
    pub sock_dir: PathBuf,
    /// Where the socket directory is mounted inside the container.
    pub container_sock_dir: String,
    /// Repo root path inside the container.
    pub repo_root: String,
    /// Host directory containing each user's repos, bound into `repo_root`.
    pub host_repo_root: PathBuf,
    /// Host directory under which `home/<user>/` is materialized.
    pub host_state_dir: PathBuf,
    /// Where the user's home is mounted inside the container.
    pub container_home_dir: String,
    pub keepalive_interval: Duration,
    pub keepalive_misses: u32,
    pub idle_timeout: Duration,
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub nice: Option<i32>,
    pub known_hosts: String,
    pub codex_config_toml: String,
    pub key_bundle_dir: PathBuf,
}

struct UserContainer {
    container_id: String,
    client: Arc<dyn RunnerClient>,
    info: RunnerInfo,
    tabs: HashSet<TabId>,
    keepalive: JoinHandle<()>,
    idle_since: Option<Instant>,
}

/// [`RunnerProvider`] backed by a real container runtime (C1), one container
/// per user (§4.2).
pub struct HostRunnerProvider {
    config: ProviderConfig,
    runtime: Arc<dyn ContainerRuntime>,
    home: HomeMaterializer,
    ssh_agents: SshAgentPool,
    containers: Mutex<HashMap<String, UserContainer>>,
    /// The placeholder `Endpoint` every dialed container connects through,
    /// built once here rather than re-parsed on each `allocate` (§4.2).
    uds_endpoint: Endpoint,
}

impl HostRunnerProvider {
    pub fn new(config: ProviderConfig, runtime: Arc<dyn ContainerRuntime>) -> CoreResult<Self> {
        let home = HomeMaterializer::new(config.host_state_dir.join("home"), None);
        let ssh_agents = SshAgentPool::new(config.host_state_dir.join("ssh").join("agent"));
        let uds_endpoint = Endpoint::try_from("http://[::]:50051")
            .map_err(|e| CoreError::internal(format!("build unix-socket endpoint: {e}")))?;
        Ok(Self { config, runtime, home, ssh_agents, containers: Mutex::new(HashMap::new()), uds_endpoint })
    }

    fn has_container(&self, user: &UserId) -> bool {
        self.containers.lock().contains_key(user.as_str())
    }

    async fn allocate(&self, user: &UserId) -> CoreResult<(Arc<dyn RunnerClient>, RunnerInfo)> {
        let host_sock_dir = self.config.sock_dir.join(user.as_str());
        std::fs::create_dir_all(&host_sock_dir).map_err(|e| CoreError::internal(format!("create socket dir: {e}")))?;
        let host_sock_path = host_sock_dir.join("runner.sock");
        if host_sock_path.exists() {
            let _ = std::fs::remove_file(&host_sock_path);
        }

        let home_dir = self.home.materialize(user, &self.config.known_hosts, &self.config.codex_config_toml)?;

        let repo_dir = self.config.host_repo_root.join(user.as_str());
        std::fs::create_dir_all(&repo_dir).map_err(|e| CoreError::internal(format!("create repo dir: {e}")))?;

        let key_bundle = self.config.key_bundle_dir.join(format!("{}.bundle", user.as_str()));
        let ssh_auth_sock = self.ssh_agents.ensure(user, &key_bundle).await?;

        let container_sock_path = format!("{}/runner.sock", self.config.container_sock_dir.trim_end_matches('/'));
        let mut entrypoint = vec![self.config.binary.clone(), "--sock-path".to_string(), container_sock_path.clone()];
        entrypoint.extend(self.config.args.iter().cloned());
        if let Some(n) = self.config.nice {
            entrypoint.push("--nice".to_string());
            entrypoint.push(n.to_string());
        }

        let spec = ContainerSpec {
            name: format!("centaurx-runner-{}", user.as_str()),
            image: self.config.image.clone(),
            entrypoint,
            env: crate::container::env_list(&self.config.env),
            binds: vec![
                BindMount { host_path: host_sock_dir.display().to_string(), container_path: self.config.container_sock_dir.clone() },
                BindMount { host_path: repo_dir.display().to_string(), container_path: self.config.repo_root.clone() },
                BindMount { host_path: home_dir.display().to_string(), container_path: self.config.container_home_dir.clone() },
            ],
            cpu_percent: self.config.cpu_percent,
            memory_percent: self.config.memory_percent,
        };

        let container_id = self.runtime.create_and_start(spec).await?;

        if let Err(e) = wait_for_socket(&host_sock_path, Duration::from_secs(30), Duration::from_millis(200)).await {
            let _ = self.runtime.remove(&container_id).await;
            return Err(CoreError::new(ErrorCode::RunnerContainerSocket, e.to_string()));
        }

        let channel = dial_uds(&self.uds_endpoint, host_sock_path.clone()).await.map_err(|e| {
            CoreError::new(ErrorCode::RunnerContainerSocket, format!("dial runner socket {}: {e}", host_sock_path.display()))
        })?;
        let client: Arc<dyn RunnerClient> = Arc::new(GrpcRunnerClient::new(channel));

        let keepalive = tokio::spawn(run_keepalive(client.clone(), self.config.keepalive_interval, user.clone()));

        let info = RunnerInfo {
            repo_root: self.config.repo_root.clone(),
            home_dir: self.config.container_home_dir.clone(),
            ssh_auth_sock: ssh_auth_sock.display().to_string(),
        };

        self.containers.lock().insert(
            user.as_str().to_string(),
            UserContainer { container_id, client: client.clone(), info: info.clone(), tabs: HashSet::new(), keepalive, idle_since: None },
        );

        Ok((client, info))
    }

    /// Tear down `user`'s container: stop the keepalive task, send the
    /// container a grace-windowed SIGTERM via the runtime, then remove it
    /// and the user's SSH-agent process.
    async fn teardown(&self, user: &UserId) {
        let entry = self.containers.lock().remove(user.as_str());
        let Some(entry) = entry else { return };
        entry.keepalive.abort();
        if let Err(e) = self.runtime.stop(&entry.container_id, Duration::from_secs(5)).await {
            warn!(user = user.as_str(), error = %e, "stop container failed, removing anyway");
        }
        if let Err(e) = self.runtime.remove(&entry.container_id).await {
            warn!(user = user.as_str(), error = %e, "remove container failed");
        }
        self.ssh_agents.stop(user);
        info!(user = user.as_str(), container = entry.container_id, "runner container torn down");
    }

    /// One sweep of the idle-eviction janitor (§4.2 `CloseTab`, §5): tears
    /// down any container whose `idle_since` has exceeded the configured
    /// timeout.
    async fn sweep_idle(&self) {
        let expired: Vec<UserId> = {
            let containers = self.containers.lock();
            containers
                .iter()
                .filter_map(|(user, c)| {
                    let idle_since = c.idle_since?;
                    (idle_since.elapsed() >= self.config.idle_timeout).then(|| UserId::new(user.clone()).ok()).flatten()
                })
                .collect()
        };
        for user in expired {
            self.teardown(&user).await;
        }
    }

    /// Spawn the per-provider idle-eviction janitor (§5 "one janitor task
    /// per runner provider"). The caller owns the returned handle.
    pub fn spawn_janitor(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let provider = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                tokio::select! {
                    _ = interval.tick() => provider.sweep_idle().await,
                    _ = shutdown.cancelled() => break,
                }
            }
        })
    }

    /// `CloseAll` (§4.2): stop every keepalive, close every client, and
    /// remove every container with a grace window.
    pub async fn close_all(&self) {
        let users: Vec<String> = self.containers.lock().keys().cloned().collect();
        for user in users {
            if let Ok(user) = UserId::new(user) {
                self.teardown(&user).await;
            }
        }
    }
}

#[async_trait]
impl RunnerProvider for HostRunnerProvider {
    async fn runner_for(&self, user: &UserId, tab: &TabId) -> CoreResult<(Arc<dyn RunnerClient>, RunnerInfo)> {
        if !self.has_container(user) {
            self.allocate(user).await?;
        }

        let mut containers = self.containers.lock();
        let entry = containers.get_mut(user.as_str()).ok_or_else(|| CoreError::internal("runner container disappeared after allocation"))?;
        entry.tabs.insert(tab.clone());
        entry.idle_since = None;
        Ok((entry.client.clone(), entry.info.clone()))
    }

    async fn close_tab(&self, user: &UserId, tab: &TabId) {
        let mut containers = self.containers.lock();
        if let Some(entry) = containers.get_mut(user.as_str()) {
            entry.tabs.remove(tab);
            if entry.tabs.is_empty() {
                entry.idle_since = Some(Instant::now());
            }
        }
    }

    async fn save_codex_auth(&self, user: &UserId, bytes: Vec<u8>) -> CoreResult<()> {
        self.home.save_auth(user, &bytes)
    }
}

async fn run_keepalive(client: Arc<dyn RunnerClient>, interval: Duration, user: UserId) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if let Err(e) = client.ping().await {
            warn!(user = user.as_str(), error = %e, "keepalive ping failed; runner may have exited");
            return;
        }
    }
}

async fn wait_for_socket(path: &Path, deadline: Duration, poll: Duration) -> CoreResult<()> {
    let start = tokio::time::Instant::now();
    loop {
        if tokio::net::UnixStream::connect(path).await.is_ok() {
            return Ok(());
        }
        if start.elapsed() > deadline {
            return Err(CoreError::internal(format!("runner socket never accepted a connection at {}", path.display())));
        }
        tokio::time::sleep(poll).await;
    }
}

/// Dial a Unix domain socket as a gRPC [`Channel`] over `endpoint`, the
/// host-side half of the Unix-socket transport §5 "Container sockets"
/// describes. `endpoint`'s URI is a placeholder the connector below ignores
/// in favor of `path`.
async fn dial_uds(endpoint: &Endpoint, path: PathBuf) -> Result<Channel, tonic::transport::Error> {
    endpoint
        .connect_with_connector(service_fn(move |_: Uri| {
            let path = path.clone();
            async move {
                let stream = UnixStream::connect(path).await?;
                Ok::<_, std::io::Error>(TokioIo::new(stream))
            }
        }))
        .await
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
