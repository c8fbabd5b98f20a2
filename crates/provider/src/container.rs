// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container runtime adapter (C1): talks to a local Docker/Podman API socket
//! via `bollard`, the one non-teacher dependency this workspace carries
//! (§4.2, SPEC_FULL §C).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, RemoveContainerOptions, StopContainerOptions,
};
use bollard::models::{HostConfig, Mount, MountTypeEnum};
use bollard::Docker;
use centaurx_core::error::{CoreError, CoreResult};

/// A bind mount from a host path into the container.
#[derive(Debug, Clone)]
pub struct BindMount {
    pub host_path: String,
    pub container_path: String,
}

/// Everything needed to create and start one user's runner container
/// (§4.2 `RunnerFor`).
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub entrypoint: Vec<String>,
    pub env: Vec<String>,
    pub binds: Vec<BindMount>,
    /// Host CPU share, 0.0..=100.0 (§4.2 "resource caps").
    pub cpu_percent: Option<f64>,
    /// Host memory share, 0.0..=100.0.
    pub memory_percent: Option<f64>,
}

/// The runtime operations the provider needs; implemented by
/// [`BollardRuntime`] and fakeable in tests.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn create_and_start(&self, spec: ContainerSpec) -> CoreResult<String>;
    async fn stop(&self, container_id: &str, grace: Duration) -> CoreResult<()>;
    async fn remove(&self, container_id: &str) -> CoreResult<()>;
}

/// [`ContainerRuntime`] backed by the local Docker/Podman API socket.
/// Podman's Docker-compatible API speaks the same wire protocol, so one
/// client covers both runtimes (§4.2 "Container runtime adapter").
pub struct BollardRuntime {
    docker: Docker,
}

impl BollardRuntime {
    /// Connect using the local defaults: `DOCKER_HOST` if set, else the
    /// platform's default socket (`/var/run/docker.sock` on Linux).
    pub fn connect_local() -> CoreResult<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| CoreError::new(centaurx_core::error::ErrorCode::RunnerContainerStart, format!("connect container runtime: {e}")))?;
        Ok(Self { docker })
    }

    /// Connect to an explicit Unix socket path (podman's rootless socket is
    /// typically at `$XDG_RUNTIME_DIR/podman/podman.sock`).
    pub fn connect_socket(path: &str) -> CoreResult<Self> {
        let docker = Docker::connect_with_unix(path, 120, bollard::API_DEFAULT_VERSION)
            .map_err(|e| CoreError::new(centaurx_core::error::ErrorCode::RunnerContainerStart, format!("connect container runtime at {path}: {e}")))?;
        Ok(Self { docker })
    }

    fn host_config(spec: &ContainerSpec) -> HostConfig {
        let mounts = spec
            .binds
            .iter()
            .map(|b| Mount {
                target: Some(b.container_path.clone()),
                source: Some(b.host_path.clone()),
                typ: Some(MountTypeEnum::BIND),
                ..Default::default()
            })
            .collect();

        // bollard expresses CPU share as quota/period microseconds; 100%
        // of one core is period == quota.
        const CPU_PERIOD_US: i64 = 100_000;
        let cpu_quota = spec.cpu_percent.map(|pct| ((pct / 100.0) * CPU_PERIOD_US as f64) as i64);
        let memory = spec.memory_percent.map(|pct| {
            let total = sysinfo_total_memory_bytes();
            ((pct / 100.0) * total as f64) as i64
        });

        HostConfig {
            mounts: Some(mounts),
            cpu_period: cpu_quota.map(|_| CPU_PERIOD_US),
            cpu_quota,
            memory,
            auto_remove: Some(false),
            ..Default::default()
        }
    }
}

/// Best-effort total system memory, read from `/proc/meminfo`; used only to
/// turn a configured memory *percentage* into an absolute cgroup limit.
fn sysinfo_total_memory_bytes() -> u64 {
    std::fs::read_to_string("/proc/meminfo")
        .ok()
        .and_then(|contents| {
            contents.lines().find_map(|line| {
                let rest = line.strip_prefix("MemTotal:")?;
                let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
                Some(kb * 1024)
            })
        })
        .unwrap_or(u64::MAX)
}

#[async_trait]
impl ContainerRuntime for BollardRuntime {
    async fn create_and_start(&self, spec: ContainerSpec) -> CoreResult<String> {
        let options = CreateContainerOptions { name: spec.name.clone(), platform: None };
        let config = Config {
            image: Some(spec.image.clone()),
            entrypoint: Some(spec.entrypoint.clone()),
            env: Some(spec.env.clone()),
            host_config: Some(Self::host_config(&spec)),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| CoreError::new(centaurx_core::error::ErrorCode::RunnerContainerStart, format!("create container {}: {e}", spec.name)))?;

        self.docker
            .start_container::<String>(&created.id, None)
            .await
            .map_err(|e| CoreError::new(centaurx_core::error::ErrorCode::RunnerContainerStart, format!("start container {}: {e}", created.id)))?;

        Ok(created.id)
    }

    async fn stop(&self, container_id: &str, grace: Duration) -> CoreResult<()> {
        let options = StopContainerOptions { t: grace.as_secs() as i64 };
        self.docker
            .stop_container(container_id, Some(options))
            .await
            .map_err(|e| CoreError::internal(format!("stop container {container_id}: {e}")))
    }

    async fn remove(&self, container_id: &str) -> CoreResult<()> {
        let options = RemoveContainerOptions { force: true, ..Default::default() };
        self.docker
            .remove_container(container_id, Some(options))
            .await
            .map_err(|e| CoreError::internal(format!("remove container {container_id}: {e}")))
    }
}

/// Merge an explicit env map onto `KEY=VALUE` entries for `bollard::Config`.
pub fn env_list(env: &HashMap<String, String>) -> Vec<String> {
    env.iter().map(|(k, v)| format!("{k}={v}")).collect()
}

#[cfg(test)]
#[path = "container_tests.rs"]
mod tests;
