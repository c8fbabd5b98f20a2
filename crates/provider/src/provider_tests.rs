// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use centaurx_core::ids::{TabId, UserId};
use centaurx_runner_proto::proto::runner_server::{Runner, RunnerServer};
use centaurx_runner_proto::proto::{
    ExecRequest, ExecResumeRequest, GetUsageRequest, GetUsageResponse, PingRequest, PingResponse, RunCommandRequest,
    RunnerEvent, SignalSessionRequest, SignalSessionResponse,
};
use tempfile::tempdir;
use tokio_stream::wrappers::UnixListenerStream;
use tonic::{Request, Response, Status};

use super::*;

/// Answers every RPC but is never actually dialed in these tests beyond the
/// transport handshake; present only so the fake socket accepts a real gRPC
/// connection.
struct FakeRunner;

type EventStream = std::pin::Pin<Box<dyn tokio_stream::Stream<Item = Result<RunnerEvent, Status>> + Send>>;

#[tonic::async_trait]
impl Runner for FakeRunner {
    async fn ping(&self, _request: Request<PingRequest>) -> Result<Response<PingResponse>, Status> {
        Ok(Response::new(PingResponse { ok: true }))
    }

    async fn get_usage(&self, _request: Request<GetUsageRequest>) -> Result<Response<GetUsageResponse>, Status> {
        Ok(Response::new(GetUsageResponse { input_tokens: 0, output_tokens: 0, cached_input_tokens: 0 }))
    }

    type ExecStream = EventStream;

    async fn exec(&self, _request: Request<ExecRequest>) -> Result<Response<Self::ExecStream>, Status> {
        Ok(Response::new(Box::pin(tokio_stream::empty())))
    }

    type ExecResumeStream = EventStream;

    async fn exec_resume(&self, _request: Request<ExecResumeRequest>) -> Result<Response<Self::ExecResumeStream>, Status> {
        Ok(Response::new(Box::pin(tokio_stream::empty())))
    }

    type RunCommandStream = EventStream;

    async fn run_command(&self, _request: Request<RunCommandRequest>) -> Result<Response<Self::RunCommandStream>, Status> {
        Ok(Response::new(Box::pin(tokio_stream::empty())))
    }

    async fn signal_session(&self, _request: Request<SignalSessionRequest>) -> Result<Response<SignalSessionResponse>, Status> {
        Ok(Response::new(SignalSessionResponse { ok: true, message: String::new() }))
    }
}

/// Stands in for [`BollardRuntime`]: instead of a real container, it binds a
/// Unix socket at the path the provider expects to find under its bind
/// mount and serves [`FakeRunner`] over it.
struct FakeContainerRuntime {
    next_id: AtomicU64,
}

impl FakeContainerRuntime {
    fn new() -> Self {
        Self { next_id: AtomicU64::new(0) }
    }
}

#[async_trait]
impl ContainerRuntime for FakeContainerRuntime {
    async fn create_and_start(&self, spec: ContainerSpec) -> CoreResult<String> {
        let sock_dir = PathBuf::from(&spec.binds[0].host_path);
        std::fs::create_dir_all(&sock_dir).map_err(|e| CoreError::internal(e.to_string()))?;
        let sock_path = sock_dir.join("runner.sock");
        let listener = tokio::net::UnixListener::bind(&sock_path).map_err(|e| CoreError::internal(e.to_string()))?;
        tokio::spawn(async move {
            let _ = tonic::transport::Server::builder()
                .add_service(RunnerServer::new(FakeRunner))
                .serve_with_incoming(UnixListenerStream::new(listener))
                .await;
        });
        Ok(format!("fake-{}", self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn stop(&self, _container_id: &str, _grace: Duration) -> CoreResult<()> {
        Ok(())
    }

    async fn remove(&self, _container_id: &str) -> CoreResult<()> {
        Ok(())
    }
}

fn alice() -> UserId {
    UserId::new("alice").expect("valid user id")
}

fn test_config(root: &Path, idle_timeout: Duration) -> ProviderConfig {
    ProviderConfig {
        image: "centaurx/runner:latest".to_string(),
        binary: "centaurx-runner".to_string(),
        args: vec![],
        env: HashMap::new(),
        sock_dir: root.join("sock"),
        container_sock_dir: "/run/runner".to_string(),
        repo_root: "/repo".to_string(),
        host_repo_root: root.join("repos"),
        host_state_dir: root.join("state"),
        container_home_dir: "/home/agent".to_string(),
        keepalive_interval: Duration::from_secs(3600),
        keepalive_misses: 3,
        idle_timeout,
        cpu_percent: None,
        memory_percent: None,
        nice: None,
        known_hosts: "example.com ssh-ed25519 AAAA".to_string(),
        codex_config_toml: "[model]\nname = \"gpt\"\n".to_string(),
        key_bundle_dir: root.join("keys"),
    }
}

fn provider(root: &Path, idle_timeout: Duration) -> HostRunnerProvider {
    HostRunnerProvider::new(test_config(root, idle_timeout), Arc::new(FakeContainerRuntime::new())).expect("build provider")
}

#[tokio::test]
async fn runner_for_allocates_once_and_reuses_for_a_second_tab() {
    let dir = tempdir().expect("tempdir");
    let provider = provider(dir.path(), Duration::from_secs(3600));
    let user = alice();

    let (_client_a, info_a) = provider.runner_for(&user, &TabId::generate()).await.expect("first runner_for");
    assert_eq!(provider.containers.lock().len(), 1);

    let (_client_b, info_b) = provider.runner_for(&user, &TabId::generate()).await.expect("second runner_for");
    assert_eq!(provider.containers.lock().len(), 1, "second tab reuses the same container");
    assert_eq!(info_a.home_dir, info_b.home_dir);
}

#[tokio::test]
async fn close_tab_starts_the_idle_timer_only_once_all_tabs_are_gone() {
    let dir = tempdir().expect("tempdir");
    let provider = provider(dir.path(), Duration::from_secs(3600));
    let user = alice();
    let tab_a = TabId::generate();
    let tab_b = TabId::generate();

    provider.runner_for(&user, &tab_a).await.expect("runner_for a");
    provider.runner_for(&user, &tab_b).await.expect("runner_for b");

    provider.close_tab(&user, &tab_a).await;
    assert!(provider.containers.lock().get(user.as_str()).expect("entry").idle_since.is_none(), "still has tab_b open");

    provider.close_tab(&user, &tab_b).await;
    assert!(provider.containers.lock().get(user.as_str()).expect("entry").idle_since.is_some());
}

#[tokio::test]
async fn sweep_idle_tears_down_containers_past_the_idle_timeout() {
    let dir = tempdir().expect("tempdir");
    let provider = provider(dir.path(), Duration::from_millis(20));
    let user = alice();
    let tab = TabId::generate();

    provider.runner_for(&user, &tab).await.expect("runner_for");
    provider.close_tab(&user, &tab).await;

    tokio::time::sleep(Duration::from_millis(60)).await;
    provider.sweep_idle().await;

    assert!(provider.containers.lock().is_empty());
}

#[tokio::test]
async fn save_codex_auth_writes_through_to_the_materialized_home() {
    let dir = tempdir().expect("tempdir");
    let provider = provider(dir.path(), Duration::from_secs(3600));
    let user = alice();
    provider.runner_for(&user, &TabId::generate()).await.expect("runner_for");

    provider.save_codex_auth(&user, b"{\"token\":\"t\"}".to_vec()).await.expect("save_codex_auth");

    let auth_path = dir.path().join("state").join("home").join("alice").join(".codex").join("auth.json");
    assert_eq!(std::fs::read(auth_path).expect("read auth.json"), b"{\"token\":\"t\"}");
}
