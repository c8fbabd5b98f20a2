// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use async_trait::async_trait;
use centaurx_core::error::CoreResult;
use centaurx_core::event::Signal;
use centaurx_core::ids::{RunId, TabId, UserId};
use centaurx_core::model::{RepoRef, RunnerInfo, TurnUsage};
use centaurx_core::repo::RepoResolver;
use centaurx_core::runner_client::{RunCommandHandle, RunControl, RunHandle, RunnerClient, RunnerProvider};
use centaurx_core::service::TabSessionService;
use centaurx_core::sink::Fanout;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::*;

struct FakeRepoResolver;

impl RepoResolver for FakeRepoResolver {
    fn resolve_or_create(&self, _user: &UserId, name: &str, _create: bool) -> CoreResult<RepoRef> {
        Ok(RepoRef { name: name.to_string(), path: format!("/repos/{name}") })
    }

    fn clone_from(&self, _user: &UserId, name: &str, _url: &str) -> CoreResult<RepoRef> {
        Ok(RepoRef { name: name.to_string(), path: format!("/repos/{name}") })
    }

    fn list(&self, _user: &UserId) -> CoreResult<Vec<RepoRef>> {
        Ok(Vec::new())
    }
}

struct FakeControl;

#[async_trait]
impl RunControl for FakeControl {
    async fn signal(&self, _signal: Signal) -> CoreResult<()> {
        Ok(())
    }
}

struct FakeRunnerClient;

#[async_trait]
impl RunnerClient for FakeRunnerClient {
    async fn exec(&self, run_id: RunId, _prompt: String) -> CoreResult<RunHandle> {
        let (etx, erx) = mpsc::channel(8);
        let (otx, orx) = oneshot::channel();
        drop(etx);
        let _ = otx.send(centaurx_core::runner_client::RunOutcome { exit_code: Some(0), failed: false, message: None });
        Ok(RunHandle::new(run_id, erx, orx, Arc::new(FakeControl)))
    }

    async fn exec_resume(&self, run_id: RunId, _session_id: String, prompt: String) -> CoreResult<RunHandle> {
        self.exec(run_id, prompt).await
    }

    async fn run_command(&self, run_id: RunId, _command: String, _use_shell: bool) -> CoreResult<RunCommandHandle> {
        let (ltx, lrx) = mpsc::channel(8);
        let (otx, orx) = oneshot::channel();
        drop(ltx);
        let _ = otx.send(centaurx_core::runner_client::RunOutcome { exit_code: Some(0), failed: false, message: None });
        Ok(RunCommandHandle::new(run_id, lrx, orx, Arc::new(FakeControl)))
    }

    async fn ping(&self) -> CoreResult<()> {
        Ok(())
    }

    async fn usage(&self) -> CoreResult<TurnUsage> {
        Ok(TurnUsage::default())
    }
}

struct FakeProvider;

#[async_trait]
impl RunnerProvider for FakeProvider {
    async fn runner_for(&self, _user: &UserId, _tab: &TabId) -> CoreResult<(Arc<dyn RunnerClient>, RunnerInfo)> {
        Ok((Arc::new(FakeRunnerClient), RunnerInfo { repo_root: "/repo".into(), home_dir: "/home".into(), ssh_auth_sock: "/sock".into() }))
    }

    async fn close_tab(&self, _user: &UserId, _tab: &TabId) {}

    async fn save_codex_auth(&self, _user: &UserId, _bytes: Vec<u8>) -> CoreResult<()> {
        Ok(())
    }
}

fn alice() -> UserId {
    UserId::new("alice").unwrap()
}

fn adapter() -> (LineAdapter, Arc<TabSessionService>) {
    let service = Arc::new(TabSessionService::new(Arc::new(FakeRepoResolver), Arc::new(FakeProvider), Fanout::new(), CancellationToken::new()));
    (LineAdapter::new(service.clone()), service)
}

#[tokio::test]
async fn new_command_creates_a_tab() {
    let (adapter, service) = adapter();
    let outcome = adapter.handle_line(&alice(), None, "/new demo").await.unwrap();
    assert_eq!(outcome, LineOutcome::TabsChanged);
    assert_eq!(service.list_tabs(&alice()).tabs.len(), 1);
}

#[tokio::test]
async fn prompt_without_an_active_tab_is_invalid_state() {
    let (adapter, _service) = adapter();
    let err = adapter.handle_line(&alice(), None, "hello").await.unwrap_err();
    assert_eq!(err.code, centaurx_core::error::ErrorCode::InvalidState);
}

#[tokio::test]
async fn prompt_with_an_active_tab_dispatches() {
    let (adapter, service) = adapter();
    let tab = service.create_tab(&alice(), "demo", true, None).unwrap();
    let outcome = adapter.handle_line(&alice(), Some(&tab.id), "hello there").await.unwrap();
    assert_eq!(outcome, LineOutcome::Dispatched);
}

#[tokio::test]
async fn activate_by_index_resolves_from_tab_list_order() {
    let (adapter, service) = adapter();
    let first = service.create_tab(&alice(), "one", true, None).unwrap();
    let _second = service.create_tab(&alice(), "two", true, None).unwrap();
    adapter.handle_line(&alice(), None, "/activate 0").await.unwrap();
    assert_eq!(service.list_tabs(&alice()).active_tab, Some(first.id));
}

#[tokio::test]
async fn logout_and_quit_request_disconnect() {
    let (adapter, _service) = adapter();
    assert_eq!(adapter.handle_line(&alice(), None, "/logout").await.unwrap(), LineOutcome::Disconnect);
    assert_eq!(adapter.handle_line(&alice(), None, "/quit").await.unwrap(), LineOutcome::Disconnect);
}

#[tokio::test]
async fn unknown_slash_command_is_printed_not_an_error() {
    let (adapter, _service) = adapter();
    let outcome = adapter.handle_line(&alice(), None, "/bogus").await.unwrap();
    assert!(matches!(outcome, LineOutcome::Print(ref s) if s.contains("/bogus")));
}

#[tokio::test]
async fn chpasswd_and_codexauth_point_at_the_web_ui() {
    let (adapter, _service) = adapter();
    let outcome = adapter.handle_line(&alice(), None, "/chpasswd").await.unwrap();
    assert!(matches!(outcome, LineOutcome::Print(_)));
}
