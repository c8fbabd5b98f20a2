// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `centaurx-runner` entry point: binds the Unix domain socket the host maps
//! into the container, serves the `Runner` gRPC service, and shuts itself
//! down when the keepalive window elapses (§4.3).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::UnixListener;
use tokio_stream::wrappers::UnixListenerStream;
use tokio_util::sync::CancellationToken;

use centaurx_runner::keepalive::Keepalive;
use centaurx_runner::service::RunnerDaemon;
use centaurx_runner_proto::proto::runner_server::RunnerServer;

#[derive(Parser)]
#[command(name = "centaurx-runner", about = "In-container gRPC runner daemon")]
struct Args {
    /// Unix domain socket path to listen on (mapped to the host by the
    /// runner provider, §4.2).
    #[arg(long)]
    sock_path: PathBuf,

    /// Agent binary to invoke for Exec/ExecResume.
    #[arg(long)]
    binary: String,

    /// Base argv appended before the prompt (e.g. `exec --json`).
    #[arg(long, value_delimiter = ' ')]
    args: Vec<String>,

    /// `KEY=VALUE` pairs merged into the agent's environment.
    #[arg(long = "env", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,

    /// Working directory for every spawned process (the repo root).
    #[arg(long, default_value = "/")]
    cwd: PathBuf,

    #[arg(long, default_value_t = 30)]
    keepalive_interval_seconds: u64,

    #[arg(long, default_value_t = 3)]
    keepalive_misses: u32,

    /// Niceness applied to the agent process and every shell command it
    /// runs (§4.2 "resource caps").
    #[arg(long)]
    nice: Option<i32>,
}

fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())).ok_or_else(|| format!("invalid env pair: {raw}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).json().init();

    let args = Args::parse();
    let env: HashMap<String, String> = args.env.into_iter().collect();

    if args.sock_path.exists() {
        std::fs::remove_file(&args.sock_path).context("removing stale socket")?;
    }
    let listener = UnixListener::bind(&args.sock_path).context("binding runner socket")?;
    tracing::info!(sock_path = %args.sock_path.display(), "runner socket bound");

    let shutdown = CancellationToken::new();
    let keepalive = Arc::new(Keepalive::new(Duration::from_secs(args.keepalive_interval_seconds), args.keepalive_misses));
    let daemon = RunnerDaemon::new(args.binary, args.args, env, args.cwd, args.nice, keepalive.clone());

    let watcher = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { keepalive.watch(shutdown).await }
    });

    let serve = tonic::transport::Server::builder()
        .add_service(RunnerServer::new(daemon))
        .serve_with_incoming_shutdown(UnixListenerStream::new(listener), shutdown.cancelled());

    serve.await.context("runner gRPC server failed")?;
    watcher.abort();
    tracing::info!("runner daemon shut down");
    Ok(())
}
