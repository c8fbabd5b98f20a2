// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centaurx server: YAML config loading, the HTTP API (session cookies +
//! SSE) and a minimal SSH front door, auth/user storage, and process
//! wiring. Thin by design (§A) — this crate calls into `centaurx-core` and
//! `centaurx-provider` rather than re-implementing them.

pub mod auth_store;
pub mod config;
pub mod error;
pub mod http;
pub mod ssh;
pub mod state;
pub mod totp;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, LogFormat, ServerConfig};
use crate::state::AppState;

/// Initialize `tracing-subscriber`, honoring `--log-format`/`--log-level`
/// CLI overrides over the config file's `logging` section (§B).
pub fn init_logging(cli: &Cli, config: &ServerConfig) {
    let level = cli.log_level.clone().unwrap_or_else(|| config.logging.level.clone());
    let format = cli.log_format.unwrap_or(config.logging.format);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

/// Run the server until `shutdown` fires: build `AppState`, spawn
/// background tasks, and serve the HTTP API.
pub async fn run(config: ServerConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr = config.http.addr.clone();
    let state = AppState::build(config, shutdown.clone())?;

    state.runners.spawn_janitor(shutdown.clone());

    tracing::info!(%addr, "centaurx-server listening");
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}
