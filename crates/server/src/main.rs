// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::error;

use centaurx_server::config::{Cli, ServerConfig};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ServerConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load config {}: {e}", cli.config.display());
            std::process::exit(1);
        }
    };

    centaurx_server::init_logging(&cli, &config);

    let shutdown = CancellationToken::new();
    let shutdown_on_signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        shutdown_on_signal.cancel();
    });

    if let Err(e) = centaurx_server::run(config, shutdown).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
