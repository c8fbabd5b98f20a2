// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test(start_paused = true)]
async fn shuts_down_after_the_miss_window_elapses() {
    let keepalive = Keepalive::new(Duration::from_millis(10), 2);
    let shutdown = CancellationToken::new();

    let watcher = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { keepalive.watch(shutdown).await }
    });

    tokio::time::advance(Duration::from_millis(50)).await;
    watcher.await.expect("watch task");
    assert!(shutdown.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn a_ping_resets_the_window() {
    let keepalive = std::sync::Arc::new(Keepalive::new(Duration::from_millis(10), 2));
    let shutdown = CancellationToken::new();

    let watcher = tokio::spawn({
        let keepalive = keepalive.clone();
        let shutdown = shutdown.clone();
        async move { keepalive.watch(shutdown).await }
    });

    tokio::time::advance(Duration::from_millis(15)).await;
    keepalive.ping();
    tokio::time::advance(Duration::from_millis(15)).await;
    keepalive.ping();

    shutdown.cancel();
    watcher.await.expect("watch task");
}
