// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graceful shutdown (§6): on SIGTERM/SIGINT, stop accepting new
//! activities and let running ones return to the scheduler for retry.
//!
//! Grounded in the teacher's `tokio::signal::ctrl_c()` usage in
//! `crates/cli/src/output.rs`, extended to also catch SIGTERM (the signal
//! a container orchestrator sends on pod/container termination, which
//! `ctrl_c()` alone never observes).

use tokio_util::sync::CancellationToken;

/// Resolves once SIGTERM or SIGINT (ctrl-c) arrives. `cancel` is the token
/// every in-flight activity's supervisor poll loop watches; firing it
/// lets `tokio::select!` loops elsewhere unwind cooperatively instead of
/// being killed mid-write.
pub async fn wait_for_shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler, relying on SIGINT only");
                ctrl_c.await.ok();
                tracing::info!("shutdown signal received");
                cancel.cancel();
                return;
            }
        };
        tokio::select! {
            _ = &mut ctrl_c => tracing::info!("SIGINT received, starting graceful shutdown"),
            _ = sigterm.recv() => tracing::info!("SIGTERM received, starting graceful shutdown"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        tracing::info!("shutdown signal received");
    }

    cancel.cancel();
}
