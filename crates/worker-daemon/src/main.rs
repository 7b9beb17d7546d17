// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `olake-worker`: process entry point. Loads configuration, wires the
//! supervisor/executor/activity stack, serves the health surface, and
//! shuts down gracefully on SIGTERM/SIGINT (§6).

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod bootstrap;
mod config;
mod error;
mod health;
mod schedule;
mod shutdown;

use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;

use config::WorkerConfig;
use error::DaemonError;
use health::HealthState;

#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    init_tracing();

    let config = match WorkerConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "fatal configuration error at startup");
            return Err(e.into());
        }
    };

    tracing::info!(
        runtime_environment = ?config.runtime_environment,
        task_queue = %config.task_queue,
        worker_identity = %config.worker_identity,
        "starting worker"
    );

    let worker = bootstrap::bootstrap(&config).await?;

    let health_state = HealthState::new(worker.db_pool.clone());
    // No external scheduler SDK wired in yet (§1 out of scope); both
    // flags flip as soon as the in-process stack above finished
    // constructing successfully.
    health_state.mark_scheduler_ready();
    health_state.mark_worker_ready();

    let cancel = CancellationToken::new();
    let addr = SocketAddr::from(([0, 0, 0, 0], config.health_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "health surface listening");

    let health_server = axum::serve(listener, health::router(health_state))
        .with_graceful_shutdown(wait_for_cancel(cancel.clone()));

    tokio::select! {
        result = health_server => {
            if let Err(e) = result {
                tracing::error!(error = %e, "health server exited with an error");
            }
        }
        _ = shutdown::wait_for_shutdown_signal(cancel.clone()) => {}
    }

    if let Some(watch_cancel) = worker.placement_watch_cancel {
        watch_cancel.cancel();
    }
    worker.db_pool.close().await;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn wait_for_cancel(cancel: CancellationToken) {
    cancel.cancelled().await;
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();
}
