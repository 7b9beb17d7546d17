// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The daemon binary's fatal top-level error type (§7: "a fatal
//! top-level error type in the daemon binary only" — library crates stay
//! on `ExecutionError`/`ConfigError`/etc., never a blanket `anyhow`).

use crate::config::ConfigError;
use worker_core::ExecutionError;

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("bootstrap failed: {0}")]
    Bootstrap(#[from] ExecutionError),

    #[error("kubernetes client init failed: {0}")]
    Kube(#[from] kube::Error),

    #[error("health server failed: {0}")]
    Health(#[from] std::io::Error),
}
