// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The uniform supervisor contract (§4) over the two pluggable back-ends.

pub mod cluster;
pub mod local;

use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use worker_core::{ExecutionError, ExecutionRequest};

/// What an adoption/create attempt resolved to, for logging and for the
/// facade to decide how to report the activity's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// A fresh container/pod was created.
    Launched,
    /// An existing running container/pod was attached to.
    Adopted,
    /// The container/pod had already exited successfully; no new launch.
    AlreadySucceeded,
    /// `.launched` was present but nothing is running: treat as already
    /// handled and skip (§4.4 adoption protocol).
    Skipped,
}

/// Uniform contract over the local-runtime and cluster-runtime supervisors.
///
/// `execute` turns a request into a supervised container/pod life-cycle
/// with exactly the correct adoption/resumption semantics and returns the
/// connector's raw stdout (or equivalent log text). `cleanup` is the
/// PostSync path: stop/delete the container/pod, idempotently.
#[async_trait]
pub trait Supervisor: Send + Sync {
    async fn execute(
        &self,
        req: &ExecutionRequest,
        workdir: &Path,
        cancel: &CancellationToken,
    ) -> Result<String, ExecutionError>;

    async fn cleanup(&self, req: &ExecutionRequest) -> Result<(), ExecutionError>;
}

/// Environment variables never forwarded from the worker process into a
/// spawned container (§4.4).
pub const ENV_DENY_LIST: &[&str] = &[
    "HOSTNAME",
    "PATH",
    "PWD",
    "HOME",
    "SHLVL",
    "TERM",
    "PERSISTENT_DIR",
    "CONTAINER_REGISTRY_BASE",
    "TEMPORAL_ADDRESS",
    "OLAKE_SECRET_KEY",
    "_",
];

/// Fixed in-container mount path for the workspace (§4.1, §4.4, §4.5).
pub const MOUNT_PATH: &str = "/mnt/config";

/// Filter an iterator of `(key, value)` environment pairs down to those
/// allowed to cross into a spawned container.
pub fn filter_env<'a, I: IntoIterator<Item = (String, String)>>(
    vars: I,
) -> impl Iterator<Item = (String, String)> {
    vars.into_iter().filter(|(k, _)| !ENV_DENY_LIST.contains(&k.as_str()))
}
