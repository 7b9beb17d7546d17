// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor Facade (§4.6): the single entry point the activity layer
//! calls into, regardless of which back-end is actually running the
//! connector.

use crate::json::extract_json_substring;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use worker_adapters::Supervisor;
use worker_core::naming::workspace_paths;
use worker_core::{Clock, ExecutionError, ExecutionRequest, ExecutorResponse, SystemClock};
use worker_storage::Repository;

/// Per-process configuration the facade needs beyond what travels on each
/// request.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Base directory under which every workflow gets its own subdirectory.
    pub workspace_base: PathBuf,
}

/// Picks a supervisor once at construction and dispatches every
/// `Execute`/`CleanupAndPersistState` call to it.
///
/// Generic over [`Clock`] so the `elapsed_ms` timing in [`Self::execute`]
/// is deterministic under test; production code gets `Executor` (an alias
/// for `Executor<SystemClock>`) via [`Self::new`].
pub struct Executor<C: Clock = SystemClock> {
    supervisor: Arc<dyn Supervisor>,
    repo: Arc<dyn Repository>,
    config: ExecutorConfig,
    clock: C,
}

impl Executor<SystemClock> {
    pub fn new(supervisor: Arc<dyn Supervisor>, repo: Arc<dyn Repository>, config: ExecutorConfig) -> Self {
        Self::with_clock(supervisor, repo, config, SystemClock)
    }
}

impl<C: Clock> Executor<C> {
    pub fn with_clock(supervisor: Arc<dyn Supervisor>, repo: Arc<dyn Repository>, config: ExecutorConfig, clock: C) -> Self {
        Self { supervisor, repo, config, clock }
    }

    /// Run one connector invocation to completion and normalize its output.
    pub async fn execute(
        &self,
        req: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecutorResponse, ExecutionError> {
        let start = self.clock.now();
        let result = self.execute_inner(req, cancel).await;
        let elapsed_ms = self.clock.now().duration_since(start).as_millis() as u64;
        match &result {
            Ok(resp) => {
                tracing::info!(workflow_id = %req.workflow_id, command = %req.command, elapsed_ms, response = %resp.response, "execute completed")
            }
            Err(e) => {
                tracing::error!(workflow_id = %req.workflow_id, command = %req.command, elapsed_ms, error = %e, "execute failed")
            }
        }
        result
    }

    async fn execute_inner(
        &self,
        req: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecutorResponse, ExecutionError> {
        let (subdir, workdir) = workspace_paths(&self.config.workspace_base, req.command, &req.workflow_id);

        tokio::fs::create_dir_all(&workdir)
            .await
            .map_err(|e| ExecutionError::Configuration(format!("failed to create workspace {}: {e}", workdir.display())))?;

        if !launched(&workdir) && !req.configs.is_empty() {
            for config in &req.configs {
                let path = workdir.join(&config.name);
                tokio::fs::write(&path, &config.data)
                    .await
                    .map_err(|e| ExecutionError::Configuration(format!("failed to write config {}: {e}", path.display())))?;
            }
        }

        let stdout = self.supervisor.execute(req, &workdir, cancel).await?;

        if let Some(output_file) = &req.output_file {
            return Ok(ExecutorResponse::new(format!("{subdir}/{output_file}")));
        }

        match extract_json_substring(&stdout) {
            Some(json) => {
                let output_path = workdir.join("output.json");
                tokio::fs::write(&output_path, json)
                    .await
                    .map_err(|e| ExecutionError::Configuration(format!("failed to write {}: {e}", output_path.display())))?;
                Ok(ExecutorResponse::new(format!("{subdir}/output.json")))
            }
            None => Ok(ExecutorResponse::new(stdout)),
        }
    }

    /// Tear down the container/pod for `req` without touching the
    /// metadata store. Used by workflows that defer cleanup but never
    /// persist sync state (`ExecuteClearWorkflow`'s deferred activity).
    pub async fn cleanup(&self, req: &ExecutionRequest) -> Result<(), ExecutionError> {
        self.supervisor.cleanup(req).await
    }

    /// The post-sync path: tear down the container/pod, read back the
    /// connector's persisted state, and write it to the metadata store.
    pub async fn cleanup_and_persist_state(&self, req: &ExecutionRequest) -> Result<(), ExecutionError> {
        self.cleanup(req).await?;

        let (_subdir, workdir) = workspace_paths(&self.config.workspace_base, req.command, &req.workflow_id);
        let state_path = workdir.join("state.json");
        let state = tokio::fs::read_to_string(&state_path)
            .await
            .map_err(|e| ExecutionError::Configuration(format!("failed to read {}: {e}", state_path.display())))?;

        self.repo.update_job_state(req.job_id, &state, true).await?;
        Ok(())
    }
}

/// The `.launched` marker: the connector's `logs/` subdirectory.
fn launched(workdir: &Path) -> bool {
    workdir.join("logs").is_dir()
}
