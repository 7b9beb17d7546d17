// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity Layer (§4.7): the four activity functions bound to the
//! external scheduler. Each wires the heartbeat callback, classifies
//! errors for retry, and emits telemetry at the boundaries the spec
//! names.

use std::sync::Arc;

use worker_core::{ArgsContext, Command, ExecutionError, ExecutorResponse, JobConfig};
use worker_engine::Executor;
use worker_storage::Repository;

use crate::legacy::overlay_configs;
use crate::scheduler::{CancellationToken, HeartbeatSink};
use crate::telemetry::{TelemetryEvent, TelemetrySink};
use crate::ActivityError;

/// `ExecuteActivity` (§4.7): `discover`, `check`, `spec`,
/// `clear-destination`.
pub struct ExecuteActivity {
    executor: Arc<Executor>,
    repo: Arc<dyn Repository>,
}

impl ExecuteActivity {
    pub fn new(executor: Arc<Executor>, repo: Arc<dyn Repository>) -> Self {
        Self { executor, repo }
    }

    pub async fn run(
        &self,
        mut req: worker_core::ExecutionRequest,
        heartbeat: Arc<dyn HeartbeatSink>,
        cancel: &CancellationToken,
    ) -> Result<ExecutorResponse, ActivityError> {
        req.heartbeat_fn = Some(Arc::new(move || heartbeat.heartbeat()));

        if req.command == Command::ClearDestination {
            let job_data = self.repo.fetch_job_data(req.job_id).await.map_err(ActivityError::non_retryable)?;
            overlay_configs(&mut req.configs, job_configs_from(&job_data));
        } else if req.command == Command::Discover {
            let job_data = self.repo.fetch_job_data(req.job_id).await.map_err(ActivityError::non_retryable)?;
            self.build_discover_args(&mut req, Some(&job_data.job_name));
        } else if matches!(req.command, Command::Check | Command::Spec) {
            self.build_simple_args(&mut req);
        }

        self.executor.execute(&req, cancel).await.map_err(classify)
    }

    /// Build `discover`'s argv (§6): `--catalog` when a streams config is
    /// mounted, `--destination-database-prefix <job_name>` when the
    /// connector version is `>= v0.2.0`.
    fn build_discover_args(&self, req: &mut worker_core::ExecutionRequest, job_name: Option<&str>) {
        let encryption_key = option_str(&req.options, "encryption_key");
        let has_catalog = req.configs.iter().any(|c| c.stem() == "streams");
        let ctx = ArgsContext { destination_type: None, encryption_key: encryption_key.as_deref(), job_name, has_catalog };
        req.args = worker_core::build_args(req.command, &req.version, &ctx);
    }

    /// Build `check`/`spec`'s argv (§6).
    fn build_simple_args(&self, req: &mut worker_core::ExecutionRequest) {
        let encryption_key = option_str(&req.options, "encryption_key");
        let destination_type = option_str(&req.options, "destination_type");
        let ctx = ArgsContext {
            destination_type: destination_type.as_deref(),
            encryption_key: encryption_key.as_deref(),
            job_name: None,
            has_catalog: false,
        };
        req.args = worker_core::build_args(req.command, &req.version, &ctx);
    }
}

/// Pull a string field out of the request's free-form `options` bag.
fn option_str(options: &Option<serde_json::Value>, key: &str) -> Option<String> {
    options.as_ref()?.get(key)?.as_str().map(str::to_string)
}

/// `SyncActivity` (§4.7): `sync`.
pub struct SyncActivity {
    executor: Arc<Executor>,
    repo: Arc<dyn Repository>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl SyncActivity {
    pub fn new(executor: Arc<Executor>, repo: Arc<dyn Repository>, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self { executor, repo, telemetry }
    }

    pub async fn run(
        &self,
        mut req: worker_core::ExecutionRequest,
        heartbeat: Arc<dyn HeartbeatSink>,
        cancel: &CancellationToken,
    ) -> Result<ExecutorResponse, ActivityError> {
        heartbeat.heartbeat();
        req.heartbeat_fn = Some(Arc::new({
            let heartbeat = heartbeat.clone();
            move || heartbeat.heartbeat()
        }));

        let job_data = self.repo.fetch_job_data(req.job_id).await.map_err(ActivityError::non_retryable)?;

        if req.connector_type.is_empty() {
            req.connector_type = job_data.source_driver.clone();
            req.version = job_data.source_version.clone();
        }
        overlay_configs(&mut req.configs, job_configs_from(&job_data));

        self.telemetry.emit(TelemetryEvent::Started, &req);

        match self.executor.execute(&req, cancel).await {
            Ok(resp) => Ok(resp),
            Err(ExecutionError::Cancelled) => Err(ActivityError::cancelled()),
            Err(e @ ExecutionError::ExecutionFailed { .. }) => {
                self.telemetry.emit(TelemetryEvent::Failed, &req);
                Err(ActivityError::non_retryable(e))
            }
            Err(e) => {
                self.telemetry.emit(TelemetryEvent::Failed, &req);
                Err(ActivityError::non_retryable(e))
            }
        }
    }
}

/// `PostSyncActivity` (§4.7): cleanup + state persistence, the deferred
/// activity `RunSyncWorkflow` registers.
pub struct PostSyncActivity {
    executor: Arc<Executor>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl PostSyncActivity {
    pub fn new(executor: Arc<Executor>, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self { executor, telemetry }
    }

    pub async fn run(&self, req: &worker_core::ExecutionRequest) -> Result<(), ActivityError> {
        self.executor.cleanup_and_persist_state(req).await.map_err(ActivityError::non_retryable)?;
        self.telemetry.emit(TelemetryEvent::Completed, req);
        Ok(())
    }
}

/// `PostClearActivity` (§4.7): after `clear-destination`, stop the
/// container/pod and revert+unpause the external schedule. Without the
/// schedule update, a successful clear leaves it stuck.
pub struct PostClearActivity {
    executor: Arc<Executor>,
    schedule: Arc<dyn crate::schedule_client::ScheduleClient>,
}

impl PostClearActivity {
    pub fn new(executor: Arc<Executor>, schedule: Arc<dyn crate::schedule_client::ScheduleClient>) -> Self {
        Self { executor, schedule }
    }

    pub async fn run(&self, req: &worker_core::ExecutionRequest) -> Result<(), ActivityError> {
        self.executor.cleanup(req).await.map_err(ActivityError::non_retryable)?;

        self.schedule.resume_as_sync(req.job_id).await.map_err(ActivityError::non_retryable)?;

        let description = self.schedule.describe(req.job_id).await.map_err(ActivityError::non_retryable)?;
        if description.paused {
            return Err(ActivityError::non_retryable(ExecutionError::Configuration(
                "schedule still paused after clear-destination PostClear update".to_string(),
            )));
        }
        Ok(())
    }
}

/// Classify a facade error into the activity-layer retry decision.
/// `Cancelled` always takes precedence and maps to activity cancellation,
/// never an error. Everything else — including `ExecutionFailed` — is
/// wrapped non-retryable (§7 propagation policy).
fn classify(err: ExecutionError) -> ActivityError {
    match err {
        ExecutionError::Cancelled => ActivityError::cancelled(),
        other => ActivityError::non_retryable(other),
    }
}

/// Repository-sourced configs overlaid into a request by filename stem
/// (§4.7): source, destination, and streams configs from `JobData`.
fn job_configs_from(job_data: &worker_core::JobData) -> Vec<JobConfig> {
    vec![
        JobConfig::new("config.json", job_data.source_config.clone()),
        JobConfig::new("writer.json", job_data.destination_config.clone()),
        JobConfig::new("streams.json", job_data.streams_config.clone()),
    ]
}
