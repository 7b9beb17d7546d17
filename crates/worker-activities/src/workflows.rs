// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow Definitions (§4.8): deterministic orchestrations dispatched
//! to activities. They never perform I/O directly — everything below
//! calls into an [`ExecuteActivity`]/[`SyncActivity`]/[`PostSyncActivity`]/
//! [`PostClearActivity`], never a supervisor or repository directly.
//!
//! No direct teacher analogue (oddjobs has no external workflow engine —
//! its "workflow" is the in-process runtime state machine in
//! `engine::runtime`). Grounded instead in `everruns-worker`'s
//! `temporal::workflows`/`temporal::types`: plain-data input/output
//! structs passed to activity functions, retry-policy structs as plain
//! data, deferred cleanup modeled as a `finally`-style helper that always
//! runs.

use std::sync::Arc;
use std::time::Duration;

use worker_core::{Command, ExecutionError, ExecutorResponse};

use crate::activities::{ExecuteActivity, PostClearActivity, PostSyncActivity, SyncActivity};
use crate::legacy::SyncWorkflowInput;
use crate::scheduler::{run_disconnected, CancellationToken, HeartbeatSink, RetryPolicy, TimeoutPolicy};
use crate::ActivityError;

/// Outcome of a workflow that defers a cleanup activity on exit
/// (`RunSyncWorkflow`, `ExecuteClearWorkflow`). If both the primary
/// activity and the deferred cleanup fail, both errors are folded into
/// one (§4.8).
#[derive(Debug)]
pub struct WorkflowOutcome<T> {
    pub result: Result<T, ActivityError>,
    pub deferred_error: Option<ActivityError>,
}

impl<T> WorkflowOutcome<T> {
    /// Fold the primary result and the deferred cleanup error into a
    /// single `Result`, combining messages if both failed.
    pub fn into_result(self) -> Result<T, ActivityError> {
        match (self.result, self.deferred_error) {
            (Ok(v), None) => Ok(v),
            (Ok(_), Some(deferred)) => Err(deferred),
            (Err(primary), None) => Err(primary),
            (Err(primary), Some(deferred)) => Err(primary.fold_with(deferred)),
        }
    }
}

/// `ExecuteWorkflow` (§4.8): single activity call, `StartToCloseTimeout =
/// req.timeout`, default retry policy (one attempt).
pub struct ExecuteWorkflow {
    activity: Arc<ExecuteActivity>,
}

impl ExecuteWorkflow {
    pub fn new(activity: Arc<ExecuteActivity>) -> Self {
        Self { activity }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default_single_attempt()
    }

    pub fn timeout_policy(&self, req: &worker_core::ExecutionRequest) -> TimeoutPolicy {
        TimeoutPolicy { start_to_close: req.timeout, heartbeat_timeout: None }
    }

    pub async fn run(
        &self,
        req: worker_core::ExecutionRequest,
        heartbeat: Arc<dyn HeartbeatSink>,
        cancel: &CancellationToken,
    ) -> Result<ExecutorResponse, ActivityError> {
        self.activity.run(req, heartbeat, cancel).await
    }
}

/// `RunSyncWorkflow` (§4.8): long-running, infinite-retry, cancellable,
/// with a deferred `PostSyncActivity` that runs on both normal completion
/// and cancellation via a fresh disconnected context.
pub struct RunSyncWorkflow {
    sync_activity: Arc<SyncActivity>,
    post_sync: Arc<PostSyncActivity>,
}

impl RunSyncWorkflow {
    pub fn new(sync_activity: Arc<SyncActivity>, post_sync: Arc<PostSyncActivity>) -> Self {
        Self { sync_activity, post_sync }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::infinite()
    }

    pub fn timeout_policy(&self, req: &worker_core::ExecutionRequest) -> TimeoutPolicy {
        TimeoutPolicy { start_to_close: req.timeout, heartbeat_timeout: Some(Duration::from_secs(60)) }
    }

    /// `workflow_execution_id` becomes `req.workflow_id` (§4.8: "sets
    /// `req.workflow_id` to the workflow execution ID"), overriding
    /// whatever the legacy/modern input carried.
    pub async fn run(
        &self,
        input: SyncWorkflowInput,
        workflow_execution_id: String,
        job_data_for_legacy: Option<&worker_core::JobData>,
        heartbeat: Arc<dyn HeartbeatSink>,
        cancel: CancellationToken,
    ) -> WorkflowOutcome<ExecutorResponse> {
        let mut req = match (&input, job_data_for_legacy) {
            (SyncWorkflowInput::LegacyJobId(_), Some(job_data)) => {
                input.normalize(job_data, workflow_execution_id.clone(), Duration::from_secs(700 * 60 * 60))
            }
            (SyncWorkflowInput::Modern(inner), _) => (**inner).clone(),
            (SyncWorkflowInput::LegacyJobId(job_id), None) => {
                // No job data supplied yet for the legacy form; the caller
                // is expected to have already read it — this only exists
                // so `run` is total. Surface a configuration error rather
                // than panic.
                return WorkflowOutcome {
                    result: Err(ActivityError::non_retryable(ExecutionError::Configuration(format!(
                        "legacy sync input for job {job_id} requires job data to normalize"
                    )))),
                    deferred_error: None,
                };
            }
        };
        req.workflow_id = workflow_execution_id;

        let result = self.sync_activity.run(req.clone(), heartbeat, &cancel).await;

        // WaitForCancellation = true: the deferred cleanup runs whether
        // the primary activity returned normally or was cancelled.
        let deferred_error = run_disconnected(self.post_sync.run(&req), timeout_error).await.err();

        WorkflowOutcome { result, deferred_error }
    }
}

/// `ExecuteClearWorkflow` (§4.8): like `ExecuteWorkflow`, but defers a
/// cleanup activity on exit, same pattern as `RunSyncWorkflow`.
pub struct ExecuteClearWorkflow {
    execute: Arc<ExecuteActivity>,
    post_clear: Arc<PostClearActivity>,
}

impl ExecuteClearWorkflow {
    pub fn new(execute: Arc<ExecuteActivity>, post_clear: Arc<PostClearActivity>) -> Self {
        Self { execute, post_clear }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default_single_attempt()
    }

    pub async fn run(
        &self,
        req: worker_core::ExecutionRequest,
        heartbeat: Arc<dyn HeartbeatSink>,
        cancel: CancellationToken,
    ) -> WorkflowOutcome<ExecutorResponse> {
        debug_assert_eq!(req.command, Command::ClearDestination);

        let result = self.execute.run(req.clone(), heartbeat, &cancel).await;
        let deferred_error = run_disconnected(self.post_clear.run(&req), timeout_error).await.err();

        WorkflowOutcome { result, deferred_error }
    }
}

/// Builds the `ActivityError` for a deferred cleanup activity that blew
/// past [`crate::scheduler::CLEANUP_TIMEOUT`] in its disconnected context.
fn timeout_error() -> ActivityError {
    ActivityError::non_retryable(ExecutionError::InfrastructureTransient(
        "deferred cleanup activity timed out".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_prefers_primary_error_but_folds_deferred_message() {
        let outcome: WorkflowOutcome<()> = WorkflowOutcome {
            result: Err(ActivityError::non_retryable(ExecutionError::Runtime("primary".to_string()))),
            deferred_error: Some(ActivityError::non_retryable(ExecutionError::Runtime("deferred".to_string()))),
        };
        let err = outcome.into_result().unwrap_err();
        assert!(err.message.contains("primary"));
        assert!(err.message.contains("deferred"));
    }

    #[test]
    fn outcome_surfaces_deferred_error_alone_when_primary_succeeded() {
        let outcome = WorkflowOutcome {
            result: Ok(42),
            deferred_error: Some(ActivityError::non_retryable(ExecutionError::Runtime("cleanup failed".to_string()))),
        };
        let err = outcome.into_result().unwrap_err();
        assert!(err.message.contains("cleanup failed"));
    }

    #[test]
    fn outcome_is_ok_when_nothing_failed() {
        let outcome: WorkflowOutcome<i32> = WorkflowOutcome { result: Ok(7), deferred_error: None };
        assert_eq!(outcome.into_result().unwrap(), 7);
    }
}
