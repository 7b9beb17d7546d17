// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The request/response pair that crosses the boundary between the
//! activity layer and the executor facade.

use crate::command::Command;
use crate::job_config::JobConfig;
use std::sync::Arc;

/// Opaque heartbeat callback supplied by the scheduler. Invoked on every
/// poll tick of a supervisor's wait loop; the worker does not interpret
/// its return value or side effects.
pub type HeartbeatFn = Arc<dyn Fn() + Send + Sync>;

/// Everything the executor facade and a supervisor need to turn a
/// scheduled activity into a container/pod execution.
#[derive(Clone)]
pub struct ExecutionRequest {
    pub command: Command,
    pub connector_type: String,
    pub version: String,
    pub args: Vec<String>,
    pub configs: Vec<JobConfig>,
    /// Unique per scheduled attempt; the sole input to deterministic naming.
    pub workflow_id: String,
    pub job_id: i64,
    pub project_id: i64,
    pub timeout: std::time::Duration,
    pub output_file: Option<String>,
    pub options: Option<serde_json::Value>,
    pub heartbeat_fn: Option<HeartbeatFn>,
}

impl ExecutionRequest {
    pub fn builder(command: Command, workflow_id: impl Into<String>) -> ExecutionRequestBuilder {
        ExecutionRequestBuilder {
            command,
            connector_type: String::new(),
            version: String::new(),
            args: Vec::new(),
            configs: Vec::new(),
            workflow_id: workflow_id.into(),
            job_id: 0,
            project_id: 0,
            timeout: std::time::Duration::from_secs(30 * 60),
            output_file: None,
            options: None,
            heartbeat_fn: None,
        }
    }

    /// Invoke the heartbeat callback, if one was supplied.
    pub fn heartbeat(&self) {
        if let Some(f) = &self.heartbeat_fn {
            f();
        }
    }
}

pub struct ExecutionRequestBuilder {
    command: Command,
    connector_type: String,
    version: String,
    args: Vec<String>,
    configs: Vec<JobConfig>,
    workflow_id: String,
    job_id: i64,
    project_id: i64,
    timeout: std::time::Duration,
    output_file: Option<String>,
    options: Option<serde_json::Value>,
    heartbeat_fn: Option<HeartbeatFn>,
}

impl ExecutionRequestBuilder {
    crate::setters! {
        into {
            connector_type: String,
            version: String,
        }
        set {
            args: Vec<String>,
            configs: Vec<JobConfig>,
            job_id: i64,
            project_id: i64,
            timeout: std::time::Duration,
        }
        option {
            output_file: String,
            options: serde_json::Value,
        }
    }

    pub fn heartbeat_fn(mut self, f: HeartbeatFn) -> Self {
        self.heartbeat_fn = Some(f);
        self
    }

    pub fn build(self) -> ExecutionRequest {
        ExecutionRequest {
            command: self.command,
            connector_type: self.connector_type,
            version: self.version,
            args: self.args,
            configs: self.configs,
            workflow_id: self.workflow_id,
            job_id: self.job_id,
            project_id: self.project_id,
            timeout: self.timeout,
            output_file: self.output_file,
            options: self.options,
            heartbeat_fn: self.heartbeat_fn,
        }
    }
}

/// Output of an executor invocation: either raw stdout, a path (relative
/// to the workspace) to a named output file, or a path to a normalized
/// JSON extract.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExecutorResponse {
    pub response: String,
}

impl ExecutorResponse {
    pub fn new(response: impl Into<String>) -> Self {
        Self { response: response.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_timeout_to_thirty_minutes() {
        let req = ExecutionRequest::builder(Command::Discover, "wf-1").build();
        assert_eq!(req.timeout, std::time::Duration::from_secs(30 * 60));
    }

    #[test]
    fn heartbeat_is_a_noop_when_unset() {
        let req = ExecutionRequest::builder(Command::Sync, "wf-1").build();
        req.heartbeat(); // must not panic
    }

    #[test]
    fn heartbeat_invokes_supplied_callback() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let counter = Arc::new(AtomicUsize::new(0));
        let counter2 = counter.clone();
        let req = ExecutionRequest::builder(Command::Sync, "wf-1")
            .heartbeat_fn(Arc::new(move || {
                counter2.fetch_add(1, Ordering::SeqCst);
            }))
            .build();
        req.heartbeat();
        req.heartbeat();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
