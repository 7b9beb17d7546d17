// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the execution supervisor.
//!
//! Cancellation always takes precedence over other errors. ExecutionFailed
//! is the sentinel the activity layer unwraps to decide retry
//! classification (non-retryable); InfrastructureTransient is retried by
//! the caller (either silently inside a poll loop, or by letting the
//! activity fail so the scheduler retries it, possibly on another worker).

use thiserror::Error;

/// The error taxonomy a supervisor or the executor facade can surface.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Activity context was cancelled. Always takes precedence over any
    /// other error observed concurrently.
    #[error("execution cancelled")]
    Cancelled,

    /// The connector exited non-zero, or the pod reached `Failed` with a
    /// non-retryable reason. Non-retryable at the activity layer.
    #[error("connector execution failed (exit_code={exit_code:?}): {log_tail}")]
    ExecutionFailed { exit_code: Option<i32>, log_tail: String },

    /// Image pull back-off, pull timeout, API-server blip. Retryable.
    #[error("infrastructure transient error: {0}")]
    InfrastructureTransient(String),

    /// Unparseable image reference, missing required env var, malformed
    /// placement JSON. Fatal at process start or non-retryable at activity
    /// start.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Repository read/write failure. Non-retryable for sync.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Local runtime (docker CLI) invocation failure not otherwise
    /// classified above.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl ExecutionError {
    /// True for the sentinel that the activity layer wraps as a
    /// non-retryable application error.
    pub fn is_execution_failed(&self) -> bool {
        matches!(self, ExecutionError::ExecutionFailed { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecutionError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_failed_is_classified_correctly() {
        let err = ExecutionError::ExecutionFailed { exit_code: Some(1), log_tail: "boom".into() };
        assert!(err.is_execution_failed());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn cancelled_is_classified_correctly() {
        assert!(ExecutionError::Cancelled.is_cancelled());
    }
}
