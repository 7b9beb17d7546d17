// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! worker-activities: the Activity Layer and Workflow Definitions (§4.7,
//! §4.8) that bind the executor facade to an external scheduler.
//!
//! The scheduler itself — activity registration, workflow replay, durable
//! timers — is out of scope (§1); [`scheduler`] defines only the narrow
//! surface this crate depends on.

pub mod activities;
pub mod legacy;
pub mod schedule_client;
pub mod scheduler;
pub mod telemetry;
pub mod workflows;

pub use legacy::SyncWorkflowInput;
pub use schedule_client::{ScheduleClient, ScheduleDescription};
pub use telemetry::{TelemetryEvent, TelemetrySink};

use worker_core::ExecutionError;

/// The activity-layer error surface: whether the scheduler should retry
/// this activity (always `false` except for the `Cancelled` marker,
/// which the scheduler treats as a cancellation rather than a retryable
/// failure — see §7 propagation policy).
#[derive(Debug, Clone)]
pub struct ActivityError {
    pub message: String,
    pub retryable: bool,
    cancelled: bool,
}

impl ActivityError {
    pub fn non_retryable(err: ExecutionError) -> Self {
        Self { message: err.to_string(), retryable: false, cancelled: false }
    }

    pub fn cancelled() -> Self {
        Self { message: "execution cancelled".to_string(), retryable: false, cancelled: true }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Fold a deferred-cleanup error into this one, concatenating
    /// messages (§4.8: "the deferred error is folded into the returned
    /// error (both reported if both failed)").
    pub fn fold_with(self, deferred: ActivityError) -> Self {
        Self {
            message: format!("{}; deferred cleanup also failed: {}", self.message, deferred.message),
            retryable: false,
            cancelled: self.cancelled,
        }
    }
}

impl std::fmt::Display for ActivityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ActivityError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_retryable_is_never_retryable() {
        let err = ActivityError::non_retryable(ExecutionError::Runtime("x".to_string()));
        assert!(!err.retryable);
        assert!(!err.is_cancelled());
    }

    #[test]
    fn cancelled_is_marked_distinctly() {
        let err = ActivityError::cancelled();
        assert!(err.is_cancelled());
        assert!(!err.retryable);
    }

    #[test]
    fn fold_concatenates_messages() {
        let primary = ActivityError::non_retryable(ExecutionError::Runtime("a".to_string()));
        let deferred = ActivityError::non_retryable(ExecutionError::Runtime("b".to_string()));
        let folded = primary.fold_with(deferred);
        assert!(folded.message.contains('a'));
        assert!(folded.message.contains('b'));
    }
}
