// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The external schedule-management surface `PostClearActivity` depends
//! on (§4.7). Out of scope per §1: the workflow engine's schedule
//! bookkeeping itself — we only describe the two calls the activity makes.

use async_trait::async_trait;
use worker_core::ExecutionError;

/// The subset of an external schedule's description the activity needs
/// to verify its own update took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleDescription {
    pub paused: bool,
}

/// Revert and unpause the schedule a `clear-destination` run belongs to.
///
/// Without this, a successful clear leaves the schedule stuck (§4.7).
#[async_trait]
pub trait ScheduleClient: Send + Sync {
    /// Revert the schedule's metadata to sync mode and unpause it.
    async fn resume_as_sync(&self, job_id: i64) -> Result<(), ExecutionError>;

    /// Read back the schedule's current description, to verify the
    /// update above actually took effect.
    async fn describe(&self, job_id: i64) -> Result<ScheduleDescription, ExecutionError>;
}
