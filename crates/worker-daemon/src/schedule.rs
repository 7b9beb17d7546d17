// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Placeholder [`ScheduleClient`]. The concrete implementation talks to
//! the external workflow-engine SDK, which is out of scope for this
//! worker (§1) — a real binding plugs in here once that SDK is chosen.

use async_trait::async_trait;
use worker_activities::{ScheduleClient, ScheduleDescription};
use worker_core::ExecutionError;

/// Reports every schedule as already resumed and unpaused, so
/// `PostClearActivity` never loops on an unconfigured scheduler in a
/// development environment. Replace with a real SDK binding before
/// running `clear-destination` against production schedules.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredScheduleClient;

#[async_trait]
impl ScheduleClient for UnconfiguredScheduleClient {
    async fn resume_as_sync(&self, _job_id: i64) -> Result<(), ExecutionError> {
        tracing::warn!("resume_as_sync called against UnconfiguredScheduleClient — no-op");
        Ok(())
    }

    async fn describe(&self, _job_id: i64) -> Result<ScheduleDescription, ExecutionError> {
        Ok(ScheduleDescription { paused: false })
    }
}
