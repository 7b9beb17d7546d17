// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Row types returned by the repository queries, prior to being folded
//! into `worker_core::JobData`.

use sqlx::FromRow;

/// Result of the job/source/destination join. Maps directly onto
/// `worker_core::JobData` field-for-field except `job_name`, which is
/// fetched separately by callers that already have it cached — the join
/// itself only needs the columns named in the query.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub job_name: String,
    pub project_id: i64,
    pub streams_config: String,
    pub state: String,
    pub source_config: String,
    pub destination_config: String,
    pub source_version: String,
    pub source_driver: String,
}

impl JobRow {
    /// Fold into the domain-level `JobData` the rest of the worker works with.
    pub fn into_job_data(self) -> worker_core::JobData {
        worker_core::JobData {
            job_name: self.job_name,
            project_id: self.project_id,
            source_config: self.source_config,
            destination_config: self.destination_config,
            streams_config: self.streams_config,
            state: self.state,
            source_version: self.source_version,
            source_driver: self.source_driver,
        }
    }
}

/// `project-settings` row: the webhook URL used for alerting, read by the
/// telemetry layer (out of scope for this crate beyond the read itself).
#[derive(Debug, Clone, FromRow)]
pub struct ProjectSettings {
    pub id: i64,
    pub project_id: i64,
    pub webhook_alert_url: Option<String>,
}
