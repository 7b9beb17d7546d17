// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Legacy vs. modern request shapes (§4.7, §4.8, §9 design notes).
//!
//! `RunSyncWorkflow` may be invoked with a bare job ID (deprecated) or a
//! structured `ExecutionRequest`. We model the input as a tagged variant
//! and normalize to the modern shape at the workflow boundary, the same
//! way the teacher keeps parsing at the edge and works with plain domain
//! types everywhere past it.

use std::time::Duration;
use worker_core::{Command, ExecutionRequest, JobConfig, JobData};

/// A `RunSyncWorkflow` input: either the deprecated bare job ID, or a
/// fully structured request.
#[derive(Debug, Clone)]
pub enum SyncWorkflowInput {
    /// Deprecated form: only the job ID is known; everything else is
    /// filled in from the repository at normalization time.
    LegacyJobId(i64),
    Modern(Box<ExecutionRequest>),
}

impl SyncWorkflowInput {
    /// Normalize to a modern `ExecutionRequest`. For the legacy form,
    /// `job_data` must already have been read from the repository
    /// (`source_driver`/`source_version` populate `connector_type`/
    /// `version`; canonical sync args are filled in per §6).
    pub fn normalize(self, job_data: &JobData, workflow_id: impl Into<String>, timeout: Duration) -> ExecutionRequest {
        match self {
            SyncWorkflowInput::Modern(req) => *req,
            SyncWorkflowInput::LegacyJobId(job_id) => {
                canonical_sync_request(job_id, job_data, workflow_id, timeout)
            }
        }
    }
}

/// Build the canonical `sync --config … --catalog … --destination …
/// --state …` request (§6) from repository-sourced job data.
pub fn canonical_sync_request(
    job_id: i64,
    job_data: &JobData,
    workflow_id: impl Into<String>,
    timeout: Duration,
) -> ExecutionRequest {
    let args = vec![
        "sync".to_string(),
        "--config".to_string(),
        "/mnt/config/config.json".to_string(),
        "--catalog".to_string(),
        "/mnt/config/streams.json".to_string(),
        "--destination".to_string(),
        "/mnt/config/writer.json".to_string(),
        "--state".to_string(),
        "/mnt/config/state.json".to_string(),
    ];

    ExecutionRequest::builder(Command::Sync, workflow_id)
        .connector_type(job_data.source_driver.clone())
        .version(job_data.source_version.clone())
        .args(args)
        .job_id(job_id)
        .project_id(job_data.project_id)
        .timeout(timeout)
        .configs(vec![
            JobConfig::new("config.json", job_data.source_config.clone()),
            JobConfig::new("writer.json", job_data.destination_config.clone()),
            JobConfig::new("streams.json", job_data.streams_config.clone()),
            JobConfig::new("state.json", job_data.normalized_state()),
        ])
        .build()
}

/// Overlay repository-sourced configs onto `req.configs` by matching
/// filename stem (`config` ↔ `config.json`), replacing any existing entry
/// with the same stem rather than duplicating it (§4.7).
pub fn overlay_configs(existing: &mut Vec<JobConfig>, overlay: Vec<JobConfig>) {
    for new_config in overlay {
        if let Some(slot) = existing.iter_mut().find(|c| c.stem() == new_config.stem()) {
            *slot = new_config;
        } else {
            existing.push(new_config);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_data() -> JobData {
        JobData {
            job_name: "acme-job".to_string(),
            project_id: 7,
            source_config: r#"{"host":"db"}"#.to_string(),
            destination_config: r#"{"bucket":"out"}"#.to_string(),
            streams_config: r#"{"streams":[]}"#.to_string(),
            state: "".to_string(),
            source_version: "v0.3.0".to_string(),
            source_driver: "postgres".to_string(),
        }
    }

    #[test]
    fn legacy_job_id_is_expanded_to_canonical_sync_request() {
        let input = SyncWorkflowInput::LegacyJobId(42);
        let req = input.normalize(&job_data(), "wf-legacy-1", Duration::from_secs(60));
        assert_eq!(req.command, Command::Sync);
        assert_eq!(req.connector_type, "postgres");
        assert_eq!(req.version, "v0.3.0");
        assert_eq!(req.job_id, 42);
        assert!(req.args.contains(&"--catalog".to_string()));
        assert_eq!(req.configs.len(), 4);
    }

    #[test]
    fn legacy_expansion_normalizes_empty_state_to_empty_object() {
        let req = SyncWorkflowInput::LegacyJobId(1).normalize(&job_data(), "wf-legacy-2", Duration::from_secs(60));
        let state_config = req.configs.iter().find(|c| c.name == "state.json").unwrap();
        assert_eq!(state_config.data, b"{}");
    }

    #[test]
    fn modern_request_passes_through_unchanged() {
        let original = ExecutionRequest::builder(Command::Sync, "wf-modern").job_id(9).build();
        let input = SyncWorkflowInput::Modern(Box::new(original.clone()));
        let normalized = input.normalize(&job_data(), "ignored", Duration::from_secs(1));
        assert_eq!(normalized.workflow_id, original.workflow_id);
        assert_eq!(normalized.job_id, 9);
    }

    #[test]
    fn overlay_replaces_existing_config_with_same_stem() {
        let mut existing = vec![JobConfig::new("config.json", "old")];
        overlay_configs(&mut existing, vec![JobConfig::new("config.json", "new")]);
        assert_eq!(existing.len(), 1);
        assert_eq!(existing[0].data, b"new");
    }

    #[test]
    fn overlay_appends_configs_with_new_stems() {
        let mut existing = vec![JobConfig::new("config.json", "c")];
        overlay_configs(&mut existing, vec![JobConfig::new("streams.json", "s")]);
        assert_eq!(existing.len(), 2);
    }
}
