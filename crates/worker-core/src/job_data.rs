// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repository view of a scheduled job, as read from the relational
//! metadata store at sync start and rewritten on PostSync.

use serde::{Deserialize, Serialize};

/// `{ job_name, project_id, source_config, destination_config,
/// streams_config, state, source_version, source_driver }` joined from
/// `job`, `source`, and `destination` tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobData {
    pub job_name: String,
    pub project_id: i64,
    pub source_config: String,
    pub destination_config: String,
    pub streams_config: String,
    pub state: String,
    pub source_version: String,
    pub source_driver: String,
}

impl JobData {
    /// Normalize `state`: `""`, `"null"`, and `"NULL"` all mean "no prior
    /// state", and are rewritten to an empty JSON object before the sync
    /// container starts.
    pub fn normalized_state(&self) -> String {
        normalize_state(&self.state)
    }
}

/// `state == ""` / `"null"` / `"NULL"` is rewritten to `"{}"`.
///
/// Defensive against an upstream that sometimes writes the string `"null"`
/// into the database instead of an empty JSON object (see DESIGN.md open
/// question).
pub fn normalize_state(state: &str) -> String {
    match state {
        "" | "null" | "NULL" => "{}".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_state_normalizes_to_empty_object() {
        assert_eq!(normalize_state(""), "{}");
    }

    #[test]
    fn lowercase_null_normalizes_to_empty_object() {
        assert_eq!(normalize_state("null"), "{}");
    }

    #[test]
    fn uppercase_null_normalizes_to_empty_object() {
        assert_eq!(normalize_state("NULL"), "{}");
    }

    #[test]
    fn real_state_passes_through_unchanged() {
        assert_eq!(normalize_state(r#"{"cursor":"x"}"#), r#"{"cursor":"x"}"#);
    }
}
