// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic container/pod/workspace naming from `workflow_id`.
//!
//! Names must be resumable across worker processes: the same `workflow_id`
//! always maps to the same container/pod name and the same workspace
//! subdirectory, so a retried activity on a different worker adopts
//! existing work instead of duplicating it.

use crate::command::Command;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Maximum length of a sanitized name (Kubernetes object name limit).
pub const MAX_NAME_LEN: usize = 63;

/// Hex-encode the SHA-256 digest of `workflow_id`.
///
/// This is the primary durable key: at most one container/pod exists per
/// `workflow_id` at any point in time, and every supervisor operation is
/// keyed off this hash rather than off any mutable scheduler-assigned name.
pub fn workflow_hash(workflow_id: &str) -> String {
    format!("{:x}", Sha256::digest(workflow_id.as_bytes()))
}

/// Sanitize `name` into a legal Kubernetes/Docker resource name:
/// lowercased, non-alphanumeric runs collapsed to a single hyphen,
/// leading/trailing hyphens trimmed, truncated to [`MAX_NAME_LEN`] with a
/// trailing hyphen removed if truncation produces one.
///
/// Idempotent: `sanitize(sanitize(s)) == sanitize(s)`.
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_hyphen = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            out.push('-');
            last_was_hyphen = true;
        }
    }
    let trimmed = out.trim_matches('-');
    let mut truncated: String = trimmed.chars().take(MAX_NAME_LEN).collect();
    if truncated.ends_with('-') {
        truncated.pop();
    }
    truncated
}

/// The container/pod name derived from a `workflow_id`: the sanitized
/// hex SHA-256 hash, which is already alphanumeric and therefore passes
/// through `sanitize` as a no-op except for length truncation (a 64-char
/// hex digest exceeds 63 and loses its last character).
pub fn container_name(workflow_id: &str) -> String {
    sanitize(&workflow_hash(workflow_id))
}

/// Compute `(subdir, workdir)` for a `(command, workflow_id)` pair.
///
/// For `sync`, the subdirectory is `sha256(workflow_id)` hex (to reconcile
/// with the container's mount point, which is keyed the same way). For all
/// other commands it is `workflow_id` verbatim — sanitization is scoped to
/// container/pod naming (see [`container_name`]), not the workspace
/// directory, so two distinct workflow ids that happen to sanitize
/// identically still get distinct workspaces.
pub fn workspace_paths(base: &Path, command: Command, workflow_id: &str) -> (String, PathBuf) {
    let subdir = if command == Command::Sync {
        workflow_hash(workflow_id)
    } else {
        workflow_id.to_string()
    };
    let workdir = base.join(&subdir);
    (subdir, workdir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_lowercases_and_collapses_hyphens() {
        assert_eq!(sanitize("Hello__World..v1"), "hello-world-v1");
    }

    #[test]
    fn sanitize_trims_leading_and_trailing_hyphens() {
        assert_eq!(sanitize("--foo--"), "foo");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = sanitize("Some Weird:Name::2024");
        let twice = sanitize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn sanitize_truncates_to_63_without_trailing_hyphen() {
        let long = "a".repeat(70) + "-b";
        let result = sanitize(&long);
        assert!(result.len() <= MAX_NAME_LEN);
        assert!(!result.ends_with('-'));
    }

    #[test]
    fn sanitize_never_starts_or_ends_with_hyphen_after_truncation() {
        // 62 a's followed by a hyphen-introducing character, so truncation
        // at 63 lands exactly on the hyphen.
        let input = format!("{}_x", "a".repeat(62));
        let result = sanitize(&input);
        assert!(!result.starts_with('-'));
        assert!(!result.ends_with('-'));
    }

    #[test]
    fn container_name_is_deterministic_for_same_workflow_id() {
        assert_eq!(container_name("wf-123"), container_name("wf-123"));
        assert_ne!(container_name("wf-123"), container_name("wf-124"));
    }

    #[test]
    fn sync_workspace_uses_hash_subdir_others_use_workflow_id_verbatim() {
        let base = PathBuf::from("/base");
        let (subdir, workdir) = workspace_paths(&base, Command::Sync, "wf-42");
        assert_eq!(subdir, workflow_hash("wf-42"));
        assert_eq!(workdir, base.join(&subdir));

        let (subdir, workdir) = workspace_paths(&base, Command::Discover, "wf-42");
        assert_eq!(subdir, "wf-42");
        assert_eq!(workdir, base.join("wf-42"));
    }

    #[test]
    fn non_sync_workspaces_do_not_collide_on_ids_that_sanitize_identically() {
        let base = PathBuf::from("/base");
        let (a, _) = workspace_paths(&base, Command::Discover, "Job#1");
        let (b, _) = workspace_paths(&base, Command::Discover, "Job!1");
        assert_eq!(sanitize("Job#1"), sanitize("Job!1"));
        assert_ne!(a, b);
    }
}
