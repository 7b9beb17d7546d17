// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connector CLI argument construction (§6): the exact positional/flag
//! arguments the worker passes to the connector binary for each command.
//! `sync`'s argv is built separately by
//! `worker_activities::legacy::canonical_sync_request` since it is sourced
//! entirely from repository `JobData` rather than request-level context.

use crate::command::Command;

const MOUNT_PATH: &str = "/mnt/config";

/// The minimum connector version at which `discover` accepts
/// `--destination-database-prefix`.
const CATALOG_PREFIX_FLOOR: (u64, u64, u64) = (0, 2, 0);

/// Per-request knobs beyond `(command, version)` needed to build argv.
/// All optional — an absent value is omitted from argv, never defaulted
/// to a placeholder.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgsContext<'a> {
    pub destination_type: Option<&'a str>,
    pub encryption_key: Option<&'a str>,
    pub job_name: Option<&'a str>,
    pub has_catalog: bool,
}

/// Build the connector argv for `command` at `version` (§6). Returns an
/// empty vec for `sync`/`clear-destination`, whose argv is built
/// elsewhere (repository-sourced canonical sync args, or passed through
/// verbatim for clear-destination).
pub fn build_args(command: Command, version: &str, ctx: &ArgsContext<'_>) -> Vec<String> {
    match command {
        Command::Spec => {
            let mut args = vec!["spec".to_string()];
            if let Some(destination_type) = ctx.destination_type {
                args.push("--destination-type".to_string());
                args.push(destination_type.to_string());
            }
            args
        }
        Command::Check => {
            let mut args =
                vec!["check".to_string(), "--config".to_string(), format!("{MOUNT_PATH}/config.json")];
            push_encryption_key(&mut args, ctx);
            args
        }
        Command::Discover => {
            let mut args =
                vec!["discover".to_string(), "--config".to_string(), format!("{MOUNT_PATH}/config.json")];
            if version_at_least(version, CATALOG_PREFIX_FLOOR) {
                if let Some(job_name) = ctx.job_name {
                    args.push("--destination-database-prefix".to_string());
                    args.push(job_name.to_string());
                }
            }
            if ctx.has_catalog {
                args.push("--catalog".to_string());
                args.push(format!("{MOUNT_PATH}/streams.json"));
            }
            push_encryption_key(&mut args, ctx);
            args
        }
        Command::Sync | Command::ClearDestination => Vec::new(),
    }
}

fn push_encryption_key(args: &mut Vec<String>, ctx: &ArgsContext<'_>) {
    if let Some(key) = ctx.encryption_key {
        args.push("--encryption-key".to_string());
        args.push(key.to_string());
    }
}

/// `true` if `version` parses as semver and is `>= floor`. An unparsable
/// version (including the default `""`) is treated as below every floor
/// rather than erroring — connector versions are free-form strings, not
/// a contract the worker enforces.
fn version_at_least(version: &str, floor: (u64, u64, u64)) -> bool {
    let Ok(parsed) = semver::Version::parse(version.trim_start_matches('v')) else { return false };
    (parsed.major, parsed.minor, parsed.patch) >= floor
}
