// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment-variable-driven worker configuration (§6), collected once
//! at bootstrap into a single struct rather than scattered `env::var`
//! calls throughout the adapters, since this is a long-running service.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use worker_core::Command;

/// `docker` or `kubernetes`, selected once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnvironment {
    Docker,
    Kubernetes,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for environment variable {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Every setting the worker reads from its environment (§6 "Configuration
/// (enumerated)"). Loaded once at process start; nothing reads
/// `std::env::var` after [`WorkerConfig::load`] returns.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub scheduler_address: String,
    pub task_queue: String,

    pub database_url: String,
    pub run_mode: String,

    pub runtime_environment: RuntimeEnvironment,
    pub image_prefix: String,

    /// Workspace root as seen by this process.
    pub workspace_dir: PathBuf,
    /// Workspace root as seen by the Docker daemon, when the worker itself
    /// runs inside a container and the two disagree.
    pub workspace_host_dir: Option<String>,

    pub namespace: String,
    pub pvc_name: String,
    pub service_account: Option<String>,
    pub secret_key: String,
    pub worker_identity: String,

    pub log_retention_days: u32,
    pub callback_url: Option<String>,

    pub health_port: u16,

    /// Per-command overrides of the default activity timeouts in
    /// `worker_activities::scheduler::default_timeout`.
    pub timeout_overrides: HashMap<Command, Duration>,
}

impl WorkerConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let runtime_environment = match env_opt("OLAKE_RUNTIME_ENVIRONMENT").as_deref() {
            Some("kubernetes") => RuntimeEnvironment::Kubernetes,
            Some("docker") | None => RuntimeEnvironment::Docker,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "OLAKE_RUNTIME_ENVIRONMENT",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            scheduler_address: require("OLAKE_SCHEDULER_ADDRESS")?,
            task_queue: env_or("OLAKE_TASK_QUEUE", "olake-worker"),

            database_url: require("OLAKE_DATABASE_URL")?,
            run_mode: env_or("OLAKE_RUN_MODE", "prod"),

            runtime_environment,
            image_prefix: require("OLAKE_IMAGE_PREFIX")?,

            workspace_dir: PathBuf::from(env_or("OLAKE_WORKSPACE_DIR", "/tmp/olake-worker")),
            workspace_host_dir: env_opt("OLAKE_WORKSPACE_HOST_DIR"),

            namespace: env_or("OLAKE_NAMESPACE", "default"),
            pvc_name: env_or("OLAKE_PVC_NAME", "olake-worker-workspace"),
            service_account: env_opt("OLAKE_SERVICE_ACCOUNT"),
            secret_key: require("OLAKE_SECRET_KEY")?,
            worker_identity: env_or("OLAKE_POD_NAME", "olake-worker"),

            log_retention_days: parse_or("OLAKE_LOG_RETENTION_DAYS", 30)?,
            callback_url: env_opt("OLAKE_CALLBACK_URL"),

            health_port: parse_or("OLAKE_HEALTH_PORT", 8090)?,

            timeout_overrides: timeout_overrides()?,
        })
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_or(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    env_opt(name).ok_or(ConfigError::Missing(name))
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env_opt(name) {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid { name, value: v }),
    }
}

fn timeout_overrides() -> Result<HashMap<Command, Duration>, ConfigError> {
    let pairs: &[(&'static str, Command)] = &[
        ("OLAKE_TIMEOUT_DISCOVER_SECS", Command::Discover),
        ("OLAKE_TIMEOUT_CHECK_SECS", Command::Check),
        ("OLAKE_TIMEOUT_SYNC_SECS", Command::Sync),
        ("OLAKE_TIMEOUT_SPEC_SECS", Command::Spec),
        ("OLAKE_TIMEOUT_CLEAR_DESTINATION_SECS", Command::ClearDestination),
    ];
    let mut overrides = HashMap::new();
    for (name, command) in pairs {
        if let Some(v) = env_opt(name) {
            let secs: u64 = v.parse().map_err(|_| ConfigError::Invalid { name, value: v.clone() })?;
            overrides.insert(*command, Duration::from_secs(secs));
        }
    }
    Ok(overrides)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
