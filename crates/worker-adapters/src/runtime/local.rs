// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local-Runtime Supervisor (§4.4): pull/create/start/wait/log/stop
//! containers on a host Docker daemon, with adoption.
//!
//! Shells out to the `docker` CLI via `tokio::process::Command`, the same
//! shape the teacher's `DockerAdapter::run_docker` helper uses for
//! container lifecycle management.

use crate::image::{CloudRegistryAuth, ImageResolver};
use crate::runtime::{filter_env, LaunchOutcome, Supervisor, MOUNT_PATH};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use worker_core::naming::container_name;
use worker_core::{ContainerState, ExecutionError, ExecutionRequest};

const PULL_TIMEOUT: Duration = Duration::from_secs(120);
const WAIT_TICK: Duration = Duration::from_secs(5);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Supervises connector containers on a local Docker daemon.
pub struct LocalSupervisor {
    image_resolver: ImageResolver,
    /// `(in_worker_prefix, host_prefix)` — rewrites the bind-mount source
    /// when the worker itself runs inside a container, so the daemon
    /// (which sees the host filesystem) can resolve the path.
    mount_rewrite: Option<(String, String)>,
    /// Cloud registry login helper (§4.2): set when pulling from a private
    /// ECR host requires a `docker login` first. `None` means every image
    /// this supervisor pulls is assumed already reachable (Docker Hub, or a
    /// registry the daemon is pre-authenticated against).
    cloud_auth: Option<Arc<dyn CloudRegistryAuth>>,
}

impl LocalSupervisor {
    pub fn new(image_resolver: ImageResolver) -> Self {
        Self { image_resolver, mount_rewrite: None, cloud_auth: None }
    }

    pub fn with_mount_rewrite(mut self, in_worker_prefix: impl Into<String>, host_prefix: impl Into<String>) -> Self {
        self.mount_rewrite = Some((in_worker_prefix.into(), host_prefix.into()));
        self
    }

    pub fn with_cloud_auth(mut self, auth: Arc<dyn CloudRegistryAuth>) -> Self {
        self.cloud_auth = Some(auth);
        self
    }

    fn host_mount_source(&self, workdir: &Path) -> String {
        let path = workdir.display().to_string();
        match &self.mount_rewrite {
            Some((from, to)) if path.starts_with(from.as_str()) => {
                format!("{to}{}", &path[from.len()..])
            }
            _ => path,
        }
    }

    /// `docker image inspect <image>` — true if present locally.
    async fn image_present(&self, image: &str) -> bool {
        run_docker(&["image", "inspect", image]).await.is_ok()
    }

    /// Pull with a bounded timeout; I/O is drained but not parsed. Logs in
    /// to the image's registry first if it needs cloud credentials and an
    /// auth helper was configured.
    async fn pull_image(&self, image: &str) -> Result<(), ExecutionError> {
        if self.image_present(image).await {
            return Ok(());
        }
        if let Some(auth) = &self.cloud_auth {
            if let Some(token) = ImageResolver::registry_token(image, auth.as_ref()).await? {
                docker_login(&token).await?;
            }
        } else if ImageResolver::needs_cloud_login(image) {
            tracing::warn!(image, "image needs cloud registry login but no auth helper is configured, pulling anyway");
        }
        match tokio::time::timeout(PULL_TIMEOUT, run_docker(&["pull", image])).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ExecutionError::InfrastructureTransient(format!("pull failed: {e}"))),
            Err(_) => Err(ExecutionError::InfrastructureTransient("pull timed out".to_string())),
        }
    }

    /// `docker inspect` parsed into a `ContainerState` snapshot.
    async fn inspect(&self, name: &str) -> ContainerState {
        let output = match run_docker(&["inspect", name]).await {
            Ok(stdout) => stdout,
            Err(_) => return ContainerState::absent(),
        };
        let parsed: serde_json::Value = match serde_json::from_str(&output) {
            Ok(v) => v,
            Err(_) => return ContainerState::absent(),
        };
        let state = parsed.get(0).and_then(|c| c.get("State"));
        let running = state.and_then(|s| s.get("Running")).and_then(|v| v.as_bool()).unwrap_or(false);
        let exit_code = state.and_then(|s| s.get("ExitCode")).and_then(|v| v.as_i64()).map(|c| c as i32);
        if running {
            ContainerState::running()
        } else {
            match exit_code {
                Some(code) => ContainerState::exited(code),
                None => ContainerState::absent(),
            }
        }
    }

    /// Create (or, on name conflict, adopt by name) the container for this
    /// request and return whether start is still required.
    async fn create_or_adopt(
        &self,
        name: &str,
        image: &str,
        req: &ExecutionRequest,
        workdir: &Path,
    ) -> Result<(), ExecutionError> {
        let mount = format!("{}:{}", self.host_mount_source(workdir), MOUNT_PATH);
        let mut args: Vec<String> =
            vec!["create".into(), "--name".into(), name.into(), "-v".into(), mount];

        for (k, v) in filter_env(std::env::vars()) {
            args.push("-e".into());
            args.push(format!("{k}={v}"));
        }

        args.push(image.into());
        args.extend(req.args.iter().cloned());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        match run_docker(&arg_refs).await {
            Ok(_) => Ok(()),
            Err(e) if e.contains("Conflict") || e.contains("already in use") => {
                tracing::info!(%name, "container already exists, adopting by name");
                Ok(())
            }
            Err(e) => Err(ExecutionError::Runtime(format!("create failed: {e}"))),
        }
    }

    async fn start(&self, name: &str) -> Result<(), ExecutionError> {
        run_docker(&["start", name])
            .await
            .map(|_| ())
            .or_else(|e| if e.contains("already started") { Ok(()) } else { Err(ExecutionError::Runtime(e)) })
    }

    /// 5-second-tick wait loop: heartbeat on every tick, cancellation wins
    /// over any concurrently observed error.
    async fn wait(
        &self,
        name: &str,
        req: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> Result<i32, ExecutionError> {
        loop {
            if cancel.is_cancelled() {
                return Err(ExecutionError::Cancelled);
            }
            let state = self.inspect(name).await;
            if !state.running {
                return Ok(state.exit_code.unwrap_or(-1));
            }
            req.heartbeat();
            tokio::select! {
                _ = cancel.cancelled() => return Err(ExecutionError::Cancelled),
                _ = tokio::time::sleep(WAIT_TICK) => {}
            }
        }
    }

    /// Demultiplex `docker logs`: prefer stdout; fall back to stderr if
    /// stdout is empty; concatenate with a newline if both are non-empty.
    async fn logs(&self, name: &str) -> String {
        let output = tokio::process::Command::new("docker").args(["logs", name]).output().await;
        let Ok(output) = output else { return String::new() };
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
            (false, true) => stdout,
            (true, false) => stderr,
            (true, true) => String::new(),
            (false, false) => format!("{stdout}\n{stderr}"),
        }
    }

    /// Graceful stop (5s timeout, then SIGKILL), then force-remove. Remove
    /// is always attempted even if stop succeeded.
    async fn stop_and_remove(&self, name: &str) -> Result<(), ExecutionError> {
        let timeout_secs = STOP_TIMEOUT.as_secs().to_string();
        let stop_result = run_docker(&["stop", "-t", &timeout_secs, name]).await;
        if stop_result.is_err() {
            let _ = run_docker(&["kill", name]).await;
        }
        match run_docker(&["rm", "-f", name]).await {
            Ok(_) => Ok(()),
            Err(e) if e.contains("No such container") => Ok(()),
            Err(e) => Err(ExecutionError::Runtime(format!("remove failed: {e}"))),
        }
    }
}

#[async_trait]
impl Supervisor for LocalSupervisor {
    async fn execute(
        &self,
        req: &ExecutionRequest,
        workdir: &Path,
        cancel: &CancellationToken,
    ) -> Result<String, ExecutionError> {
        let name = container_name(&req.workflow_id);
        let image = self.image_resolver.resolve(&req.connector_type, &req.version);
        let launched_marker = workdir.join("logs");

        let outcome = if req.command.is_async() {
            let state = self.inspect(&name).await;
            if state.running {
                LaunchOutcome::Adopted
            } else if state.succeeded() {
                LaunchOutcome::AlreadySucceeded
            } else if state.failed() {
                if req.command == worker_core::Command::ClearDestination {
                    let _ = run_docker(&["rm", "-f", &name]).await;
                    LaunchOutcome::Launched
                } else {
                    let code = state.exit_code.unwrap_or(-1);
                    let log_tail = self.logs(&name).await;
                    return Err(ExecutionError::ExecutionFailed { exit_code: Some(code), log_tail });
                }
            } else if launched_marker.is_dir() {
                LaunchOutcome::Skipped
            } else {
                LaunchOutcome::Launched
            }
        } else {
            LaunchOutcome::Launched
        };

        match outcome {
            LaunchOutcome::Adopted => {
                let exit_code = self.wait(&name, req, cancel).await?;
                if exit_code != 0 {
                    let log_tail = self.logs(&name).await;
                    return Err(ExecutionError::ExecutionFailed { exit_code: Some(exit_code), log_tail });
                }
                Ok(self.logs(&name).await)
            }
            LaunchOutcome::AlreadySucceeded => Ok(self.logs(&name).await),
            LaunchOutcome::Skipped => Ok(String::new()),
            LaunchOutcome::Launched => {
                self.pull_image(&image).await?;
                self.create_or_adopt(&name, &image, req, workdir).await?;
                self.start(&name).await?;
                let exit_code = self.wait(&name, req, cancel).await?;
                if exit_code != 0 {
                    let log_tail = self.logs(&name).await;
                    return Err(ExecutionError::ExecutionFailed { exit_code: Some(exit_code), log_tail });
                }
                Ok(self.logs(&name).await)
            }
        }
    }

    async fn cleanup(&self, req: &ExecutionRequest) -> Result<(), ExecutionError> {
        let name = container_name(&req.workflow_id);
        self.stop_and_remove(&name).await
    }
}

/// Run a docker CLI command, returning stdout on success or the trimmed
/// stderr text on failure.
async fn run_docker(args: &[&str]) -> Result<String, String> {
    let output = tokio::process::Command::new("docker")
        .args(args)
        .output()
        .await
        .map_err(|e| format!("failed to exec docker: {e}"))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!("docker {} failed: {}", args.first().unwrap_or(&""), stderr.trim()))
    }
}

/// `docker login <endpoint> -u <username> --password-stdin`, feeding the
/// password over stdin rather than argv so it never appears in a process
/// listing.
async fn docker_login(token: &crate::image::RegistryToken) -> Result<(), ExecutionError> {
    let mut child = tokio::process::Command::new("docker")
        .args(["login", &token.endpoint, "-u", &token.username, "--password-stdin"])
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(|e| ExecutionError::InfrastructureTransient(format!("failed to exec docker login: {e}")))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| ExecutionError::InfrastructureTransient("docker login child has no stdin handle".to_string()))?;
    stdin
        .write_all(token.password.as_bytes())
        .await
        .map_err(|e| ExecutionError::InfrastructureTransient(format!("failed to write docker login password: {e}")))?;
    drop(stdin);

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| ExecutionError::InfrastructureTransient(format!("docker login failed: {e}")))?;
    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(ExecutionError::InfrastructureTransient(format!("docker login to {} failed: {}", token.endpoint, stderr.trim())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_mount_source_rewrites_prefix_when_configured() {
        let sup = LocalSupervisor::new(ImageResolver::new("registry/connectors"))
            .with_mount_rewrite("/in-worker", "/host");
        let workdir = Path::new("/in-worker/workspaces/wf-1");
        assert_eq!(sup.host_mount_source(workdir), "/host/workspaces/wf-1");
    }

    #[test]
    fn host_mount_source_passes_through_without_rewrite() {
        let sup = LocalSupervisor::new(ImageResolver::new("registry/connectors"));
        let workdir = Path::new("/workspaces/wf-1");
        assert_eq!(sup.host_mount_source(workdir), "/workspaces/wf-1");
    }

    #[tokio::test]
    async fn inspect_returns_absent_for_missing_binary_output() {
        let sup = LocalSupervisor::new(ImageResolver::new("registry/connectors"));
        // `docker` is very unlikely to exist in the sandboxed test runner,
        // or if it does, this container name will never exist — both paths
        // yield `absent`.
        let state = sup.inspect("worker-core-test-nonexistent-container").await;
        assert!(!state.running);
    }

    struct StubAuth;

    #[async_trait]
    impl CloudRegistryAuth for StubAuth {
        async fn get_authorization_token(&self, _registry_host: &str) -> Result<String, ExecutionError> {
            use base64::Engine;
            Ok(base64::engine::general_purpose::STANDARD.encode("AWS:token-pass"))
        }
    }

    #[test]
    fn with_cloud_auth_sets_the_auth_helper() {
        let sup = LocalSupervisor::new(ImageResolver::new("registry/connectors"))
            .with_cloud_auth(Arc::new(StubAuth));
        assert!(sup.cloud_auth.is_some());
    }

    #[tokio::test]
    async fn pull_image_skips_login_for_images_that_do_not_need_it() {
        // `registry-connectors-postgres` has no registry host segment, so
        // `needs_cloud_login` is false and `pull_image` never reaches
        // `docker_login` (which would require a real `docker` binary).
        let token = ImageResolver::registry_token("registry-connectors-postgres:latest", &StubAuth).await.unwrap();
        assert!(token.is_none());
    }
}
