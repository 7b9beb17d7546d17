// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The narrow scheduler interface (§1, §9): everything the activity layer
//! needs from the external workflow-engine SDK, which is otherwise out of
//! scope for this crate. The engine itself — activity registration,
//! workflow replay, durable timers — lives entirely outside this worker;
//! we only depend on these four surfaces.

use std::future::Future;
use std::time::Duration;
use worker_core::ExecutionError;

pub use tokio_util::sync::CancellationToken;

/// The opaque heartbeat callback a scheduler hands an activity. Every
/// supervisor poll/wait tick invokes it; the worker never inspects
/// whether the scheduler actually forwarded it anywhere.
pub trait HeartbeatSink: Send + Sync {
    fn heartbeat(&self);
}

/// A heartbeat sink that does nothing, for unit tests and dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHeartbeat;

impl HeartbeatSink for NoopHeartbeat {
    fn heartbeat(&self) {}
}

/// Retry policy values the workflow definitions attach to an activity
/// call. `max_attempts == 0` means unlimited (the infinite-retry policy
/// `RunSyncWorkflow` uses).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub backoff_coefficient: f64,
    pub max_interval: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// `{initial 5s, backoff 2x, max 5 min, attempts 1}` — the default
    /// used by `ExecuteWorkflow` and `ExecuteClearWorkflow`.
    pub const fn default_single_attempt() -> Self {
        Self {
            initial_interval: Duration::from_secs(5),
            backoff_coefficient: 2.0,
            max_interval: Duration::from_secs(5 * 60),
            max_attempts: 1,
        }
    }

    /// `{attempts 0}` — the infinite-retry policy `RunSyncWorkflow` uses,
    /// relying on this worker's adoption protocol so a retry on a new
    /// worker attaches to existing work rather than duplicating it.
    pub const fn infinite() -> Self {
        Self {
            initial_interval: Duration::from_secs(5),
            backoff_coefficient: 2.0,
            max_interval: Duration::from_secs(5 * 60),
            max_attempts: 0,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_attempts == 0
    }
}

/// Per-command activity timeouts (§5). `discover`/`check` default to two
/// hours, `sync` to 700 hours, `spec` to five minutes, anything else to
/// the 30-minute fallback.
pub fn default_timeout(command: worker_core::Command) -> Duration {
    use worker_core::Command::*;
    match command {
        Discover | Check => Duration::from_secs(2 * 60 * 60),
        Sync => Duration::from_secs(700 * 60 * 60),
        Spec => Duration::from_secs(5 * 60),
        ClearDestination => Duration::from_secs(30 * 60),
    }
}

/// Timeout/heartbeat policy a workflow attaches to a single activity
/// invocation.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutPolicy {
    pub start_to_close: Duration,
    pub heartbeat_timeout: Option<Duration>,
}

impl TimeoutPolicy {
    pub fn for_command(command: worker_core::Command) -> Self {
        Self { start_to_close: default_timeout(command), heartbeat_timeout: None }
    }

    pub fn with_heartbeat(mut self, d: Duration) -> Self {
        self.heartbeat_timeout = Some(d);
        self
    }
}

/// `StartToCloseTimeout` for the deferred cleanup activity (§4.8, §5).
pub const CLEANUP_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// The registration surface a workflow definition binds activities and
/// itself to. Concrete implementations live in the scheduler SDK; this
/// worker only needs to be able to name things.
pub trait ActivityRegistrar: Send + Sync {
    fn register_activity(&self, name: &'static str);
    fn register_workflow(&self, name: &'static str);
}

/// Run `cleanup` in a *disconnected* context: a fresh timeout window that
/// does not descend from the activity context that may already be
/// cancelled (§9 design notes — "deferred blocks run in a disconnected
/// context"). Unlike the original workflow engine's deferred-block
/// semantics, here this is a plain bounded future: the caller (the
/// workflow orchestration function) is responsible for invoking it both
/// on normal completion and on cancellation. `on_timeout` builds the
/// error value for whatever error type the caller's activity uses.
pub async fn run_disconnected<F, T, E>(cleanup: F, on_timeout: impl FnOnce() -> E) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(CLEANUP_TIMEOUT, cleanup).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}
