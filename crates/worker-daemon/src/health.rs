// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health surface (§6): `GET /health`, `GET /ready`, `GET /metrics`.
//!
//! The teacher's own daemon speaks a private Unix-socket protocol and
//! exposes no HTTP surface at all; this is imported from the rest of the
//! example pack (`everruns-everruns`'s `axum::Router` + `State` health
//! endpoint) rather than grounded on the teacher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use worker_core::{Clock, SystemClock};

/// Readiness flags flipped once at bootstrap and read by every request.
/// `AtomicBool` rather than a lock: these only ever transition false to
/// true, once, during startup.
///
/// Generic over [`Clock`] so `uptime_seconds` is testable with a
/// `FakeClock`; production code gets `HealthState` (an alias for
/// `HealthState<SystemClock>`) via [`Self::new`].
#[derive(Clone)]
pub struct HealthState<C: Clock = SystemClock> {
    scheduler_ready: Arc<AtomicBool>,
    worker_ready: Arc<AtomicBool>,
    db: PgPool,
    clock: C,
    start_epoch_ms: u64,
}

impl HealthState<SystemClock> {
    pub fn new(db: PgPool) -> Self {
        Self::with_clock(db, SystemClock)
    }
}

impl<C: Clock> HealthState<C> {
    pub fn with_clock(db: PgPool, clock: C) -> Self {
        let start_epoch_ms = clock.epoch_ms();
        Self {
            scheduler_ready: Arc::new(AtomicBool::new(false)),
            worker_ready: Arc::new(AtomicBool::new(false)),
            db,
            clock,
            start_epoch_ms,
        }
    }

    pub fn mark_scheduler_ready(&self) {
        self.scheduler_ready.store(true, Ordering::Release);
    }

    pub fn mark_worker_ready(&self) {
        self.worker_ready.store(true, Ordering::Release);
    }

    fn is_initialized(&self) -> bool {
        self.scheduler_ready.load(Ordering::Acquire) && self.worker_ready.load(Ordering::Acquire)
    }

    fn uptime_seconds(&self) -> u64 {
        self.clock.epoch_ms().saturating_sub(self.start_epoch_ms) / 1000
    }
}

pub fn router<C: Clock + Send + Sync + 'static>(state: HealthState<C>) -> Router {
    Router::new()
        .route("/health", get(health::<C>))
        .route("/ready", get(ready::<C>))
        .route("/metrics", get(metrics::<C>))
        .with_state(state)
}

/// 200 if the scheduler client and worker are both initialized, 503
/// otherwise. No database access — this must stay cheap.
async fn health<C: Clock + Send + Sync + 'static>(State(state): State<HealthState<C>>) -> Response {
    if state.is_initialized() {
        StatusCode::OK.into_response()
    } else {
        StatusCode::SERVICE_UNAVAILABLE.into_response()
    }
}

/// Same as `/health`, plus a database ping.
async fn ready<C: Clock + Send + Sync + 'static>(State(state): State<HealthState<C>>) -> Response {
    if !state.is_initialized() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "readiness db ping failed");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

#[derive(Serialize)]
struct MetricsResponse {
    worker_status: &'static str,
    uptime_seconds: u64,
    timestamp: String,
}

/// `GET /metrics` returns the JSON shape verbatim (§6) — no Prometheus
/// exposition format.
async fn metrics<C: Clock + Send + Sync + 'static>(State(state): State<HealthState<C>>) -> Json<MetricsResponse> {
    let worker_status = if state.is_initialized() { "running" } else { "starting" };
    Json(MetricsResponse {
        worker_status,
        uptime_seconds: state.uptime_seconds(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
