use super::*;
use axum::extract::State;
use worker_core::FakeClock;

fn lazy_pool() -> PgPool {
    PgPool::connect_lazy("postgres://localhost/olake-worker-test-placeholder")
        .expect("connect_lazy never touches the network")
}

#[tokio::test]
async fn health_is_unavailable_before_both_flags_are_set() {
    let state = HealthState::new(lazy_pool());
    let resp = health(State(state.clone())).await.into_response();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    state.mark_scheduler_ready();
    let resp = health(State(state.clone())).await.into_response();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    state.mark_worker_ready();
    let resp = health(State(state)).await.into_response();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn ready_short_circuits_on_uninitialized_without_touching_the_db() {
    let state = HealthState::new(lazy_pool());
    let resp = ready(State(state)).await.into_response();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn metrics_reports_starting_until_initialized() {
    let state = HealthState::new(lazy_pool());
    let body = metrics(State(state.clone())).await.0;
    assert_eq!(body.worker_status, "starting");

    state.mark_scheduler_ready();
    state.mark_worker_ready();
    let body = metrics(State(state)).await.0;
    assert_eq!(body.worker_status, "running");
}

#[tokio::test]
async fn metrics_uptime_tracks_the_injected_clock() {
    let clock = FakeClock::new();
    let state = HealthState::with_clock(lazy_pool(), clock.clone());

    let body = metrics(State(state.clone())).await.0;
    assert_eq!(body.uptime_seconds, 0);

    clock.advance(std::time::Duration::from_secs(42));
    let body = metrics(State(state)).await.0;
    assert_eq!(body.uptime_seconds, 42);
}
