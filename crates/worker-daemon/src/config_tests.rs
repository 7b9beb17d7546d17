use super::*;
use serial_test::serial;

fn clear_all() {
    for name in [
        "OLAKE_SCHEDULER_ADDRESS",
        "OLAKE_TASK_QUEUE",
        "OLAKE_DATABASE_URL",
        "OLAKE_RUN_MODE",
        "OLAKE_RUNTIME_ENVIRONMENT",
        "OLAKE_IMAGE_PREFIX",
        "OLAKE_WORKSPACE_DIR",
        "OLAKE_WORKSPACE_HOST_DIR",
        "OLAKE_NAMESPACE",
        "OLAKE_PVC_NAME",
        "OLAKE_SERVICE_ACCOUNT",
        "OLAKE_SECRET_KEY",
        "OLAKE_POD_NAME",
        "OLAKE_LOG_RETENTION_DAYS",
        "OLAKE_CALLBACK_URL",
        "OLAKE_HEALTH_PORT",
        "OLAKE_TIMEOUT_SYNC_SECS",
    ] {
        std::env::remove_var(name);
    }
}

fn required_env() {
    std::env::set_var("OLAKE_SCHEDULER_ADDRESS", "scheduler:7233");
    std::env::set_var("OLAKE_DATABASE_URL", "postgres://localhost/olake");
    std::env::set_var("OLAKE_IMAGE_PREFIX", "registry.example.com/connectors");
    std::env::set_var("OLAKE_SECRET_KEY", "topsecret");
}

#[test]
#[serial]
fn load_fails_when_required_vars_are_missing() {
    clear_all();
    let err = WorkerConfig::load().unwrap_err();
    assert!(matches!(err, ConfigError::Missing("OLAKE_SCHEDULER_ADDRESS")));
}

#[test]
#[serial]
fn load_applies_defaults_for_optional_vars() {
    clear_all();
    required_env();
    let cfg = WorkerConfig::load().unwrap();
    assert_eq!(cfg.runtime_environment, RuntimeEnvironment::Docker);
    assert_eq!(cfg.task_queue, "olake-worker");
    assert_eq!(cfg.health_port, 8090);
    assert_eq!(cfg.log_retention_days, 30);
    assert!(cfg.service_account.is_none());
    assert!(cfg.timeout_overrides.is_empty());
    clear_all();
}

#[test]
#[serial]
fn load_parses_kubernetes_environment_and_timeout_override() {
    clear_all();
    required_env();
    std::env::set_var("OLAKE_RUNTIME_ENVIRONMENT", "kubernetes");
    std::env::set_var("OLAKE_TIMEOUT_SYNC_SECS", "3600");
    let cfg = WorkerConfig::load().unwrap();
    assert_eq!(cfg.runtime_environment, RuntimeEnvironment::Kubernetes);
    assert_eq!(cfg.timeout_overrides.get(&Command::Sync), Some(&Duration::from_secs(3600)));
    clear_all();
}

#[test]
#[serial]
fn load_rejects_unknown_runtime_environment() {
    clear_all();
    required_env();
    std::env::set_var("OLAKE_RUNTIME_ENVIRONMENT", "serverless");
    let err = WorkerConfig::load().unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { name: "OLAKE_RUNTIME_ENVIRONMENT", .. }));
    clear_all();
}
