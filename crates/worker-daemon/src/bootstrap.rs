// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bootstrap glue: construct the supervisor, the executor facade, the
//! activity layer and workflow definitions, and — in cluster mode — the
//! placement watcher's background task (§2, §4.3).
//!
//! Grounded in the teacher's `lifecycle::startup` staged construction
//! (adapters, then runtime, then background tasks, then the listener
//! bound last), generalized here to a plain builder function since this
//! worker has no WAL/snapshot recovery stage to sequence around.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use worker_activities::activities::{ExecuteActivity, PostClearActivity, PostSyncActivity, SyncActivity};
use worker_activities::telemetry::LoggingTelemetrySink;
use worker_activities::workflows::{ExecuteClearWorkflow, ExecuteWorkflow, RunSyncWorkflow};
use worker_adapters::image::ImageResolver;
use worker_adapters::placement::PlacementWatcher;
use worker_adapters::runtime::cluster::{ClusterConfig, ClusterSupervisor};
use worker_adapters::runtime::local::LocalSupervisor;
use worker_adapters::Supervisor;
use worker_engine::{Executor, ExecutorConfig};
use worker_storage::repository::PostgresRepository;
use worker_storage::tables::TableNames;
use worker_storage::Repository;

use crate::config::{RuntimeEnvironment, WorkerConfig};
use crate::error::DaemonError;
use crate::schedule::UnconfiguredScheduleClient;

const GLOBAL_ENV_CONFIG_MAP: &str = "olake-global-env";

/// Everything a scheduler binding needs to dispatch activities and
/// workflows, plus the database pool the health surface pings.
pub struct Worker {
    pub execute_workflow: ExecuteWorkflow,
    pub run_sync_workflow: RunSyncWorkflow,
    pub execute_clear_workflow: ExecuteClearWorkflow,
    pub db_pool: sqlx::PgPool,
    /// Cancelled on shutdown to stop the placement watcher's background
    /// task (cluster mode only; `None` in local mode).
    pub placement_watch_cancel: Option<CancellationToken>,
}

pub async fn bootstrap(config: &WorkerConfig) -> Result<Worker, DaemonError> {
    let repository = PostgresRepository::connect(&config.database_url, TableNames::for_mode(&config.run_mode)).await?;
    let db_pool = repository.pool().clone();
    let repo: Arc<dyn Repository> = Arc::new(repository);

    let image_resolver = ImageResolver::new(config.image_prefix.clone());

    let (supervisor, placement_watch_cancel): (Arc<dyn Supervisor>, Option<CancellationToken>) =
        match config.runtime_environment {
            RuntimeEnvironment::Docker => {
                let mut local = LocalSupervisor::new(image_resolver);
                if let Some(host_dir) = &config.workspace_host_dir {
                    local = local.with_mount_rewrite(config.workspace_dir.display().to_string(), host_dir.clone());
                }
                // No `CloudRegistryAuth` wired in: the concrete AWS STS/ECR
                // client is out of scope here (§1). `LocalSupervisor` still
                // pulls non-private-registry images fine without one; a
                // private ECR prefix would need `.with_cloud_auth(..)` added
                // once a real client is chosen.
                (Arc::new(local), None)
            }
            RuntimeEnvironment::Kubernetes => {
                let client = kube::Client::try_default().await?;
                let placement = PlacementWatcher::new();
                let watch_cancel = CancellationToken::new();
                let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
                spawn_placement_watcher(
                    placement.clone(),
                    client.clone(),
                    config.namespace.clone(),
                    watch_cancel.clone(),
                    ready_tx,
                );
                // §4.3: "synchronize the initial cache before returning".
                if tokio::time::timeout(std::time::Duration::from_secs(30), ready_rx).await.is_err() {
                    tracing::warn!("placement watcher did not complete its initial list within 30s, proceeding anyway");
                }

                let cluster_config = ClusterConfig {
                    namespace: config.namespace.clone(),
                    pvc_name: config.pvc_name.clone(),
                    secret_key: config.secret_key.clone(),
                    service_account: config.service_account.clone(),
                    global_env_config_map: GLOBAL_ENV_CONFIG_MAP.to_string(),
                    worker_identity: config.worker_identity.clone(),
                };
                (Arc::new(ClusterSupervisor::new(client, image_resolver, placement, cluster_config)), Some(watch_cancel))
            }
        };

    let executor = Arc::new(Executor::new(
        supervisor,
        repo.clone(),
        ExecutorConfig { workspace_base: config.workspace_dir.clone() },
    ));
    let telemetry = Arc::new(LoggingTelemetrySink);
    let schedule_client = Arc::new(UnconfiguredScheduleClient);

    let execute_activity = Arc::new(ExecuteActivity::new(executor.clone(), repo.clone()));
    let sync_activity = Arc::new(SyncActivity::new(executor.clone(), repo.clone(), telemetry.clone()));
    let post_sync_activity = Arc::new(PostSyncActivity::new(executor.clone(), telemetry));
    let post_clear_activity = Arc::new(PostClearActivity::new(executor, schedule_client));

    Ok(Worker {
        execute_workflow: ExecuteWorkflow::new(execute_activity.clone()),
        run_sync_workflow: RunSyncWorkflow::new(sync_activity, post_sync_activity),
        execute_clear_workflow: ExecuteClearWorkflow::new(execute_activity, post_clear_activity),
        db_pool,
        placement_watch_cancel,
    })
}

fn spawn_placement_watcher(
    placement: PlacementWatcher,
    client: kube::Client,
    namespace: String,
    cancel: CancellationToken,
    ready: tokio::sync::oneshot::Sender<()>,
) {
    tokio::spawn(async move {
        if let Err(e) = placement.run(client, &namespace, cancel, Some(ready)).await {
            tracing::error!(error = %e, "placement watcher exited with an error");
        }
    });
}
