// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster-Runtime Supervisor (§4.5): create/poll/log/delete pods in a
//! namespace, with adoption.
//!
//! Grounded in the teacher's `KubernetesAdapter` (`Api<Pod>` create/get/
//! delete via `kube-rs`) and `k8s::pod::build_pod` (a `PodParams` struct
//! plus a `build_pod` free function).

use crate::image::ImageResolver;
use crate::placement::PlacementWatcher;
use crate::runtime::{LaunchOutcome, Supervisor, MOUNT_PATH};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    Affinity as K8sAffinity, Container, EnvFromSource, EnvVar, ExecAction,
    NodeAffinity as K8sNodeAffinity, NodeSelector as K8sNodeSelector,
    NodeSelectorRequirement as K8sNodeSelectorRequirement, NodeSelectorTerm as K8sNodeSelectorTerm,
    Pod, PodSpec, Probe, ResourceRequirements, Toleration as K8sToleration, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{DeleteParams, LogParams, PostParams};
use kube::{Api, Client};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use worker_core::naming::container_name;
use worker_core::{Command, ExecutionError, ExecutionRequest, NodeSelectorOperator};

const POLL_TICK: Duration = Duration::from_secs(5);
const INFRA_RETRYABLE_REASONS: &[&str] = &["ImagePullBackOff", "ErrImagePull"];

/// Static (per-worker-process) configuration the cluster supervisor needs
/// beyond what travels on each request.
#[derive(Clone)]
pub struct ClusterConfig {
    pub namespace: String,
    pub pvc_name: String,
    pub secret_key: String,
    pub service_account: Option<String>,
    pub global_env_config_map: String,
    pub worker_identity: String,
}

/// Supervises connector pods on a shared compute cluster via the
/// Kubernetes API.
pub struct ClusterSupervisor {
    client: Client,
    image_resolver: ImageResolver,
    placement: PlacementWatcher,
    config: ClusterConfig,
}

impl ClusterSupervisor {
    pub fn new(
        client: Client,
        image_resolver: ImageResolver,
        placement: PlacementWatcher,
        config: ClusterConfig,
    ) -> Self {
        Self { client, image_resolver, placement, config }
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.config.namespace)
    }

    async fn create_or_adopt(&self, req: &ExecutionRequest, workdir: &Path) -> Result<String, ExecutionError> {
        let name = container_name(&req.workflow_id);
        let pods = self.pods();

        match pods.get(&name).await {
            Ok(_existing) => {
                tracing::info!(pod = %name, "pod already exists, adopting");
                return Ok(name);
            }
            Err(kube::Error::Api(e)) if e.code == 404 => {}
            Err(e) => return Err(ExecutionError::InfrastructureTransient(format!("pod lookup failed: {e}"))),
        }

        let image = self.image_resolver.resolve(&req.connector_type, &req.version);
        let node_selector = self.placement.node_selector(req.command.is_async(), req.job_id);
        let tolerations = self.placement.tolerations(req.command.is_async(), req.job_id);
        let affinity = self.placement.affinity(req.command.is_async(), req.job_id);

        let sub_path = workdir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| req.workflow_id.clone());

        let params = PodParams {
            pod_name: name.clone(),
            namespace: self.config.namespace.clone(),
            image,
            args: req.args.clone(),
            workflow_id_sanitized: name.clone(),
            workflow_id_raw: req.workflow_id.clone(),
            job_id: req.job_id,
            connector_type: req.connector_type.clone(),
            command: req.command,
            pvc_name: self.config.pvc_name.clone(),
            sub_path,
            secret_key: self.config.secret_key.clone(),
            service_account: self.config.service_account.clone(),
            global_env_config_map: self.config.global_env_config_map.clone(),
            node_selector,
            tolerations,
            affinity,
            worker_identity: self.config.worker_identity.clone(),
        };

        let pod = build_pod(&params);
        match pods.create(&PostParams::default(), &pod).await {
            Ok(_) => Ok(name),
            Err(kube::Error::Api(e)) if e.code == 409 => {
                tracing::info!(pod = %name, "create raced with another worker, adopting");
                Ok(name)
            }
            Err(e) => Err(ExecutionError::InfrastructureTransient(format!("pod creation failed: {e}"))),
        }
    }

    /// Poll until the pod reaches a terminal phase, the deadline expires,
    /// or cancellation fires.
    async fn poll(
        &self,
        name: &str,
        req: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> Result<LaunchOutcome, ExecutionError> {
        let pods = self.pods();
        let deadline = tokio::time::Instant::now() + req.timeout;

        loop {
            if cancel.is_cancelled() {
                return Err(ExecutionError::Cancelled);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ExecutionError::InfrastructureTransient("poll deadline exceeded".to_string()));
            }

            let pod = pods
                .get(name)
                .await
                .map_err(|e| ExecutionError::InfrastructureTransient(format!("pod poll failed: {e}")))?;
            req.heartbeat();

            let phase = pod.status.as_ref().and_then(|s| s.phase.as_deref()).unwrap_or("");
            match phase {
                "Succeeded" => return Ok(LaunchOutcome::Launched),
                "Failed" => {
                    let (reason, exit_code) = terminated_reason(&pod);
                    if reason.as_deref().is_some_and(|r| INFRA_RETRYABLE_REASONS.contains(&r)) {
                        // infrastructure-retryable, keep polling
                    } else {
                        let log_tail = self.logs(name).await.unwrap_or_default();
                        return Err(ExecutionError::ExecutionFailed { exit_code, log_tail });
                    }
                }
                _ => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(ExecutionError::Cancelled),
                _ = tokio::time::sleep(POLL_TICK) => {}
            }
        }
    }

    async fn logs(&self, name: &str) -> Result<String, ExecutionError> {
        let pods = self.pods();
        pods.logs(name, &LogParams { container: Some("connector".to_string()), ..Default::default() })
            .await
            .map_err(|e| ExecutionError::Runtime(format!("log retrieval failed: {e}")))
    }
}

#[async_trait]
impl Supervisor for ClusterSupervisor {
    async fn execute(
        &self,
        req: &ExecutionRequest,
        workdir: &Path,
        cancel: &CancellationToken,
    ) -> Result<String, ExecutionError> {
        let name = self.create_or_adopt(req, workdir).await?;
        self.poll(&name, req, cancel).await?;
        self.logs(&name).await
    }

    async fn cleanup(&self, req: &ExecutionRequest) -> Result<(), ExecutionError> {
        let name = container_name(&req.workflow_id);
        let pods = self.pods();
        match pods.delete(&name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(ExecutionError::Runtime(format!("pod deletion failed: {e}"))),
        }
    }
}

/// Read the terminated `connector` container's exit code and reason out of
/// a `Failed`-phase pod.
fn terminated_reason(pod: &Pod) -> (Option<String>, Option<i32>) {
    let statuses = pod.status.as_ref().and_then(|s| s.container_statuses.as_ref());
    let Some(statuses) = statuses else { return (None, None) };
    for status in statuses {
        if status.name != "connector" {
            continue;
        }
        if let Some(state) = &status.state {
            if let Some(terminated) = &state.terminated {
                return (terminated.reason.clone(), Some(terminated.exit_code));
            }
            if let Some(waiting) = &state.waiting {
                return (waiting.reason.clone(), None);
            }
        }
    }
    (None, None)
}

/// Parameters for building a connector pod spec.
pub struct PodParams {
    pub pod_name: String,
    pub namespace: String,
    pub image: String,
    pub args: Vec<String>,
    pub workflow_id_sanitized: String,
    pub workflow_id_raw: String,
    pub job_id: i64,
    pub connector_type: String,
    pub command: Command,
    pub pvc_name: String,
    pub sub_path: String,
    pub secret_key: String,
    pub service_account: Option<String>,
    pub global_env_config_map: String,
    pub node_selector: BTreeMap<String, String>,
    pub tolerations: Vec<worker_core::Toleration>,
    pub affinity: Option<worker_core::Affinity>,
    pub worker_identity: String,
}

/// Build a single-container (`connector`) pod spec (§4.5).
pub fn build_pod(params: &PodParams) -> Pod {
    let env = vec![
        env_var("OLAKE_WORKFLOW_ID", &params.workflow_id_raw),
        env_var("OLAKE_SECRET_KEY", &params.secret_key),
    ];

    let env_from = vec![EnvFromSource {
        config_map_ref: Some(k8s_openapi::api::core::v1::ConfigMapEnvSource {
            name: Some(params.global_env_config_map.clone()),
            optional: Some(true),
        }),
        ..Default::default()
    }];

    let mut liveness_probe = None;
    if params.command.is_async() {
        liveness_probe = Some(Probe {
            exec: Some(ExecAction {
                command: Some(vec![
                    "sh".to_string(),
                    "-c".to_string(),
                    format!("echo ok > {MOUNT_PATH}/.probe"),
                ]),
            }),
            initial_delay_seconds: Some(10),
            period_seconds: Some(30),
            timeout_seconds: Some(5),
            failure_threshold: Some(3),
            ..Default::default()
        });
    }

    let container = Container {
        name: "connector".to_string(),
        image: Some(params.image.clone()),
        args: Some(params.args.clone()),
        env: Some(env),
        env_from: Some(env_from),
        volume_mounts: Some(vec![VolumeMount {
            name: "workspace".to_string(),
            mount_path: MOUNT_PATH.to_string(),
            sub_path: Some(params.sub_path.clone()),
            ..Default::default()
        }]),
        resources: Some(ResourceRequirements {
            requests: Some(
                [
                    ("memory".to_string(), Quantity("256Mi".to_string())),
                    ("cpu".to_string(), Quantity("100m".to_string())),
                ]
                .into_iter()
                .collect(),
            ),
            ..Default::default()
        }),
        liveness_probe,
        ..Default::default()
    };

    let labels: BTreeMap<String, String> = [
        ("app".to_string(), "olake-connector".to_string()),
        ("app.kubernetes.io/managed-by".to_string(), "olake-worker".to_string()),
        ("olake.io/workflow-id".to_string(), params.workflow_id_sanitized.clone()),
        ("olake.io/job-id".to_string(), params.job_id.to_string()),
        ("olake.io/connector-type".to_string(), params.connector_type.clone()),
        ("olake.io/command".to_string(), params.command.as_str().to_string()),
    ]
    .into_iter()
    .collect();

    let annotations: BTreeMap<String, String> = [
        ("olake.io/workflow-id".to_string(), params.workflow_id_raw.clone()),
        ("olake.io/created-at".to_string(), chrono::Utc::now().to_rfc3339()),
        ("olake.io/created-by".to_string(), params.worker_identity.clone()),
    ]
    .into_iter()
    .collect();

    let tolerations: Vec<K8sToleration> = params
        .tolerations
        .iter()
        .map(|t| K8sToleration {
            key: t.key.clone(),
            operator: t.operator.clone(),
            value: t.value.clone(),
            effect: t.effect.clone(),
            toleration_seconds: None,
        })
        .collect();

    let affinity = params.affinity.as_ref().map(|a| K8sAffinity {
        node_affinity: Some(K8sNodeAffinity {
            required_during_scheduling_ignored_during_execution: Some(K8sNodeSelector {
                node_selector_terms: a
                    .required_node_selector_terms
                    .iter()
                    .map(|term| K8sNodeSelectorTerm {
                        match_expressions: Some(
                            term.match_expressions
                                .iter()
                                .map(|req| K8sNodeSelectorRequirement {
                                    key: req.key.clone(),
                                    operator: match req.operator {
                                        NodeSelectorOperator::In => "In".to_string(),
                                        NodeSelectorOperator::NotIn => "NotIn".to_string(),
                                        NodeSelectorOperator::Exists => "Exists".to_string(),
                                        NodeSelectorOperator::DoesNotExist => "DoesNotExist".to_string(),
                                    },
                                    values: Some(req.values.clone()),
                                })
                                .collect(),
                        ),
                        match_fields: None,
                    })
                    .collect(),
            }),
            ..Default::default()
        }),
        ..Default::default()
    });

    Pod {
        metadata: ObjectMeta {
            name: Some(params.pod_name.clone()),
            namespace: Some(params.namespace.clone()),
            labels: Some(labels),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![container],
            restart_policy: Some("Never".to_string()),
            service_account_name: params.service_account.clone(),
            node_selector: if params.node_selector.is_empty() { None } else { Some(params.node_selector.clone()) },
            tolerations: if tolerations.is_empty() { None } else { Some(tolerations) },
            affinity,
            volumes: Some(vec![Volume {
                name: "workspace".to_string(),
                persistent_volume_claim: Some(k8s_openapi::api::core::v1::PersistentVolumeClaimVolumeSource {
                    claim_name: params.pvc_name.clone(),
                    read_only: Some(false),
                }),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar { name: name.to_string(), value: Some(value.to_string()), ..Default::default() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worker_core::{Affinity, NodeSelectorRequirement, NodeSelectorTerm};

    fn base_params() -> PodParams {
        PodParams {
            pod_name: "abc123".to_string(),
            namespace: "olake".to_string(),
            image: "registry/connectors-postgres:latest".to_string(),
            args: vec!["sync".to_string()],
            workflow_id_sanitized: "abc123".to_string(),
            workflow_id_raw: "wf-42".to_string(),
            job_id: 42,
            connector_type: "postgres".to_string(),
            command: Command::Sync,
            pvc_name: "olake-workspaces".to_string(),
            sub_path: "abc123".to_string(),
            secret_key: "shh".to_string(),
            service_account: None,
            global_env_config_map: "olake-global-env".to_string(),
            node_selector: BTreeMap::new(),
            tolerations: Vec::new(),
            affinity: None,
            worker_identity: "worker-1".to_string(),
        }
    }

    #[test]
    fn pod_has_single_connector_container_with_never_restart() {
        let pod = build_pod(&base_params());
        let spec = pod.spec.unwrap();
        assert_eq!(spec.containers.len(), 1);
        assert_eq!(spec.containers[0].name, "connector");
        assert_eq!(spec.restart_policy.as_deref(), Some("Never"));
    }

    #[test]
    fn pod_volume_mount_uses_basename_subpath_on_shared_pvc() {
        let pod = build_pod(&base_params());
        let spec = pod.spec.unwrap();
        let mount = &spec.containers[0].volume_mounts.as_ref().unwrap()[0];
        assert_eq!(mount.mount_path, MOUNT_PATH);
        assert_eq!(mount.sub_path.as_deref(), Some("abc123"));
        let volume = &spec.volumes.as_ref().unwrap()[0];
        assert_eq!(volume.persistent_volume_claim.as_ref().unwrap().claim_name, "olake-workspaces");
    }

    #[test]
    fn sync_commands_get_liveness_probe_simple_commands_do_not() {
        let mut params = base_params();
        params.command = Command::Sync;
        let pod = build_pod(&params);
        assert!(pod.spec.unwrap().containers[0].liveness_probe.is_some());

        params.command = Command::Discover;
        let pod = build_pod(&params);
        assert!(pod.spec.unwrap().containers[0].liveness_probe.is_none());
    }

    #[test]
    fn labels_carry_sanitized_id_annotations_carry_raw_id() {
        let pod = build_pod(&base_params());
        let meta = pod.metadata;
        assert_eq!(
            meta.labels.as_ref().unwrap().get("olake.io/workflow-id").unwrap(),
            "abc123"
        );
        assert_eq!(
            meta.annotations.as_ref().unwrap().get("olake.io/workflow-id").unwrap(),
            "wf-42"
        );
    }

    #[test]
    fn service_account_only_set_when_configured() {
        let pod = build_pod(&base_params());
        assert!(pod.spec.unwrap().service_account_name.is_none());

        let mut params = base_params();
        params.service_account = Some("olake-job-runner".to_string());
        let pod = build_pod(&params);
        assert_eq!(pod.spec.unwrap().service_account_name.as_deref(), Some("olake-job-runner"));
    }

    #[test]
    fn affinity_translates_not_in_requirement() {
        let mut params = base_params();
        params.affinity = Some(Affinity {
            required_node_selector_terms: vec![NodeSelectorTerm {
                match_expressions: vec![NodeSelectorRequirement {
                    key: "pool".to_string(),
                    operator: NodeSelectorOperator::NotIn,
                    values: vec!["reserved".to_string()],
                }],
            }],
        });
        let pod = build_pod(&params);
        let spec = pod.spec.unwrap();
        let na = spec.affinity.unwrap().node_affinity.unwrap();
        let terms = na.required_during_scheduling_ignored_during_execution.unwrap().node_selector_terms;
        assert_eq!(terms[0].match_expressions.as_ref().unwrap()[0].operator, "NotIn");
    }

    #[test]
    fn empty_node_selector_and_tolerations_are_omitted() {
        let pod = build_pod(&base_params());
        let spec = pod.spec.unwrap();
        assert!(spec.node_selector.is_none());
        assert!(spec.tolerations.is_none());
    }
}
