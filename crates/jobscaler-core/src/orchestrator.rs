//! Orchestrator Probe / Job Launcher / Job Terminator: the Kubernetes-facing
//! side of the controller. All state observed here is advisory, not
//! authoritative - the cluster is.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::batch::v1::Job as K8sJob;
use k8s_openapi::api::core::v1::{Event, Node, Pod};
use kube::api::{DeleteParams, ListParams, LogParams, PostParams, PropagationPolicy};
use kube::{Api, Client};
use rand::Rng;

use crate::model::{JobPhase, JobTypeSpec, WorkerJobRecord};
use crate::{Error, Result};

pub const WORKER_LABEL: &str = "worker-role=true";
const TYPE_LABEL_KEY: &str = "type";

/// A node summary for `/cluster-info`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct NodeInfo {
    pub name: String,
    pub status: String,
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub os: Option<String>,
    pub kernel: Option<String>,
}

/// An event summary for `/cluster-info`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EventInfo {
    pub event_type: String,
    pub reason: String,
    pub message: String,
    pub object: String,
    pub time: String,
}

/// A pod summary for `/cluster-info`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PodInfo {
    pub name: String,
    pub status: String,
    pub ip: Option<String>,
    pub node: Option<String>,
    pub restarts: i32,
}

/// The cluster-wide snapshot served by `/cluster-info`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ClusterInfo {
    pub nodes: Vec<NodeInfo>,
    pub events: Vec<EventInfo>,
    pub pods: Vec<PodInfo>,
}

/// Specification for a worker job to launch, as handed to
/// [`OrchestratorClient::create_job`].
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub job_name: String,
    pub type_id: String,
    pub image: String,
    pub queue: String,
    pub pull_secret: Option<String>,
    pub broker_host: String,
    pub report_url: String,
    pub logs_root: String,
}

/// Adapter over the container orchestrator. Tests inject fakes.
#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    async fn list_worker_jobs(&self) -> Result<Vec<WorkerJobRecord>>;
    async fn create_job(&self, spec: &JobSpec) -> Result<()>;
    async fn delete_job(&self, name: &str) -> Result<()>;
    async fn pod_log_tail(&self, job_name: &str, since_minutes: u32) -> Result<Option<String>>;
    async fn cluster_info(&self) -> Result<ClusterInfo>;
}

/// Real `kube`-backed [`OrchestratorClient`].
pub struct KubeOrchestratorClient {
    client: Client,
    namespace: String,
}

impl KubeOrchestratorClient {
    pub async fn new(namespace: impl Into<String>) -> Result<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| Error::orchestrator(format!("failed to build kube client: {e}")))?;
        Ok(Self {
            client,
            namespace: namespace.into(),
        })
    }

    fn jobs_api(&self) -> Api<K8sJob> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn pods_api(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

fn record_from_k8s_job(job: &K8sJob) -> WorkerJobRecord {
    let status = job.status.clone().unwrap_or_default();
    let succeeded = status.succeeded.unwrap_or(0);
    let failed = status.failed.unwrap_or(0);
    let active = status.active.unwrap_or(0);

    let type_id = job
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(TYPE_LABEL_KEY))
        .cloned()
        .unwrap_or_else(|| "unknown".to_string());

    WorkerJobRecord {
        name: job.metadata.name.clone().unwrap_or_default(),
        type_id,
        start_time: status.start_time.map(|t| t.0),
        creation_time: job.metadata.creation_timestamp.clone().map(|t| t.0),
        phase: JobPhase::from_counts(succeeded, failed, active),
        active_count: active,
        succeeded_count: succeeded,
        failed_count: failed,
        terminating: job.metadata.deletion_timestamp.is_some(),
        processed: 0,
    }
}

#[async_trait]
impl OrchestratorClient for KubeOrchestratorClient {
    async fn list_worker_jobs(&self) -> Result<Vec<WorkerJobRecord>> {
        let params = ListParams::default().labels(WORKER_LABEL).timeout(15);
        let jobs = self.jobs_api().list(&params).await?;
        Ok(jobs.items.iter().map(record_from_k8s_job).collect())
    }

    async fn create_job(&self, spec: &JobSpec) -> Result<()> {
        let job = build_job_manifest(spec);
        self.jobs_api().create(&PostParams::default(), &job).await?;
        Ok(())
    }

    async fn delete_job(&self, name: &str) -> Result<()> {
        let params = DeleteParams {
            propagation_policy: Some(PropagationPolicy::Background),
            ..Default::default()
        };
        self.jobs_api().delete(name, &params).await?;
        Ok(())
    }

    async fn pod_log_tail(&self, job_name: &str, since_minutes: u32) -> Result<Option<String>> {
        let selector = format!("job-name={job_name}");
        let params = ListParams::default().labels(&selector);
        let pods = self.pods_api().list(&params).await?;

        let Some(pod) = pods.items.first() else {
            return Ok(None);
        };
        let pod_name = pod.metadata.name.clone().unwrap_or_default();

        let log_params = LogParams {
            since_seconds: if since_minutes > 0 {
                Some(since_minutes as i64 * 60)
            } else {
                None
            },
            ..Default::default()
        };

        let logs = self.pods_api().logs(&pod_name, &log_params).await?;
        Ok(Some(logs))
    }

    async fn cluster_info(&self) -> Result<ClusterInfo> {
        let nodes_api: Api<Node> = Api::all(self.client.clone());
        let events_api: Api<Event> = Api::namespaced(self.client.clone(), &self.namespace);

        let nodes = nodes_api.list(&ListParams::default()).await?;
        let events = events_api.list(&ListParams::default()).await?;
        let pods = self.pods_api().list(&ListParams::default()).await?;

        let node_data = nodes
            .items
            .iter()
            .map(|n| {
                let ready = n
                    .status
                    .as_ref()
                    .and_then(|s| s.conditions.as_ref())
                    .and_then(|c| c.last())
                    .map(|c| c.type_ == "Ready" && c.status == "True")
                    .unwrap_or(false);
                NodeInfo {
                    name: n.metadata.name.clone().unwrap_or_default(),
                    status: if ready { "Ready".to_string() } else { "NotReady".to_string() },
                    cpu: n
                        .status
                        .as_ref()
                        .and_then(|s| s.capacity.as_ref())
                        .and_then(|c| c.get("cpu"))
                        .map(|q| q.0.clone()),
                    memory: n
                        .status
                        .as_ref()
                        .and_then(|s| s.capacity.as_ref())
                        .and_then(|c| c.get("memory"))
                        .map(|q| q.0.clone()),
                    os: n
                        .status
                        .as_ref()
                        .and_then(|s| s.node_info.as_ref())
                        .map(|ni| ni.os_image.clone()),
                    kernel: n
                        .status
                        .as_ref()
                        .and_then(|s| s.node_info.as_ref())
                        .map(|ni| ni.kernel_version.clone()),
                }
            })
            .collect();

        let mut sorted_events: Vec<&Event> = events.items.iter().collect();
        sorted_events.sort_by(|a, b| event_timestamp(b).cmp(&event_timestamp(a)));
        sorted_events.truncate(20);

        let event_data = sorted_events
            .into_iter()
            .map(|e| EventInfo {
                event_type: e.type_.clone().unwrap_or_default(),
                reason: e.reason.clone().unwrap_or_default(),
                message: e.message.clone().unwrap_or_default(),
                object: format!(
                    "{}/{}",
                    e.involved_object.kind.clone().unwrap_or_default(),
                    e.involved_object.name.clone().unwrap_or_default()
                ),
                time: event_timestamp(e)
                    .map(|t| t.format("%H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            })
            .collect();

        let pod_data = pods
            .items
            .iter()
            .map(|p| PodInfo {
                name: p.metadata.name.clone().unwrap_or_default(),
                status: p
                    .status
                    .as_ref()
                    .and_then(|s| s.phase.clone())
                    .unwrap_or_default(),
                ip: p.status.as_ref().and_then(|s| s.pod_ip.clone()),
                node: p.spec.as_ref().and_then(|s| s.node_name.clone()),
                restarts: p
                    .status
                    .as_ref()
                    .and_then(|s| s.container_statuses.as_ref())
                    .map(|cs| cs.iter().map(|c| c.restart_count).sum())
                    .unwrap_or(0),
            })
            .collect();

        Ok(ClusterInfo {
            nodes: node_data,
            events: event_data,
            pods: pod_data,
        })
    }
}

fn event_timestamp(event: &Event) -> Option<DateTime<Utc>> {
    if let Some(t) = &event.last_timestamp {
        return Some(t.0);
    }
    if let Some(t) = &event.event_time {
        return Some(t.0);
    }
    event.first_timestamp.as_ref().map(|t| t.0)
}

fn build_job_manifest(spec: &JobSpec) -> K8sJob {
    use k8s_openapi::api::batch::v1::JobSpec as K8sJobSpec;
    use k8s_openapi::api::core::v1::{
        Container, EnvVar, HostPathVolumeSource, LocalObjectReference, PodSpec, PodTemplateSpec,
        Volume, VolumeMount,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    let mut labels = BTreeMap::new();
    labels.insert("worker-role".to_string(), "true".to_string());
    labels.insert(TYPE_LABEL_KEY.to_string(), spec.type_id.clone());

    let env = vec![
        EnvVar {
            name: "BROKER_HOST".to_string(),
            value: Some(spec.broker_host.clone()),
            ..Default::default()
        },
        EnvVar {
            name: "CONTROLLER_REPORT_URL".to_string(),
            value: Some(spec.report_url.clone()),
            ..Default::default()
        },
        EnvVar {
            name: "JOB_NAME".to_string(),
            value: Some(spec.job_name.clone()),
            ..Default::default()
        },
        EnvVar {
            name: "JOB_TYPE".to_string(),
            value: Some(spec.type_id.clone()),
            ..Default::default()
        },
        EnvVar {
            name: "QUEUE_NAME".to_string(),
            value: Some(spec.queue.clone()),
            ..Default::default()
        },
    ];

    let image_pull_secrets = spec.pull_secret.as_ref().map(|secret| {
        vec![LocalObjectReference {
            name: Some(secret.clone()),
        }]
    });

    K8sJob {
        metadata: ObjectMeta {
            name: Some(spec.job_name.clone()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(K8sJobSpec {
            ttl_seconds_after_finished: Some(60),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    restart_policy: Some("OnFailure".to_string()),
                    image_pull_secrets,
                    volumes: Some(vec![Volume {
                        name: "logs-volume".to_string(),
                        host_path: Some(HostPathVolumeSource {
                            path: spec.logs_root.clone(),
                            type_: Some("DirectoryOrCreate".to_string()),
                        }),
                        ..Default::default()
                    }]),
                    containers: vec![Container {
                        name: "worker".to_string(),
                        image: Some(spec.image.clone()),
                        image_pull_policy: Some("IfNotPresent".to_string()),
                        env: Some(env),
                        volume_mounts: Some(vec![VolumeMount {
                            name: "logs-volume".to_string(),
                            mount_path: "/logs".to_string(),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Generate a `"{type_id}-{6-hex-random}"` job name.
pub fn generate_job_name(type_id: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| std::char::from_digit(rng.gen_range(0..16), 16).unwrap())
        .collect();
    format!("{type_id}-{suffix}")
}

/// Build a [`JobSpec`] from a catalog entry for the given job name.
pub fn job_spec_for(
    job_name: String,
    job_type: &JobTypeSpec,
    broker_host: &str,
    report_url: &str,
    logs_root: &str,
) -> JobSpec {
    JobSpec {
        job_name,
        type_id: job_type.type_id.clone(),
        image: job_type.image.clone(),
        queue: job_type.queue.clone(),
        pull_secret: job_type.pull_secret.clone(),
        broker_host: broker_host.to_string(),
        report_url: report_url.to_string(),
        logs_root: logs_root.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_name_has_expected_shape() {
        let name = generate_job_name("spend-analysis");
        assert!(name.starts_with("spend-analysis-"));
        assert_eq!(name.len(), "spend-analysis-".len() + 6);
    }
}
