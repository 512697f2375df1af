//! Kubernetes API types.
//!
//! A minimal subset of the core/v1 Pod schema, plus the flattened
//! [`PodSummary`] returned by the tools.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// `PodList` from `GET /api/v1/.../pods`.
#[derive(Debug, Clone, Deserialize)]
pub struct PodList {
    #[serde(default)]
    pub items: Vec<Pod>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pod {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: Option<PodSpec>,
    #[serde(default)]
    pub status: Option<PodStatus>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub creation_timestamp: Option<String>,
    #[serde(default)]
    pub deletion_timestamp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default)]
    pub node_name: Option<String>,
    #[serde(default)]
    pub containers: Vec<Container>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Container {
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default, rename = "podIP")]
    pub pod_ip: Option<String>,
    #[serde(default)]
    pub container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatus {
    pub name: String,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub restart_count: u32,
}

/// `Status` object returned by failed API calls.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiStatus {
    #[serde(default)]
    pub message: Option<String>,
}

/// Pod as returned by the pod tools.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PodSummary {
    pub name: String,
    pub namespace: String,
    pub phase: String,
    /// Ready containers over total, e.g. `1/2`
    pub ready: String,
    pub restarts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub containers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl From<Pod> for PodSummary {
    fn from(pod: Pod) -> Self {
        let spec = pod.spec.unwrap_or(PodSpec {
            node_name: None,
            containers: Vec::new(),
        });
        let status = pod.status.unwrap_or(PodStatus {
            phase: None,
            pod_ip: None,
            container_statuses: Vec::new(),
        });

        let ready = status.container_statuses.iter().filter(|c| c.ready).count();
        let total = spec.containers.len().max(status.container_statuses.len());
        let phase = if pod.metadata.deletion_timestamp.is_some() {
            "Terminating".to_string()
        } else {
            status.phase.unwrap_or_else(|| "Unknown".to_string())
        };

        PodSummary {
            name: pod.metadata.name,
            namespace: pod.metadata.namespace.unwrap_or_default(),
            phase,
            ready: format!("{}/{}", ready, total),
            restarts: status.container_statuses.iter().map(|c| c.restart_count).sum(),
            node: spec.node_name,
            ip: status.pod_ip,
            containers: spec.containers.into_iter().map(|c| c.name).collect(),
            created: pod.metadata.creation_timestamp,
            labels: pod.metadata.labels,
        }
    }
}

/// Output of a command run inside a container.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExecOutput {
    pub pod: String,
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    pub command: Vec<String>,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}
