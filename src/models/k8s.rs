use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

// Read-only views of the K8s documents we project. Every field is defaulted on
// its own: a missing or wrongly typed field falls back without taking its
// siblings with it.

fn lenient<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let v = Value::deserialize(d)?;
    Ok(T::deserialize(v).unwrap_or_default())
}

/// Like [`lenient`], but a bad element only resets that element.
fn lenient_seq<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    match Value::deserialize(d)? {
        Value::Array(items) => Ok(items
            .into_iter()
            .map(|item| T::deserialize(item).unwrap_or_default())
            .collect()),
        _ => Ok(Vec::new()),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub namespace: String,
    #[serde(default, deserialize_with = "lenient")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient")]
    pub creation_timestamp: Option<String>,
}

// --- Pod ---

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    #[serde(default, deserialize_with = "lenient")]
    pub spec: PodSpec,
    #[serde(default, deserialize_with = "lenient")]
    pub status: PodStatus,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default, deserialize_with = "lenient")]
    pub node_name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub containers: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    #[serde(default, deserialize_with = "lenient")]
    pub phase: String,
    #[serde(default, rename = "podIP", deserialize_with = "lenient")]
    pub pod_ip: String,
    #[serde(default, deserialize_with = "lenient_seq")]
    pub container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatus {
    #[serde(default, deserialize_with = "lenient")]
    pub ready: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub restart_count: i64,
}

// --- Workloads ---

/// Deployments and StatefulSets share the replica fields we care about.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Replicated {
    #[serde(default, deserialize_with = "lenient")]
    pub spec: ReplicatedSpec,
    #[serde(default, deserialize_with = "lenient")]
    pub status: ReplicatedStatus,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReplicatedSpec {
    #[serde(default, deserialize_with = "lenient")]
    pub replicas: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReplicatedStatus {
    #[serde(default, deserialize_with = "lenient")]
    pub ready_replicas: i64,
    #[serde(default, deserialize_with = "lenient")]
    pub available_replicas: i64,
    #[serde(default, deserialize_with = "lenient")]
    pub updated_replicas: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DaemonSet {
    #[serde(default, deserialize_with = "lenient")]
    pub status: DaemonSetStatus,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DaemonSetStatus {
    #[serde(default, deserialize_with = "lenient")]
    pub desired_number_scheduled: i64,
    #[serde(default, deserialize_with = "lenient")]
    pub current_number_scheduled: i64,
    #[serde(default, deserialize_with = "lenient")]
    pub number_ready: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(default, deserialize_with = "lenient")]
    pub spec: JobSpec,
    #[serde(default, deserialize_with = "lenient")]
    pub status: JobStatus,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    #[serde(default, deserialize_with = "lenient")]
    pub completions: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    #[serde(default, deserialize_with = "lenient")]
    pub active: i64,
    #[serde(default, deserialize_with = "lenient")]
    pub succeeded: i64,
    #[serde(default, deserialize_with = "lenient")]
    pub failed: i64,
    #[serde(default, deserialize_with = "lenient_seq")]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Condition {
    #[serde(default, rename = "type", deserialize_with = "lenient")]
    pub condition_type: String,
    #[serde(default, deserialize_with = "lenient")]
    pub status: String,
}

// --- Networking ---

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(default, deserialize_with = "lenient")]
    pub spec: ServiceSpec,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    #[serde(default, rename = "type", deserialize_with = "lenient")]
    pub service_type: String,
    #[serde(default, rename = "clusterIP", deserialize_with = "lenient")]
    pub cluster_ip: String,
    #[serde(default, rename = "externalIPs", deserialize_with = "lenient")]
    pub external_ips: Vec<String>,
    #[serde(default, deserialize_with = "lenient_seq")]
    pub ports: Vec<ServicePort>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    #[serde(default, deserialize_with = "lenient")]
    pub port: i64,
    #[serde(default, deserialize_with = "lenient")]
    pub protocol: String,
}

// --- Config and storage ---

/// ConfigMaps and Secrets: only key names are ever read.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct KeyedData {
    #[serde(default, rename = "type", deserialize_with = "lenient")]
    pub secret_type: String,
    #[serde(default, deserialize_with = "lenient")]
    pub data: BTreeMap<String, Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub binary_data: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeClaim {
    #[serde(default, deserialize_with = "lenient")]
    pub spec: ClaimSpec,
    #[serde(default, deserialize_with = "lenient")]
    pub status: ClaimStatus,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSpec {
    #[serde(default, deserialize_with = "lenient")]
    pub storage_class_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub access_modes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClaimStatus {
    #[serde(default, deserialize_with = "lenient")]
    pub phase: String,
    #[serde(default, deserialize_with = "lenient")]
    pub capacity: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Namespace {
    #[serde(default, deserialize_with = "lenient")]
    pub status: NamespaceStatus,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceStatus {
    #[serde(default, deserialize_with = "lenient")]
    pub phase: String,
}
