//! Per-kind projectors: raw K8s document in, flat summary map out.
//!
//! Projectors never fail. Fields that are missing or of the wrong type are
//! defaulted one by one; everything else in the document is still summarized.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::k8s;
use crate::helpers::{ACCELERATOR_RESOURCE, parse_age, resource_request};

fn decode<T: DeserializeOwned + Default>(raw: &Value) -> T {
    serde::Deserialize::deserialize(raw).unwrap_or_else(|e| {
        debug!(error = %e, "document is not an object, using defaults");
        T::default()
    })
}

/// Fields every kind carries.
fn base(raw: &Value, status: &str, now: DateTime<Utc>) -> Map<String, Value> {
    let meta: k8s::ObjectMeta = raw.get("metadata").map(decode).unwrap_or_default();
    let namespace = if meta.namespace.is_empty() {
        "default".to_string()
    } else {
        meta.namespace
    };
    let status = if status.is_empty() { "Unknown" } else { status };

    let mut m = Map::new();
    m.insert("name".into(), json!(meta.name));
    m.insert("namespace".into(), json!(namespace));
    m.insert("status".into(), json!(status));
    m.insert(
        "created".into(),
        json!(meta.creation_timestamp.clone().unwrap_or_default()),
    );
    m.insert(
        "age".into(),
        json!(parse_age(meta.creation_timestamp.as_deref(), now)),
    );
    m.insert("labels".into(), json!(meta.labels));
    m.insert("annotations".into(), json!(meta.annotations));
    m
}

pub fn pod(raw: &Value, now: DateTime<Utc>) -> Map<String, Value> {
    let pod: k8s::Pod = decode(raw);
    let mut m = base(raw, &pod.status.phase, now);

    let ready = pod
        .status
        .container_statuses
        .iter()
        .filter(|cs| cs.ready)
        .count();
    let restarts: i64 = pod
        .status
        .container_statuses
        .iter()
        .map(|cs| cs.restart_count)
        .sum();

    m.insert("phase".into(), json!(pod.status.phase));
    m.insert("containers".into(), json!(pod.spec.containers.len()));
    m.insert("ready".into(), json!(ready));
    m.insert("restarts".into(), json!(restarts));
    m.insert("node".into(), json!(pod.spec.node_name));
    m.insert("pod_ip".into(), json!(pod.status.pod_ip));
    m.insert(
        "accelerators".into(),
        json!(resource_request(raw, ACCELERATOR_RESOURCE)),
    );
    m.insert("cpu_request".into(), json!(resource_request(raw, "cpu")));
    m.insert("memory_request".into(), json!(resource_request(raw, "memory")));
    m
}

/// Deployments and StatefulSets.
pub fn replicated(raw: &Value, now: DateTime<Utc>) -> Map<String, Value> {
    let w: k8s::Replicated = decode(raw);
    let desired = w.spec.replicas.unwrap_or(1);
    let status = if w.status.ready_replicas >= desired {
        "Ready"
    } else {
        "Progressing"
    };

    let mut m = base(raw, status, now);
    m.insert("replicas".into(), json!(desired));
    m.insert("ready_replicas".into(), json!(w.status.ready_replicas));
    m.insert("available_replicas".into(), json!(w.status.available_replicas));
    m.insert("updated_replicas".into(), json!(w.status.updated_replicas));
    m
}

pub fn daemon_set(raw: &Value, now: DateTime<Utc>) -> Map<String, Value> {
    let ds: k8s::DaemonSet = decode(raw);
    let status = if ds.status.number_ready >= ds.status.desired_number_scheduled {
        "Ready"
    } else {
        "Progressing"
    };

    let mut m = base(raw, status, now);
    m.insert("desired".into(), json!(ds.status.desired_number_scheduled));
    m.insert("current".into(), json!(ds.status.current_number_scheduled));
    m.insert("ready".into(), json!(ds.status.number_ready));
    m
}

pub fn job(raw: &Value, now: DateTime<Utc>) -> Map<String, Value> {
    let job: k8s::Job = decode(raw);
    let finished = |t: &str| {
        job.status
            .conditions
            .iter()
            .any(|c| c.condition_type == t && c.status == "True")
    };
    let status = if finished("Complete") {
        "Complete"
    } else if finished("Failed") {
        "Failed"
    } else {
        "Running"
    };

    let mut m = base(raw, status, now);
    m.insert("completions".into(), json!(job.spec.completions.unwrap_or(1)));
    m.insert("succeeded".into(), json!(job.status.succeeded));
    m.insert("failed".into(), json!(job.status.failed));
    m.insert("active".into(), json!(job.status.active));
    m
}

pub fn service(raw: &Value, now: DateTime<Utc>) -> Map<String, Value> {
    let svc: k8s::Service = decode(raw);
    let ports: Vec<String> = svc
        .spec
        .ports
        .iter()
        .map(|p| {
            let proto = if p.protocol.is_empty() { "TCP" } else { p.protocol.as_str() };
            format!("{}/{}", p.port, proto)
        })
        .collect();
    let service_type = if svc.spec.service_type.is_empty() {
        "ClusterIP".to_string()
    } else {
        svc.spec.service_type
    };

    let mut m = base(raw, "Active", now);
    m.insert("type".into(), json!(service_type));
    m.insert("cluster_ip".into(), json!(svc.spec.cluster_ip));
    m.insert("external_ips".into(), json!(svc.spec.external_ips));
    m.insert("ports".into(), json!(ports));
    m
}

pub fn config_map(raw: &Value, now: DateTime<Utc>) -> Map<String, Value> {
    let cm: k8s::KeyedData = decode(raw);
    let mut m = base(raw, "Active", now);
    m.insert("keys".into(), json!(cm.data.len() + cm.binary_data.len()));
    m
}

/// Values are never copied into the summary, only the key count and type.
pub fn secret(raw: &Value, now: DateTime<Utc>) -> Map<String, Value> {
    let s: k8s::KeyedData = decode(raw);
    let mut m = base(raw, "Active", now);
    m.insert("keys".into(), json!(s.data.len()));
    m.insert("secret_type".into(), json!(s.secret_type));
    m
}

pub fn volume_claim(raw: &Value, now: DateTime<Utc>) -> Map<String, Value> {
    let pvc: k8s::PersistentVolumeClaim = decode(raw);
    let mut m = base(raw, &pvc.status.phase, now);
    m.insert("phase".into(), json!(pvc.status.phase));
    m.insert(
        "capacity".into(),
        json!(pvc.status.capacity.get("storage").cloned().unwrap_or_default()),
    );
    m.insert(
        "storage_class".into(),
        json!(pvc.spec.storage_class_name.unwrap_or_default()),
    );
    m.insert("access_modes".into(), json!(pvc.spec.access_modes));
    m
}

pub fn namespace(raw: &Value, now: DateTime<Utc>) -> Map<String, Value> {
    let ns: k8s::Namespace = decode(raw);
    let status = if ns.status.phase.is_empty() {
        "Active"
    } else {
        ns.status.phase.as_str()
    };
    base(raw, status, now)
}
