use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::projection;

/// Builds the flattened summary for one raw document.
pub type Projector = fn(&Value, DateTime<Utc>) -> Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Pods,
    Services,
    Deployments,
    StatefulSets,
    DaemonSets,
    Jobs,
    ConfigMaps,
    Secrets,
    PersistentVolumeClaims,
    Namespaces,
}

/// Registry entry: everything the cache needs to know about one kind.
pub struct KindSpec {
    pub kind: ResourceKind,
    /// Plural resource name; doubles as the cache's type key.
    pub name: &'static str,
    /// API group, empty for the core group.
    pub group: &'static str,
    pub version: &'static str,
    pub type_name: &'static str,
    pub projector: Projector,
}

static PODS: KindSpec = KindSpec {
    kind: ResourceKind::Pods,
    name: "pods",
    group: "",
    version: "v1",
    type_name: "Pod",
    projector: projection::pod,
};

static SERVICES: KindSpec = KindSpec {
    kind: ResourceKind::Services,
    name: "services",
    group: "",
    version: "v1",
    type_name: "Service",
    projector: projection::service,
};

static DEPLOYMENTS: KindSpec = KindSpec {
    kind: ResourceKind::Deployments,
    name: "deployments",
    group: "apps",
    version: "v1",
    type_name: "Deployment",
    projector: projection::replicated,
};

static STATEFUL_SETS: KindSpec = KindSpec {
    kind: ResourceKind::StatefulSets,
    name: "statefulsets",
    group: "apps",
    version: "v1",
    type_name: "StatefulSet",
    projector: projection::replicated,
};

static DAEMON_SETS: KindSpec = KindSpec {
    kind: ResourceKind::DaemonSets,
    name: "daemonsets",
    group: "apps",
    version: "v1",
    type_name: "DaemonSet",
    projector: projection::daemon_set,
};

static JOBS: KindSpec = KindSpec {
    kind: ResourceKind::Jobs,
    name: "jobs",
    group: "batch",
    version: "v1",
    type_name: "Job",
    projector: projection::job,
};

static CONFIG_MAPS: KindSpec = KindSpec {
    kind: ResourceKind::ConfigMaps,
    name: "configmaps",
    group: "",
    version: "v1",
    type_name: "ConfigMap",
    projector: projection::config_map,
};

static SECRETS: KindSpec = KindSpec {
    kind: ResourceKind::Secrets,
    name: "secrets",
    group: "",
    version: "v1",
    type_name: "Secret",
    projector: projection::secret,
};

static VOLUME_CLAIMS: KindSpec = KindSpec {
    kind: ResourceKind::PersistentVolumeClaims,
    name: "persistentvolumeclaims",
    group: "",
    version: "v1",
    type_name: "PersistentVolumeClaim",
    projector: projection::volume_claim,
};

static NAMESPACES: KindSpec = KindSpec {
    kind: ResourceKind::Namespaces,
    name: "namespaces",
    group: "",
    version: "v1",
    type_name: "Namespace",
    projector: projection::namespace,
};

pub static REGISTRY: &[&KindSpec] = &[
    &PODS,
    &SERVICES,
    &DEPLOYMENTS,
    &STATEFUL_SETS,
    &DAEMON_SETS,
    &JOBS,
    &CONFIG_MAPS,
    &SECRETS,
    &VOLUME_CLAIMS,
    &NAMESPACES,
];

impl ResourceKind {
    pub fn all() -> impl Iterator<Item = ResourceKind> {
        REGISTRY.iter().map(|s| s.kind)
    }

    pub fn spec(self) -> &'static KindSpec {
        match self {
            ResourceKind::Pods => &PODS,
            ResourceKind::Services => &SERVICES,
            ResourceKind::Deployments => &DEPLOYMENTS,
            ResourceKind::StatefulSets => &STATEFUL_SETS,
            ResourceKind::DaemonSets => &DAEMON_SETS,
            ResourceKind::Jobs => &JOBS,
            ResourceKind::ConfigMaps => &CONFIG_MAPS,
            ResourceKind::Secrets => &SECRETS,
            ResourceKind::PersistentVolumeClaims => &VOLUME_CLAIMS,
            ResourceKind::Namespaces => &NAMESPACES,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.spec().name
    }

    /// Cluster-wide collection path on the API server.
    pub fn api_path(self) -> String {
        let spec = self.spec();
        if spec.group.is_empty() {
            format!("/api/{}/{}", spec.version, spec.name)
        } else {
            format!("/apis/{}/{}/{}", spec.group, spec.version, spec.name)
        }
    }

    pub fn project(self, raw: &Value, now: DateTime<Utc>) -> Map<String, Value> {
        (self.spec().projector)(raw, now)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        REGISTRY
            .iter()
            .find(|spec| spec.name.eq_ignore_ascii_case(s))
            .map(|spec| spec.kind)
            .ok_or_else(|| format!("unknown resource kind {:?}", s))
    }
}

/// One document ready to be written by `ResourceStore::replace`.
#[derive(Debug, Clone)]
pub struct ResourceItem {
    pub namespace: String,
    pub name: String,
    pub raw: Value,
    pub projection: Map<String, Value>,
}

impl ResourceItem {
    pub fn from_raw(kind: ResourceKind, raw: Value, now: DateTime<Utc>) -> Self {
        let metadata = raw.get("metadata");
        let namespace = metadata
            .and_then(|m| m.get("namespace"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or("default")
            .to_string();
        let name = metadata
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let mut projection = kind.project(&raw, now);
        // Keep the summary keyed the same way as the stored row.
        projection.insert("name".into(), Value::String(name.clone()));
        projection.insert("namespace".into(), Value::String(namespace.clone()));
        Self {
            namespace,
            name,
            raw,
            projection,
        }
    }

    pub fn id(&self, kind: ResourceKind) -> String {
        format!("{}:{}:{}", kind, self.namespace, self.name)
    }
}
