pub mod credentials;

use kube::Client;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ClusterError;
use crate::models::resource::ResourceKind;

/// Where the synchronizer pulls resource collections from.
pub trait ClusterSource: Send + Sync + 'static {
    /// Every object of `kind` across all namespaces. Any transport or auth
    /// problem is an error; a partial list is never returned.
    fn list_all(
        &self,
        kind: ResourceKind,
    ) -> impl Future<Output = Result<Vec<Value>, ClusterError>> + Send;
}

pub struct KubeClient {
    client: Client,
}

impl KubeClient {
    pub fn new(config: kube::Config) -> Result<Self, ClusterError> {
        Ok(Self {
            client: Client::try_from(config)?,
        })
    }

    /// In-cluster credentials first, then kubeconfig. `None` when neither works;
    /// the cache then runs without a source.
    pub async fn discover(cfg: &Config) -> Option<Self> {
        let timeout = Duration::from_secs(cfg.request_timeout_secs);

        let config = match credentials::resolve(cfg.kubeconfig.as_deref(), timeout).await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "no cluster credentials");
                return None;
            }
        };
        let server = config.cluster_url.to_string();

        match Self::new(config) {
            Ok(c) => {
                info!(%server, "cluster client ready");
                Some(c)
            }
            Err(e) => {
                warn!(%server, error = %e, "failed to build cluster client");
                None
            }
        }
    }
}

fn api_resource(kind: ResourceKind) -> ApiResource {
    let spec = kind.spec();
    let gvk = GroupVersionKind::gvk(spec.group, spec.version, spec.type_name);
    ApiResource::from_gvk_with_plural(&gvk, spec.name)
}

impl ClusterSource for KubeClient {
    async fn list_all(&self, kind: ResourceKind) -> Result<Vec<Value>, ClusterError> {
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &api_resource(kind));

        let list = api.list(&ListParams::default()).await.map_err(|e| match e {
            kube::Error::Api(resp) => ClusterError::Status {
                path: kind.api_path(),
                code: resp.code,
                message: resp.message,
            },
            other => ClusterError::Kube(other),
        })?;
        debug!(%kind, count = list.items.len(), "listed resources");

        list.items
            .into_iter()
            .map(|obj| {
                serde_json::to_value(obj)
                    .map_err(|e| ClusterError::Decode(format!("{} item: {}", kind, e)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_resources_address_collection_paths() {
        let ar = api_resource(ResourceKind::StatefulSets);
        assert_eq!(ar.api_version, "apps/v1");
        assert_eq!(ar.kind, "StatefulSet");
        assert_eq!(ar.plural, "statefulsets");

        let ar = api_resource(ResourceKind::PersistentVolumeClaims);
        assert_eq!(ar.group, "");
        assert_eq!(ar.api_version, "v1");
        assert_eq!(ar.plural, "persistentvolumeclaims");
    }
}
