//! Resolves how to reach the API server: in-cluster service account first,
//! then a kubeconfig.
//!
//! Kubeconfig handling (contexts, exec plugins, certificate files relative to
//! the kubeconfig, `tls-server-name`) is left to `kube`.

use kube::config::{KubeConfigOptions, Kubeconfig};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::ClusterError;

/// `explicit` overrides the usual `$KUBECONFIG` / `~/.kube/config` lookup.
pub async fn resolve(
    explicit: Option<&Path>,
    timeout: Duration,
) -> Result<kube::Config, ClusterError> {
    match kube::Config::incluster() {
        Ok(config) => Ok(with_timeouts(config, timeout)),
        Err(in_cluster) => {
            debug!(error = %in_cluster, "not running in-cluster, trying kubeconfig");
            match explicit {
                Some(path) => from_kubeconfig(path, timeout).await,
                None => load(Kubeconfig::read()?, timeout).await,
            }
        }
    }
}

/// Current context of the kubeconfig at `path`.
pub async fn from_kubeconfig(path: &Path, timeout: Duration) -> Result<kube::Config, ClusterError> {
    load(Kubeconfig::read_from(path)?, timeout).await
}

async fn load(kubeconfig: Kubeconfig, timeout: Duration) -> Result<kube::Config, ClusterError> {
    let config =
        kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
    Ok(with_timeouts(config, timeout))
}

fn with_timeouts(mut config: kube::Config, timeout: Duration) -> kube::Config {
    config.connect_timeout = Some(timeout);
    config.read_timeout = Some(timeout);
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    const KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
current-context: eks
clusters:
  - name: staging-cluster
    cluster:
      server: https://staging.example:6443
      insecure-skip-tls-verify: true
  - name: eks-cluster
    cluster:
      server: https://eks.example:443
      insecure-skip-tls-verify: true
contexts:
  - name: staging
    context:
      cluster: staging-cluster
      user: dev
  - name: eks
    context:
      cluster: eks-cluster
      user: eks-user
users:
  - name: dev
    user:
      token: dev-token
  - name: eks-user
    user:
      exec:
        apiVersion: client.authentication.k8s.io/v1beta1
        command: aws
        args: ["eks", "get-token", "--cluster-name", "prod"]
"#;

    fn write_kubeconfig(data: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, data).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn current_context_keeps_exec_auth() {
        let (_dir, path) = write_kubeconfig(KUBECONFIG);
        let timeout = Duration::from_secs(7);
        let config = from_kubeconfig(&path, timeout).await.unwrap();

        assert_eq!(config.cluster_url.host(), Some("eks.example"));
        assert!(config.auth_info.exec.is_some());
        assert!(config.auth_info.token.is_none());
        assert_eq!(config.read_timeout, Some(timeout));
        assert_eq!(config.connect_timeout, Some(timeout));
    }

    #[tokio::test]
    async fn token_user_is_loaded() {
        let (_dir, path) =
            write_kubeconfig(&KUBECONFIG.replace("current-context: eks", "current-context: staging"));
        let config = from_kubeconfig(&path, Duration::from_secs(30)).await.unwrap();

        assert_eq!(config.cluster_url.host(), Some("staging.example"));
        assert!(config.auth_info.token.is_some());
        assert!(config.accept_invalid_certs);
    }

    #[tokio::test]
    async fn missing_kubeconfig_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = from_kubeconfig(&dir.path().join("nope"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::Kubeconfig(_)));
    }
}
