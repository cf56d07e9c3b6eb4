//! Background refresh of the resource cache.
//!
//! One loop: refresh every tracked kind, recompute metrics, sleep, repeat.
//! Stop is only observed between iterations, so an in-flight pass always runs
//! to completion and `stop` waits for it.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::cache::ResourceStore;
use crate::clients::ClusterSource;
use crate::error::RefreshError;
use crate::models::resource::{ResourceItem, ResourceKind};

/// Outcome of one pass over every tracked kind.
#[derive(Debug, Default)]
pub struct IterationReport {
    pub refreshed: Vec<(ResourceKind, usize)>,
    pub failed: Vec<(ResourceKind, RefreshError)>,
}

pub struct Synchronizer<S: ClusterSource> {
    inner: Arc<Inner<S>>,
    running: Mutex<Option<Running>>,
}

struct Inner<S> {
    store: ResourceStore,
    source: Option<Arc<S>>,
    kinds: Vec<ResourceKind>,
    interval: Duration,
}

struct Running {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl<S: ClusterSource> Synchronizer<S> {
    /// `source` is `None` when no cluster is reachable; every pass is then a no-op.
    pub fn new(
        store: ResourceStore,
        source: Option<Arc<S>>,
        kinds: Vec<ResourceKind>,
        interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                source,
                kinds,
                interval,
            }),
            running: Mutex::new(None),
        }
    }

    /// Spawns the refresh loop. Does nothing if it is already running.
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            debug!("synchronizer already running");
            return;
        }

        let (shutdown, rx) = watch::channel(false);
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move { inner.run(rx).await });
        info!(
            interval_secs = self.inner.interval.as_secs(),
            kinds = self.inner.kinds.len(),
            "synchronizer started"
        );
        *running = Some(Running { shutdown, handle });
    }

    /// Signals the loop and waits for the current iteration to finish.
    pub async fn stop(&self) {
        let Some(Running { shutdown, handle }) = self.running.lock().await.take() else {
            return;
        };
        let _ = shutdown.send(true);
        if let Err(e) = handle.await {
            warn!(error = %e, "synchronizer task ended abnormally");
        }
        info!("synchronizer stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// One synchronization pass, outside the background loop.
    pub async fn run_once(&self) -> IterationReport {
        self.inner.run_once().await
    }
}

impl<S: ClusterSource> Inner<S> {
    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            self.run_once().await;

            tokio::select! {
                _ = time::sleep(self.interval) => {}
                _ = shutdown.changed() => {
                    debug!("synchronizer loop exiting");
                    return;
                }
            }
        }
    }

    async fn run_once(&self) -> IterationReport {
        let mut report = IterationReport::default();
        let Some(source) = self.source.as_ref() else {
            debug!("no cluster source, skipping refresh");
            return report;
        };

        for &kind in &self.kinds {
            match self.refresh(source, kind).await {
                Ok(count) => report.refreshed.push((kind, count)),
                Err(e) => {
                    warn!(%kind, error = %e, "refresh failed, keeping cached data");
                    report.failed.push((kind, e));
                }
            }
        }

        if !report.refreshed.is_empty() {
            match self.store.call(|s| s.recompute_namespace_metrics()).await {
                Ok(n) => debug!(namespaces = n, "metrics recomputed"),
                Err(e) => warn!(error = %e, "metrics recompute failed"),
            }
        }

        info!(
            refreshed = report.refreshed.len(),
            failed = report.failed.len(),
            "synchronization pass complete"
        );
        report
    }

    async fn refresh(&self, source: &S, kind: ResourceKind) -> Result<usize, RefreshError> {
        let docs = source.list_all(kind).await?;

        let now = Utc::now();
        let items: Vec<ResourceItem> = docs
            .into_iter()
            .map(|raw| ResourceItem::from_raw(kind, raw, now))
            .collect();

        Ok(self.store.call(move |s| s.replace(kind, &items)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResourceQuery;
    use crate::error::ClusterError;
    use serde_json::{Value, json};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeSource {
        failing: std::sync::Mutex<HashSet<ResourceKind>>,
        calls: AtomicUsize,
        generation: AtomicUsize,
        delay: Duration,
    }

    impl FakeSource {
        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Default::default()
            }
        }

        fn fail(&self, kind: ResourceKind) {
            self.failing.lock().unwrap().insert(kind);
        }
    }

    impl ClusterSource for FakeSource {
        async fn list_all(&self, kind: ResourceKind) -> Result<Vec<Value>, ClusterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            time::sleep(self.delay).await;
            if self.failing.lock().unwrap().contains(&kind) {
                return Err(ClusterError::Decode("connection refused".into()));
            }
            let generation = self.generation.fetch_add(1, Ordering::SeqCst);
            Ok((0..2)
                .map(|i| {
                    json!({
                        "metadata": {
                            "name": format!("{kind}-{i}"),
                            "namespace": "team-a",
                            "labels": {"generation": generation.to_string()}
                        },
                        "spec": {"containers": [{"resources": {"requests": {"nvidia.com/gpu": "1"}}}]}
                    })
                })
                .collect())
        }
    }

    fn total(store: &ResourceStore, kind: ResourceKind) -> u64 {
        store.query(kind, &ResourceQuery::default()).unwrap().total
    }

    #[tokio::test]
    async fn run_once_refreshes_kinds_and_metrics() {
        let store = ResourceStore::open_in_memory().unwrap();
        let sync = Synchronizer::new(
            store.clone(),
            Some(Arc::new(FakeSource::default())),
            vec![ResourceKind::Pods, ResourceKind::Services],
            Duration::from_secs(3600),
        );

        let report = sync.run_once().await;
        assert_eq!(report.refreshed.len(), 2);
        assert!(report.failed.is_empty());
        assert_eq!(total(&store, ResourceKind::Pods), 2);
        assert_eq!(total(&store, ResourceKind::Services), 2);

        let metrics = store
            .list_namespace_metrics(crate::models::views::MetricType::Accelerator)
            .unwrap();
        assert_eq!(metrics[0].namespace, "team-a");
        assert_eq!(metrics[0].used, 2.0);
    }

    #[tokio::test]
    async fn failing_kind_does_not_block_others() {
        let store = ResourceStore::open_in_memory().unwrap();
        let source = Arc::new(FakeSource::default());
        let sync = Synchronizer::new(
            store.clone(),
            Some(source.clone()),
            vec![ResourceKind::Services, ResourceKind::Pods],
            Duration::from_secs(3600),
        );
        sync.run_once().await;
        let services_before = store.last_updated(ResourceKind::Services).unwrap();
        let pods_before = store.last_updated(ResourceKind::Pods).unwrap();
        let services_page = store
            .query(ResourceKind::Services, &ResourceQuery::default())
            .unwrap();

        source.fail(ResourceKind::Services);
        time::sleep(Duration::from_millis(5)).await;
        let report = sync.run_once().await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, ResourceKind::Services);
        assert!(matches!(report.failed[0].1, RefreshError::Cluster(_)));
        assert_eq!(report.refreshed, vec![(ResourceKind::Pods, 2)]);

        assert_eq!(store.last_updated(ResourceKind::Services).unwrap(), services_before);
        assert_eq!(
            store
                .query(ResourceKind::Services, &ResourceQuery::default())
                .unwrap()
                .items,
            services_page.items
        );
        assert!(store.last_updated(ResourceKind::Pods).unwrap() > pods_before);
    }

    #[tokio::test]
    async fn missing_source_is_idle() {
        let store = ResourceStore::open_in_memory().unwrap();
        let sync: Synchronizer<FakeSource> = Synchronizer::new(
            store.clone(),
            None,
            ResourceKind::all().collect(),
            Duration::from_secs(3600),
        );
        let report = sync.run_once().await;
        assert!(report.refreshed.is_empty());
        assert!(report.failed.is_empty());
        assert_eq!(total(&store, ResourceKind::Pods), 0);
        assert_eq!(store.last_updated(ResourceKind::Pods).unwrap(), None);
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_joins() {
        let store = ResourceStore::open_in_memory().unwrap();
        let source = Arc::new(FakeSource::default());
        let sync = Synchronizer::new(
            store.clone(),
            Some(source.clone()),
            vec![ResourceKind::Pods],
            Duration::from_secs(3600),
        );

        sync.start().await;
        sync.start().await;
        assert!(sync.is_running().await);

        for _ in 0..200 {
            if store.last_updated(ResourceKind::Pods).unwrap().is_some() {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }

        sync.stop().await;
        assert!(!sync.is_running().await);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(total(&store, ResourceKind::Pods), 2);

        // Stopping again is a no-op.
        sync.stop().await;
    }

    #[tokio::test]
    async fn stop_waits_for_in_flight_pass() {
        let store = ResourceStore::open_in_memory().unwrap();
        let source = Arc::new(FakeSource::slow(Duration::from_millis(50)));
        let kinds = vec![ResourceKind::Pods, ResourceKind::Services, ResourceKind::Jobs];
        let sync = Synchronizer::new(
            store.clone(),
            Some(source.clone()),
            kinds.clone(),
            Duration::from_secs(3600),
        );

        sync.start().await;
        while source.calls.load(Ordering::SeqCst) == 0 {
            time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(store.last_updated(ResourceKind::Jobs).unwrap(), None);

        let started = std::time::Instant::now();
        sync.stop().await;

        // The pass that was running when stop was requested finished every kind.
        assert!(started.elapsed() >= Duration::from_millis(50));
        for kind in kinds {
            assert!(store.last_updated(kind).unwrap().is_some(), "{kind} not refreshed");
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn store_failures_are_reported_apart_from_fetch_failures() {
        let store = ResourceStore::open_in_memory().unwrap();
        store
            .with_conn(|conn| Ok(conn.execute_batch("DROP TABLE resources")?))
            .unwrap();
        let sync = Synchronizer::new(
            store,
            Some(Arc::new(FakeSource::default())),
            vec![ResourceKind::Pods],
            Duration::from_secs(3600),
        );

        let report = sync.run_once().await;
        assert!(report.refreshed.is_empty());
        assert!(matches!(report.failed[0].1, RefreshError::Store(_)));
    }
}
