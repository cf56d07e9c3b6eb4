//! Read operations exposed to request handlers.

use crate::cache::{ResourceQuery, ResourceStore};
use crate::error::{QueryError, QueryResult};
use crate::models::resource::ResourceKind;
use crate::models::views::{
    AcceleratorPod, ListParams, MetricType, NamespaceMetricView, NamespaceView, Page,
};

pub const MAX_PAGE_SIZE: i64 = 1000;

#[derive(Clone)]
pub struct QueryService {
    store: ResourceStore,
}

impl QueryService {
    pub fn new(store: ResourceStore) -> Self {
        Self { store }
    }

    pub async fn list(&self, kind: ResourceKind, params: ListParams) -> QueryResult<Page> {
        let q = validate(params)?;
        Ok(self.store.call(move |s| s.query(kind, &q)).await?)
    }

    pub async fn last_updated(&self, kind: ResourceKind) -> QueryResult<Option<String>> {
        Ok(self.store.call(move |s| s.last_updated(kind)).await?)
    }

    pub async fn namespaces(&self) -> QueryResult<Vec<NamespaceView>> {
        Ok(self.store.call(|s| s.namespaces()).await?)
    }

    pub async fn namespace_metrics(&self, metric: MetricType) -> QueryResult<Vec<NamespaceMetricView>> {
        Ok(self
            .store
            .call(move |s| s.list_namespace_metrics(metric))
            .await?)
    }

    pub async fn accelerator_pods(&self) -> QueryResult<Vec<AcceleratorPod>> {
        Ok(self.store.call(|s| s.accelerator_bearing_pods()).await?)
    }
}

fn validate(params: ListParams) -> QueryResult<ResourceQuery> {
    if params.page < 1 {
        return Err(QueryError::InvalidInput(format!(
            "page must be >= 1, got {}",
            params.page
        )));
    }
    if params.page_size < 1 || params.page_size > MAX_PAGE_SIZE {
        return Err(QueryError::InvalidInput(format!(
            "page_size must be between 1 and {}, got {}",
            MAX_PAGE_SIZE, params.page_size
        )));
    }

    let sort_by = params.sort_by.filter(|s| !s.is_empty());
    if let Some(ref field) = sort_by {
        if !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(QueryError::InvalidInput(format!(
                "invalid sort field {:?}",
                field
            )));
        }
    }

    let namespace = Some(params.namespace).filter(|ns| !ns.is_empty() && ns != "all");
    let search = Some(params.search).filter(|s| !s.is_empty());

    Ok(ResourceQuery {
        namespace,
        search,
        page: params.page as u64,
        page_size: params.page_size as u64,
        sort_by,
        sort_desc: params.sort_desc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::pod;

    fn service() -> QueryService {
        let store = ResourceStore::open_in_memory().unwrap();
        store
            .replace(
                ResourceKind::Pods,
                &[
                    pod("team-a", "worker-1", Some("1")),
                    pod("team-b", "worker-2", None),
                ],
            )
            .unwrap();
        store.recompute_namespace_metrics().unwrap();
        QueryService::new(store)
    }

    #[tokio::test]
    async fn rejects_bad_pagination_before_storage() {
        let svc = service();
        for (page, page_size) in [(0, 10), (-1, 10), (1, 0), (1, -5), (1, MAX_PAGE_SIZE + 1)] {
            let params = ListParams {
                page,
                page_size,
                ..Default::default()
            };
            let err = svc.list(ResourceKind::Pods, params).await.unwrap_err();
            assert!(matches!(err, QueryError::InvalidInput(_)), "{page}/{page_size}");
        }
    }

    #[tokio::test]
    async fn rejects_unsafe_sort_field() {
        let svc = service();
        let params = ListParams {
            sort_by: Some("name; DROP TABLE resources".into()),
            ..Default::default()
        };
        assert!(matches!(
            svc.list(ResourceKind::Pods, params).await,
            Err(QueryError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn list_filters_by_search() {
        let svc = service();
        let params = ListParams {
            search: "team-a".into(),
            ..Default::default()
        };
        let page = svc.list(ResourceKind::Pods, params).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0]["metadata"]["name"], "worker-1");
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 50);
        assert_eq!(page.total_pages, 1);
    }

    #[tokio::test]
    async fn read_views_compose_store_operations() {
        let svc = service();
        assert!(svc.last_updated(ResourceKind::Pods).await.unwrap().is_some());
        assert_eq!(svc.last_updated(ResourceKind::Secrets).await.unwrap(), None);
        assert_eq!(svc.namespaces().await.unwrap().len(), 2);

        let metrics = svc.namespace_metrics(MetricType::Accelerator).await.unwrap();
        assert_eq!(metrics[0].namespace, "team-a");
        assert_eq!(metrics[0].used, 1.0);

        let gpus = svc.accelerator_pods().await.unwrap();
        assert_eq!(gpus.len(), 1);
        assert_eq!(gpus[0].name, "worker-1");
    }
}
