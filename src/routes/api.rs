use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::AppState;
use crate::error::QueryError;
use crate::models::resource::ResourceKind;
use crate::models::views::{ListParams, MetricType};

#[derive(Debug, Serialize)]
pub struct LastUpdated {
    pub resource_type: String,
    pub last_updated: Option<String>,
}

fn error_response(e: QueryError) -> Response {
    match e {
        QueryError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
        QueryError::Store(e) => {
            tracing::error!(error = %e, "cache read failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

fn parse_kind(kind: &str) -> Result<ResourceKind, Response> {
    kind.parse()
        .map_err(|msg: String| (StatusCode::BAD_REQUEST, msg).into_response())
}

pub async fn handle_list_resources(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<ListParams>,
) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    match state.query.list(kind, params).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn handle_last_updated(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    match state.query.last_updated(kind).await {
        Ok(last_updated) => Json(LastUpdated {
            resource_type: kind.to_string(),
            last_updated,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn handle_namespaces(State(state): State<AppState>) -> Response {
    match state.query.namespaces().await {
        Ok(namespaces) => Json(namespaces).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn handle_namespace_metrics(
    State(state): State<AppState>,
    Path(metric_type): Path<String>,
) -> Response {
    let metric: MetricType = match metric_type.parse() {
        Ok(m) => m,
        Err(msg) => return (StatusCode::BAD_REQUEST, msg).into_response(),
    };
    match state.query.namespace_metrics(metric).await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn handle_accelerator_pods(State(state): State<AppState>) -> Response {
    match state.query.accelerator_pods().await {
        Ok(pods) => Json(pods).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn handle_healthz() -> &'static str {
    "ok\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResourceStore;
    use crate::cache::tests::pod;
    use crate::query::QueryService;
    use axum::body::to_bytes;

    fn state() -> AppState {
        let store = ResourceStore::open_in_memory().unwrap();
        store
            .replace(ResourceKind::Pods, &[pod("team-a", "worker-1", Some("1"))])
            .unwrap();
        AppState {
            query: QueryService::new(store),
        }
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn list_returns_page() {
        let resp = handle_list_resources(
            State(state()),
            Path("pods".to_string()),
            Query(ListParams::default()),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["total_pages"], 1);
        assert_eq!(body["items"][0]["projection"]["accelerators"], "1");
    }

    #[tokio::test]
    async fn bad_input_is_400() {
        let resp = handle_list_resources(
            State(state()),
            Path("widgets".to_string()),
            Query(ListParams::default()),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let params = ListParams {
            page: 0,
            ..Default::default()
        };
        let resp =
            handle_list_resources(State(state()), Path("pods".to_string()), Query(params)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = handle_namespace_metrics(State(state()), Path("gpu".to_string())).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn last_updated_is_null_before_first_refresh() {
        let resp = handle_last_updated(State(state()), Path("secrets".to_string())).await;
        let body = body_json(resp).await;
        assert_eq!(body["resource_type"], "secrets");
        assert!(body["last_updated"].is_null());
    }
}
