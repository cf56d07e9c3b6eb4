pub mod api;

use axum::{Router, routing::get};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Cached resources
        .route("/api/resources/{kind}", get(api::handle_list_resources))
        .route(
            "/api/resources/{kind}/last-updated",
            get(api::handle_last_updated),
        )
        // Namespaces and utilization
        .route("/api/namespaces", get(api::handle_namespaces))
        .route("/api/metrics/{metric_type}", get(api::handle_namespace_metrics))
        .route("/api/accelerators", get(api::handle_accelerator_pods))
        // Health
        .route("/healthz", get(api::handle_healthz))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
