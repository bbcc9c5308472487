//! The ambient `GET /health` / `GET /metrics` surface (§2A): just enough
//! HTTP for the observability stack to have somewhere to live. The full REST
//! vocabulary for node/group/tag CRUD is out of scope per §1.

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use neu_core::metrics::{MetricsRegistry, NodeSummary};
use neu_scheduler::NodeRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<NodeRegistry>,
    pub metrics: Arc<MetricsRegistry>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn metrics(axum::extract::State(state): axum::extract::State<AppState>) -> Json<Value> {
    let summaries: Vec<NodeSummary> = state
        .registry
        .all_nodes()
        .into_iter()
        .map(|n| NodeSummary {
            node_id: n.node_id,
            node_type: n.node_type,
            running_state: n.running_state,
            link_state: n.link_state,
        })
        .collect();
    let snapshot = state.metrics.snapshot(&summaries);
    Json(serde_json::to_value(snapshot).unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn state() -> AppState {
        AppState {
            registry: Arc::new(NodeRegistry::new()),
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = build_router(state());
        let res = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_reports_empty_snapshot_with_no_nodes() {
        let app = build_router(state());
        let res = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
