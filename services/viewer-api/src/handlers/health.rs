//! Health, readiness and Prometheus metrics.

use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::warn;

use crate::state::AppState;

/// GET /health - Basic health check
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /ready - Readiness check (verifies database connectivity)
pub async fn ready_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    match state.catalog.ping().await {
        Ok(()) => (StatusCode::OK, "Ready"),
        Err(e) => {
            warn!(error = %e, "Catalog not reachable");
            (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
        }
    }
}

/// GET /metrics - Prometheus metrics endpoint
pub async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        handle.render(),
    )
}
