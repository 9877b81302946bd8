//! GeoTIFF viewer service library.
//!
//! Exposes the router and its parts so the binary and the integration tests
//! assemble the same service.

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod state;
pub mod validation;
pub mod workflow;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Extension},
    routing::{any, get},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

pub use config::ViewerConfig;
pub use state::AppState;

/// Build the HTTP router over shared state.
pub fn build_router(state: Arc<AppState>, prometheus_handle: PrometheusHandle) -> Router {
    let media = ServeDir::new(&state.config.media_root);
    let media_mount = state.config.media_mount().to_string();
    let body_limit = state.config.request_body_limit();

    Router::new()
        // Upload form and gallery
        .route(
            "/viewer/upload",
            get(handlers::gallery_handler).post(handlers::upload_handler),
        )
        // Composite merge; non-POST methods get a JSON error
        .route("/viewer/convert", any(handlers::convert_handler))
        // Health check
        .route("/health", get(handlers::health_handler))
        .route("/ready", get(handlers::ready_handler))
        // Metrics
        .route("/metrics", get(handlers::metrics_handler))
        // Uploaded rasters, previews and the composite
        .nest_service(&media_mount, media)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(Extension(state))
        .layer(Extension(prometheus_handle))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
