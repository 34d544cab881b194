//! API routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::handlers::files::{serve_upload, serve_video};
use crate::handlers::generations::{generate_video, generation_status};
use crate::handlers::health;
use crate::handlers::uploads::{analyze_product, upload_image};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_logging, security_headers, IpRateLimiter,
};
use crate::state::AppState;

/// Create the API router.
///
/// Returns the rate limiter as well so the server can prune it periodically.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> (Router, Arc<IpRateLimiter>) {
    let rate_limiter = Arc::new(IpRateLimiter::new(
        state.config.rate_limit_rps,
        state.config.rate_limit_burst,
    ));

    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/upload", post(upload_image))
        .route("/analyze-product", post(analyze_product))
        .route("/generate-video", post(generate_video))
        .route("/generation-status/:id", get(generation_status))
        .route("/files/:name", get(serve_upload))
        .route("/videos/:name", get(serve_video))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&rate_limiter),
            rate_limit_middleware,
        ));

    let metrics_routes = match metrics_handle {
        Some(handle) => Router::new().route("/metrics", get(move || async move { handle.render() })),
        None => Router::new(),
    };

    let router = Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health))
        .merge(metrics_routes)
        // Uploads are bounded by the body limit below, not the extractor default.
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_logging))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state);

    (router, rate_limiter)
}
