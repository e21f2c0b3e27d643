use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::middleware::{self, Next};
use axum::response::{Html, Response};
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::error::AppError;

pub mod billing;
pub mod enhance;
pub mod health;
pub mod metrics;

/// Build the full application router.
pub fn router(state: AppState, prometheus: Arc<PrometheusHandle>, body_limit: usize) -> Router {
    let enhance_routes = Router::new()
        .route(
            "/api/enhance",
            post(enhance::submit_enhancement).get(enhance::get_status),
        )
        .route("/api/enhance/status", get(enhance::get_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        // Capture page (embedded at compile time)
        .route("/", get(|| async { Html(include_str!("../../static/index.html")) }))
        .route("/health", get(health::health_check))
        .route("/api/stripe/config", get(billing::stripe_config))
        .merge(enhance_routes)
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(metrics::prometheus_metrics).with_state(prometheus),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
}

/// Reject requests without a valid session when auth is configured.
async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(verifier) = &state.auth {
        let claims = verifier.verify_headers(request.headers()).map_err(|e| {
            tracing::debug!(error = %e, "Session rejected");
            AppError::Unauthorized
        })?;
        tracing::debug!(user_id = %claims.sub, "Session verified");
        request.extensions_mut().insert(claims);
    }

    Ok(next.run(request).await)
}
