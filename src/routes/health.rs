use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::services::store::JobStore;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub mode: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub job_store: ComponentHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub latency_ms: Option<u64>,
}

/// GET /health — liveness plus job store connectivity in local mode.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let start = std::time::Instant::now();

    let store_check = match state.enhance.store() {
        None => ComponentHealth {
            status: "disabled".to_string(),
            latency_ms: None,
        },
        Some(store) => match store.ping().await {
            Ok(()) => ComponentHealth {
                status: "ok".to_string(),
                latency_ms: Some(start.elapsed().as_millis() as u64),
            },
            Err(e) => {
                tracing::warn!(error = %e, "Job store health check failed");
                ComponentHealth {
                    status: "error".to_string(),
                    latency_ms: None,
                }
            }
        },
    };

    let healthy = store_check.status != "error";
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        mode: if state.enhance.is_local() { "local" } else { "provider" }.to_string(),
        checks: HealthChecks {
            job_store: store_check,
        },
    };

    (status_code, Json(response))
}
