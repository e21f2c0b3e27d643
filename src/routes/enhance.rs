use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::models::enhance::{EnhanceRequest, StatusQuery, SubmitResponse};
use crate::services::enhance::StatusReport;

/// POST /api/enhance — Submit a captured photo for enhancement.
pub async fn submit_enhancement(
    State(state): State<AppState>,
    body: Result<Json<EnhanceRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<SubmitResponse>)> {
    let Json(request) = body.map_err(|rejection| {
        tracing::warn!(error = %rejection, "Rejected enhance request body");
        AppError::BadRequest("Invalid request body".to_string())
    })?;

    tracing::info!(
        image_len = request.image.as_ref().map_or(0, String::len),
        "Enhance request started"
    );

    let response = state.enhance.submit(request).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /api/enhance/status — Check an enhancement job.
pub async fn get_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> AppResult<Response> {
    let response = match state.enhance.status(query.job_id()).await? {
        StatusReport::Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        StatusReport::ProviderFailed(body) => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    };
    Ok(response)
}
