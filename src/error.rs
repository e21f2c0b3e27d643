use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::services::billing::BillingError;
use crate::services::enhance::EnhanceError;

/// Error type for HTTP handlers. Every variant renders as a JSON body with an
/// `error` field.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Enhance(#[from] EnhanceError),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error("Billing is not configured")]
    BillingUnavailable,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Enhance(err) => match err {
                EnhanceError::MissingImage
                | EnhanceError::MissingPredictionId
                | EnhanceError::UnknownJob => {
                    (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() }))
                }
                EnhanceError::Provider(provider) => {
                    tracing::error!(error = %provider, "Provider rejected submission");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json!({
                            "error": "Failed to process request",
                            "details": provider.provider_message(),
                        }),
                    )
                }
                EnhanceError::StatusCheck(provider) => {
                    tracing::error!(error = %provider, "Status check error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json!({
                            "status": "failed",
                            "error": "Failed to check enhancement status",
                        }),
                    )
                }
                EnhanceError::Store(store) => {
                    tracing::error!(error = %store, "Job store error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json!({ "error": "Failed to process request" }),
                    )
                }
            },
            AppError::Billing(err) => {
                tracing::error!(error = %err, "Error fetching prices");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Error fetching prices" }),
                )
            }
            AppError::BillingUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": self.to_string() }),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": self.to_string() }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
