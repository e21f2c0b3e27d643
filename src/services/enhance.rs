use std::sync::Arc;
use std::time::Duration;

use garde::Validate;

use crate::models::enhance::{EnhanceRequest, StatusResponse, SubmitResponse};
use crate::models::prediction::PredictionStatus;
use crate::services::replicate::{InferenceProvider, ProviderError};
use crate::services::runner::JobRunner;
use crate::services::store::{JobStore, StoreError};

/// Entry point for the enhance routes. Provider mode hands out Replicate
/// prediction ids; local mode tracks jobs itself through a [`JobRunner`].
pub enum EnhanceService {
    Provider {
        provider: Arc<dyn InferenceProvider>,
    },
    Local {
        runner: JobRunner,
        /// Grace period after the first terminal read.
        expiry: Duration,
    },
}

/// A completed status check. `ProviderFailed` carries the provider's own
/// failure report and is answered with a server error status.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusReport {
    Ok(StatusResponse),
    ProviderFailed(StatusResponse),
}

impl EnhanceService {
    pub fn provider(provider: Arc<dyn InferenceProvider>) -> Self {
        EnhanceService::Provider { provider }
    }

    pub fn local(runner: JobRunner, expiry: Duration) -> Self {
        EnhanceService::Local { runner, expiry }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, EnhanceService::Local { .. })
    }

    /// Job store backing local mode.
    pub fn store(&self) -> Option<&Arc<dyn JobStore>> {
        match self {
            EnhanceService::Local { runner, .. } => Some(runner.store()),
            EnhanceService::Provider { .. } => None,
        }
    }

    /// Validate the capture and start an enhancement job. Never waits for the
    /// job to finish.
    pub async fn submit(&self, request: EnhanceRequest) -> Result<SubmitResponse, EnhanceError> {
        if request.validate().is_err() {
            tracing::warn!("Rejected submission: no image provided");
            return Err(EnhanceError::MissingImage);
        }
        let image = request.image.ok_or(EnhanceError::MissingImage)?;

        match self {
            EnhanceService::Provider { provider } => {
                let prediction = provider
                    .create_prediction(&image)
                    .await
                    .map_err(EnhanceError::Provider)?;

                metrics::counter!("enhance_jobs_submitted_total").increment(1);
                tracing::info!(
                    prediction_id = %prediction.id,
                    status = %prediction.status,
                    "Prediction created"
                );

                Ok(SubmitResponse::Provider {
                    success: true,
                    prediction_id: prediction.id,
                    status: prediction.status.to_string(),
                })
            }
            EnhanceService::Local { runner, .. } => {
                let process_id = runner.submit(image).await?;
                Ok(SubmitResponse::Local {
                    process_id,
                    message: "Image enhancement started".to_string(),
                })
            }
        }
    }

    /// Current status of a job. Reads of a finished local job arm its expiry.
    pub async fn status(&self, id: Option<&str>) -> Result<StatusReport, EnhanceError> {
        match self {
            EnhanceService::Provider { provider } => {
                let id = id.ok_or(EnhanceError::MissingPredictionId)?;
                tracing::debug!(prediction_id = %id, "Checking prediction status");

                let prediction = provider.get_prediction(id).await.map_err(|e| match e {
                    ProviderError::Api { status: 404, .. } => {
                        tracing::info!(prediction_id = %id, "Unknown prediction ID");
                        EnhanceError::UnknownJob
                    }
                    other => EnhanceError::StatusCheck(other),
                })?;

                if let Some(error) = prediction.error_message() {
                    tracing::warn!(prediction_id = %id, error = %error, "Prediction error");
                    return Ok(StatusReport::ProviderFailed(StatusResponse {
                        status: PredictionStatus::Failed.to_string(),
                        error: Some(error),
                        ..StatusResponse::default()
                    }));
                }

                let output = (prediction.status == PredictionStatus::Succeeded)
                    .then_some(prediction.output)
                    .flatten();

                Ok(StatusReport::Ok(StatusResponse {
                    status: prediction.status.to_string(),
                    output,
                    ..StatusResponse::default()
                }))
            }
            EnhanceService::Local { runner, expiry } => {
                let id = id.ok_or(EnhanceError::UnknownJob)?;
                let store = runner.store();

                let Some(job) = store.get(id).await? else {
                    tracing::info!(job_id = %id, "Invalid process ID");
                    return Err(EnhanceError::UnknownJob);
                };

                tracing::debug!(job_id = %id, status = %job.status, "Process status");
                if job.is_terminal() {
                    store.expire(id, *expiry).await?;
                }

                Ok(StatusReport::Ok(StatusResponse::from(&job)))
            }
        }
    }

    /// Stop background work. A no-op in provider mode.
    pub async fn shutdown(&self) {
        if let EnhanceService::Local { runner, .. } = self {
            runner.shutdown().await;
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnhanceError {
    #[error("No image provided")]
    MissingImage,

    #[error("Prediction ID is required")]
    MissingPredictionId,

    #[error("Invalid or expired process ID")]
    UnknownJob,

    #[error("Failed to process request: {0}")]
    Provider(ProviderError),

    #[error("Failed to check enhancement status: {0}")]
    StatusCheck(ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
