use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::models::job::Job;
use crate::models::prediction::PredictionStatus;
use crate::services::ids::ProcessIdGenerator;
use crate::services::poller::{PollError, PollOutcome, PollStatus, StatusPoller, StatusSource};
use crate::services::replicate::{InferenceProvider, ProviderError};
use crate::services::store::{JobStore, StoreError};

const INVALID_OUTPUT: &str = "Invalid response format from Clarity API";
const DEFAULT_FAILURE: &str = "Failed to enhance image";

/// Reads prediction status straight from the inference provider.
pub struct PredictionStatusSource {
    provider: Arc<dyn InferenceProvider>,
}

impl PredictionStatusSource {
    pub fn new(provider: Arc<dyn InferenceProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl StatusSource for PredictionStatusSource {
    async fn check(&self, id: &str) -> Result<PollStatus, PollError> {
        let prediction = self.provider.get_prediction(id).await.map_err(|e| match e {
            ProviderError::Api { status: 404, .. } => PollError::UnknownJob,
            other => PollError::Source(other.provider_message()),
        })?;

        Ok(match prediction.status {
            PredictionStatus::Succeeded => match prediction.first_output() {
                Some(url) => PollStatus::Succeeded(url.to_string()),
                None => PollStatus::Failed(INVALID_OUTPUT.to_string()),
            },
            status if status.is_terminal() => PollStatus::Failed(
                prediction
                    .error_message()
                    .unwrap_or_else(|| DEFAULT_FAILURE.to_string()),
            ),
            _ => PollStatus::Pending,
        })
    }
}

/// Supervises local-mode jobs: each submission gets a tracked task that
/// drives its prediction to a terminal state and records it in the store.
pub struct JobRunner {
    provider: Arc<dyn InferenceProvider>,
    store: Arc<dyn JobStore>,
    poller: StatusPoller,
    ids: ProcessIdGenerator,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl JobRunner {
    pub fn new(
        provider: Arc<dyn InferenceProvider>,
        store: Arc<dyn JobStore>,
        poller: StatusPoller,
    ) -> Self {
        Self {
            provider,
            store,
            poller,
            ids: ProcessIdGenerator::new(),
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Record a new processing job and start driving it. Returns the process id
    /// without waiting for the provider.
    pub async fn submit(&self, image: String) -> Result<String, StoreError> {
        let id = self.ids.next_id();
        self.store.put(&Job::new(id.clone())).await?;

        metrics::counter!("enhance_jobs_submitted_total").increment(1);
        metrics::gauge!("enhance_jobs_in_flight").increment(1.0);
        tracing::info!(job_id = %id, image_len = image.len(), "Process created");

        let task = JobTask {
            provider: Arc::clone(&self.provider),
            store: Arc::clone(&self.store),
            poller: self.poller.clone(),
            cancel: self.cancel.child_token(),
            id: id.clone(),
        };
        self.tracker.spawn(task.run(image));

        Ok(id)
    }

    /// Number of jobs still being driven.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Cancel every running job and wait for the tasks to record their outcome.
    pub async fn shutdown(&self) {
        tracing::info!(in_flight = self.tracker.len(), "Stopping job runner");
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

struct JobTask {
    provider: Arc<dyn InferenceProvider>,
    store: Arc<dyn JobStore>,
    poller: StatusPoller,
    cancel: CancellationToken,
    id: String,
}

impl JobTask {
    async fn run(self, image: String) {
        let started = Instant::now();
        let outcome = self.drive(&image).await;
        let elapsed = started.elapsed();

        metrics::gauge!("enhance_jobs_in_flight").decrement(1.0);
        metrics::histogram!("enhance_job_duration_seconds").record(elapsed.as_secs_f64());

        if let Err(e) = self.record(outcome).await {
            tracing::error!(job_id = %self.id, error = %e, "Failed to record job outcome");
        }
    }

    async fn drive(&self, image: &str) -> Result<PollOutcome, PollError> {
        let prediction = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(PollError::Cancelled),
            created = self.provider.create_prediction(image) => created,
        };

        let prediction = match prediction {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(job_id = %self.id, error = %e, "Clarity API error");
                return Ok(PollOutcome::Failed(e.provider_message()));
            }
        };

        tracing::info!(job_id = %self.id, prediction_id = %prediction.id, "Prediction started");

        let source = PredictionStatusSource::new(Arc::clone(&self.provider));
        self.poller
            .poll(&source, &prediction.id, &self.cancel, |_| {})
            .await
    }

    /// Write the terminal state, unless the stored job is gone or already terminal.
    async fn record(&self, outcome: Result<PollOutcome, PollError>) -> Result<(), StoreError> {
        let Some(mut job) = self.store.get(&self.id).await? else {
            tracing::warn!(job_id = %self.id, "Job expired before completion");
            return Ok(());
        };

        let transition = match outcome {
            Ok(PollOutcome::Succeeded(url)) => {
                metrics::counter!("enhance_jobs_completed_total").increment(1);
                tracing::info!(job_id = %self.id, result_url = %url, "Process completed");
                job.complete(url)
            }
            Ok(PollOutcome::Failed(message)) => {
                metrics::counter!("enhance_jobs_failed_total").increment(1);
                tracing::warn!(job_id = %self.id, error = %message, "Process failed");
                job.fail(message)
            }
            Err(e) => {
                if matches!(e, PollError::TimedOut { .. }) {
                    metrics::counter!("enhance_jobs_timed_out_total").increment(1);
                } else {
                    metrics::counter!("enhance_jobs_failed_total").increment(1);
                }
                tracing::warn!(job_id = %self.id, error = %e, "Process did not complete");
                job.fail(e.to_string())
            }
        };

        match transition {
            Ok(()) => self.store.put(&job).await,
            Err(e) => {
                tracing::warn!(job_id = %self.id, error = %e, "Ignoring late outcome");
                Ok(())
            }
        }
    }
}
