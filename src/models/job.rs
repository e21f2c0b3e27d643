use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a locally tracked enhancement job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Completed,
    #[serde(rename = "error")]
    #[strum(serialize = "error")]
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

/// One enhancement request tracked from submission to its terminal outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("job {id} is already {status}")]
pub struct JobTransitionError {
    pub id: String,
    pub status: JobStatus,
}

impl Job {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Processing,
            result: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Record the enhanced image URL. Only valid while processing.
    pub fn complete(&mut self, result_url: impl Into<String>) -> Result<(), JobTransitionError> {
        self.ensure_processing()?;
        self.status = JobStatus::Completed;
        self.result = Some(result_url.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Record a failure message. Only valid while processing.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), JobTransitionError> {
        self.ensure_processing()?;
        self.status = JobStatus::Failed;
        self.error = Some(message.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    fn ensure_processing(&self) -> Result<(), JobTransitionError> {
        if self.is_terminal() {
            return Err(JobTransitionError {
                id: self.id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }
}

/// Client-side lifecycle of one captured photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CaptureState {
    Submitting,
    Polling,
    Succeeded,
    Failed,
    TimedOut,
}

/// Events that move a capture through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CaptureEvent {
    JobAccepted,
    SubmissionRejected,
    ProviderSucceeded,
    ProviderFailed,
    BudgetExceeded,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid capture transition: {event} while {from}")]
pub struct CaptureTransitionError {
    pub from: CaptureState,
    pub event: CaptureEvent,
}

impl CaptureState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CaptureState::Succeeded | CaptureState::Failed | CaptureState::TimedOut
        )
    }

    pub fn on(self, event: CaptureEvent) -> Result<CaptureState, CaptureTransitionError> {
        use CaptureEvent::*;
        use CaptureState::*;

        match (self, event) {
            (Submitting, JobAccepted) => Ok(Polling),
            (Submitting, SubmissionRejected) => Ok(Failed),
            (Polling, ProviderSucceeded) => Ok(Succeeded),
            (Polling, ProviderFailed) => Ok(Failed),
            (Polling, BudgetExceeded) => Ok(TimedOut),
            (from, event) => Err(CaptureTransitionError { from, event }),
        }
    }
}
