use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::job::{Job, JobStatus};

/// Body of `POST /api/enhance`.
#[derive(Debug, Deserialize, Validate)]
pub struct EnhanceRequest {
    /// Captured photo as a data URL, or a remote image URL.
    #[garde(required, length(min = 1))]
    #[serde(default)]
    pub image: Option<String>,
}

/// Query string for the status endpoints. The capture page sends
/// `processId`; prediction-mode clients send `id`.
#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    #[serde(rename = "processId")]
    pub process_id: Option<String>,
    pub id: Option<String>,
}

impl StatusQuery {
    pub fn job_id(&self) -> Option<&str> {
        non_empty(&self.process_id).or_else(|| non_empty(&self.id))
    }
}

fn non_empty(id: &Option<String>) -> Option<&str> {
    id.as_deref().filter(|id| !id.is_empty())
}

/// Accepted submission, shaped per tracking mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SubmitResponse {
    #[serde(rename_all = "camelCase")]
    Local { process_id: String, message: String },
    #[serde(rename_all = "camelCase")]
    Provider {
        success: bool,
        prediction_id: String,
        status: String,
    },
}

impl SubmitResponse {
    pub fn job_id(&self) -> &str {
        match self {
            SubmitResponse::Local { process_id, .. } => process_id,
            SubmitResponse::Provider { prediction_id, .. } => prediction_id,
        }
    }
}

/// Body of a successful status check. `result` is set by local jobs,
/// `output` by provider predictions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&Job> for StatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            status: job.status.to_string(),
            result: job.result.clone(),
            output: None,
            error: job.error.clone(),
            message: (job.status == JobStatus::Processing)
                .then(|| "Enhancement in progress".to_string()),
        }
    }
}
