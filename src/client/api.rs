use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::models::enhance::{StatusResponse, SubmitResponse};
use crate::services::poller::{PollError, PollStatus, StatusSource};

const EXPIRED_MESSAGE: &str = "Invalid or expired process ID";
const CHECK_FAILED_MESSAGE: &str = "Failed to check enhancement status";

/// HTTP client for this service's enhance endpoints.
pub struct EnhanceApiClient {
    http: Client,
    base_url: String,
    session_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    status: Option<String>,
    error: Option<String>,
    details: Option<String>,
}

impl EnhanceApiClient {
    pub fn new(base_url: &str, session_token: Option<String>) -> Result<Self, ClientError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(ClientError::Http)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_token,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.session_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Submit a captured image (data URL or remote URL).
    pub async fn submit(&self, image: &str) -> Result<SubmitResponse, ClientError> {
        let response = self
            .authorize(self.http.post(format!("{}/api/enhance", self.base_url)))
            .json(&serde_json::json!({ "image": image }))
            .send()
            .await
            .map_err(ClientError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|body| body.details.or(body.error))
                .unwrap_or(text);
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response.json::<SubmitResponse>().await.map_err(ClientError::Http)
    }
}

#[async_trait]
impl StatusSource for EnhanceApiClient {
    async fn check(&self, id: &str) -> Result<PollStatus, PollError> {
        let response = self
            .authorize(self.http.get(format!("{}/api/enhance/status", self.base_url)))
            .query(&[("processId", id)])
            .send()
            .await
            .map_err(|e| PollError::Source(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PollError::Source(e.to_string()))?;

        interpret_status(status, &text)
    }
}

/// Map one status response from the server onto a poll observation.
pub fn interpret_status(status: StatusCode, body: &str) -> Result<PollStatus, PollError> {
    if status.is_success() {
        let body: StatusResponse =
            serde_json::from_str(body).map_err(|e| PollError::Source(e.to_string()))?;
        return Ok(classify(body));
    }

    let error: Option<ErrorBody> = serde_json::from_str(body).ok();
    let message = error
        .as_ref()
        .and_then(|e| e.error.clone())
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    if status == StatusCode::BAD_REQUEST && message == EXPIRED_MESSAGE {
        return Err(PollError::UnknownJob);
    }

    // The server could not reach the provider; says nothing about the job itself.
    if message == CHECK_FAILED_MESSAGE {
        return Err(PollError::Source(message));
    }

    // A provider-reported failure arrives as a 500 carrying a failed status.
    if error.as_ref().and_then(|e| e.status.as_deref()) == Some("failed") {
        return Ok(PollStatus::Failed(message));
    }

    Err(PollError::Source(message))
}

fn classify(body: StatusResponse) -> PollStatus {
    match body.status.as_str() {
        "completed" => match body.result {
            Some(url) => PollStatus::Succeeded(url),
            None => PollStatus::Failed("Enhancement finished without a result".to_string()),
        },
        "succeeded" => {
            let url = match body.output {
                Some(serde_json::Value::Array(items)) => {
                    items.first().and_then(|v| v.as_str()).map(str::to_string)
                }
                Some(serde_json::Value::String(url)) => Some(url),
                _ => None,
            };
            match url {
                Some(url) => PollStatus::Succeeded(url),
                None => PollStatus::Failed("Enhancement finished without a result".to_string()),
            }
        }
        "error" | "failed" | "canceled" | "aborted" => PollStatus::Failed(
            body.error
                .unwrap_or_else(|| "Enhancement failed".to_string()),
        ),
        _ => PollStatus::Pending,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Submission rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_processing_is_pending() {
        let status = interpret_status(
            StatusCode::OK,
            r#"{"status":"processing","message":"Enhancement in progress"}"#,
        );
        assert_eq!(status, Ok(PollStatus::Pending));

        let status = interpret_status(StatusCode::OK, r#"{"status":"starting"}"#);
        assert_eq!(status, Ok(PollStatus::Pending));
    }

    #[test]
    fn test_local_completion() {
        let status = interpret_status(
            StatusCode::OK,
            r#"{"status":"completed","result":"https://replicate.delivery/out.png"}"#,
        );
        assert_eq!(
            status,
            Ok(PollStatus::Succeeded("https://replicate.delivery/out.png".into()))
        );
    }

    #[test]
    fn test_provider_success_uses_first_output() {
        let status = interpret_status(
            StatusCode::OK,
            r#"{"status":"succeeded","output":["https://a/1.png","https://a/2.png"]}"#,
        );
        assert_eq!(status, Ok(PollStatus::Succeeded("https://a/1.png".into())));
    }

    #[test]
    fn test_local_error_is_failure() {
        let status = interpret_status(StatusCode::OK, r#"{"status":"error","error":"bad input"}"#);
        assert_eq!(status, Ok(PollStatus::Failed("bad input".into())));
    }

    #[test]
    fn test_provider_failure_on_500() {
        let status = interpret_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"status":"failed","error":"Image too large"}"#,
        );
        assert_eq!(status, Ok(PollStatus::Failed("Image too large".into())));
    }

    #[test]
    fn test_status_check_outage_is_not_a_job_failure() {
        let status = interpret_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"status":"failed","error":"Failed to check enhancement status"}"#,
        );
        assert_eq!(
            status,
            Err(PollError::Source("Failed to check enhancement status".into()))
        );
    }

    #[test]
    fn test_expired_is_unknown_job() {
        let status = interpret_status(
            StatusCode::BAD_REQUEST,
            r#"{"error":"Invalid or expired process ID"}"#,
        );
        assert_eq!(status, Err(PollError::UnknownJob));
    }

    #[test]
    fn test_unexpected_status_is_source_error() {
        let status = interpret_status(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(status, Err(PollError::Source("HTTP 502".into())));
    }

    #[tokio::test]
    async fn test_submit_and_check_against_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/enhance"))
            .and(body_json(json!({ "image": "data:image/jpeg;base64,AAAA" })))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "processId": "1700000000000",
                "message": "Image enhancement started"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/enhance/status"))
            .and(query_param("processId", "1700000000000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "processing" })))
            .mount(&server)
            .await;

        let client = EnhanceApiClient::new(&server.uri(), None).unwrap();
        let submitted = client.submit("data:image/jpeg;base64,AAAA").await.unwrap();
        assert_eq!(submitted.job_id(), "1700000000000");
        assert_eq!(client.check("1700000000000").await, Ok(PollStatus::Pending));
    }

    #[tokio::test]
    async fn test_rejected_submission_surfaces_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/enhance"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({ "error": "No image provided" })),
            )
            .mount(&server)
            .await;

        let client = EnhanceApiClient::new(&server.uri(), None).unwrap();
        match client.submit("").await.unwrap_err() {
            ClientError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "No image provided");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
