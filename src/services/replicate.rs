use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::models::prediction::{CreatePredictionRequest, EnhanceInput, Prediction};

/// Hosted inference backend that runs enhancement predictions.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Start a prediction for `image` and return as soon as the provider accepts it.
    async fn create_prediction(&self, image: &str) -> Result<Prediction, ProviderError>;

    /// Fetch the current state of a prediction.
    async fn get_prediction(&self, id: &str) -> Result<Prediction, ProviderError>;
}

/// Client for the Replicate predictions API running the clarity upscaler.
pub struct ReplicateClient {
    http: Client,
    base_url: String,
    api_token: String,
    model_version: String,
}

#[derive(Deserialize)]
struct ReplicateErrorBody {
    detail: Option<String>,
    title: Option<String>,
}

impl ReplicateClient {
    pub fn new(
        api_token: &str,
        base_url: &str,
        model_version: &str,
    ) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ProviderError::Http)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
            model_version: model_version.to_string(),
        })
    }

    /// `{base_url}/<segments>`, each segment percent-encoded so caller input
    /// cannot leave its path position.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ProviderError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn read_prediction(response: reqwest::Response) -> Result<Prediction, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ReplicateErrorBody>(&text)
                .ok()
                .and_then(|body| body.detail.or(body.title))
                .unwrap_or(text);
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response.json::<Prediction>().await.map_err(ProviderError::Http)
    }
}

#[async_trait]
impl InferenceProvider for ReplicateClient {
    async fn create_prediction(&self, image: &str) -> Result<Prediction, ProviderError> {
        let input = EnhanceInput::for_image(image);
        let body = CreatePredictionRequest {
            version: &self.model_version,
            input: &input,
        };

        tracing::debug!(
            image_len = image.len(),
            scale_factor = input.scale_factor,
            "Creating Replicate prediction"
        );

        let response = self
            .http
            .post(self.endpoint(&["predictions"])?)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::Http)?;

        Self::read_prediction(response).await
    }

    async fn get_prediction(&self, id: &str) -> Result<Prediction, ProviderError> {
        let response = self
            .http
            .get(self.endpoint(&["predictions", id])?)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(ProviderError::Http)?;

        Self::read_prediction(response).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Replicate API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid Replicate URL: {0}")]
    InvalidUrl(String),
}

impl ProviderError {
    /// Message suitable for passing through to API callers.
    pub fn provider_message(&self) -> String {
        match self {
            ProviderError::Api { message, .. } => message.clone(),
            ProviderError::Http(e) => e.to_string(),
            ProviderError::InvalidUrl(_) => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::prediction::PredictionStatus;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ReplicateClient {
        ReplicateClient::new("r8_test", &server.uri(), "v123").unwrap()
    }

    #[tokio::test]
    async fn test_create_prediction_sends_fixed_input() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predictions"))
            .and(header("authorization", "Bearer r8_test"))
            .and(body_partial_json(json!({
                "version": "v123",
                "input": {
                    "image": "data:image/jpeg;base64,AAAA",
                    "scale_factor": 2,
                    "num_inference_steps": 18
                }
            })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "id": "pred-1", "status": "starting" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let prediction = client(&server)
            .create_prediction("data:image/jpeg;base64,AAAA")
            .await
            .unwrap();

        assert_eq!(prediction.id, "pred-1");
        assert_eq!(prediction.status, PredictionStatus::Starting);
    }

    #[tokio::test]
    async fn test_get_prediction_succeeded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/predictions/pred-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pred-1",
                "status": "succeeded",
                "output": ["https://replicate.delivery/out.png"]
            })))
            .mount(&server)
            .await;

        let prediction = client(&server).get_prediction("pred-1").await.unwrap();
        assert_eq!(prediction.status, PredictionStatus::Succeeded);
        assert_eq!(prediction.first_output(), Some("https://replicate.delivery/out.png"));
    }

    #[tokio::test]
    async fn test_rejection_passes_message_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predictions"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({ "title": "Unauthenticated", "detail": "You did not pass a valid authentication token" })),
            )
            .mount(&server)
            .await;

        let err = client(&server).create_prediction("data:,x").await.unwrap_err();
        match &err {
            ProviderError::Api { status, message } => {
                assert_eq!(*status, 401);
                assert_eq!(message, "You did not pass a valid authentication token");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.provider_message(), "You did not pass a valid authentication token");
    }

    #[tokio::test]
    async fn test_prediction_id_stays_in_its_path_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/predictions/[^/]+$"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "id": "x", "status": "processing" })),
            )
            .expect(3)
            .mount(&server)
            .await;

        let client = client(&server);
        for id in ["../account", "abc?owner=me", "abc#frag"] {
            let prediction = client.get_prediction(id).await.unwrap();
            assert_eq!(prediction.status, PredictionStatus::Processing);
        }

        let paths: Vec<String> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect();
        assert_eq!(paths[0], "/predictions/..%2Faccount");
        assert!(paths.iter().all(|p| p.starts_with("/predictions/")));
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = ReplicateClient::new("r8_test", "https://api.replicate.com/v1/", "v123").unwrap();
        assert_eq!(
            client.endpoint(&["predictions", "pred-1"]).unwrap().as_str(),
            "https://api.replicate.com/v1/predictions/pred-1"
        );
    }

    #[tokio::test]
    async fn test_non_json_error_body_is_kept_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/predictions/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let err = client(&server).get_prediction("missing").await.unwrap_err();
        assert_eq!(err.provider_message(), "not found");
    }
}
