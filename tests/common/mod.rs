//! Shared fixtures for the HTTP integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use tower::ServiceExt;

use uhd_camera::app_state::AppState;
use uhd_camera::models::prediction::{Prediction, PredictionStatus};
use uhd_camera::routes;
use uhd_camera::services::enhance::EnhanceService;
use uhd_camera::services::poller::{PollConfig, StatusPoller};
use uhd_camera::services::replicate::{InferenceProvider, ProviderError};
use uhd_camera::services::runner::JobRunner;
use uhd_camera::services::store::{JobStore, MemoryJobStore};

pub const PREDICTION_ID: &str = "p-test";
pub const RESULT_URL: &str = "https://replicate.delivery/pbxt/enhanced.png";
pub const BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Scripted inference provider. Every `get_prediction` returns the current
/// prediction, which tests can swap at any point.
pub struct FakeProvider {
    prediction: Mutex<Prediction>,
    rejection: Mutex<Option<String>>,
    outage: Mutex<Option<u16>>,
    created: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            prediction: Mutex::new(prediction(PredictionStatus::Starting, None, None)),
            rejection: Mutex::new(None),
            outage: Mutex::new(None),
            created: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, next: Prediction) {
        *self.prediction.lock().unwrap() = next;
    }

    pub fn succeed(&self) {
        self.set(prediction(PredictionStatus::Succeeded, Some(json!([RESULT_URL])), None));
    }

    pub fn fail(&self, message: &str) {
        self.set(prediction(PredictionStatus::Failed, None, Some(json!(message))));
    }

    /// Make `create_prediction` fail with a 422 carrying `detail`.
    pub fn reject(&self, detail: &str) {
        *self.rejection.lock().unwrap() = Some(detail.to_string());
    }

    /// Make `get_prediction` fail with `status` for every id.
    pub fn go_down(&self, status: u16) {
        *self.outage.lock().unwrap() = Some(status);
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceProvider for FakeProvider {
    async fn create_prediction(&self, _image: &str) -> Result<Prediction, ProviderError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.rejection.lock().unwrap().clone() {
            return Err(ProviderError::Api {
                status: 422,
                message,
            });
        }
        Ok(self.prediction.lock().unwrap().clone())
    }

    async fn get_prediction(&self, id: &str) -> Result<Prediction, ProviderError> {
        if let Some(status) = *self.outage.lock().unwrap() {
            return Err(ProviderError::Api {
                status,
                message: "Service unavailable".to_string(),
            });
        }
        if id != PREDICTION_ID {
            return Err(ProviderError::Api {
                status: 404,
                message: "Not found".to_string(),
            });
        }
        Ok(self.prediction.lock().unwrap().clone())
    }
}

pub fn prediction(status: PredictionStatus, output: Option<Value>, error: Option<Value>) -> Prediction {
    Prediction {
        id: PREDICTION_ID.to_string(),
        status,
        output,
        error,
    }
}

/// Router with the full middleware stack, backed by the given service.
pub fn build_test_app(state: AppState) -> Router {
    let prometheus = PrometheusBuilder::new().build_recorder().handle();
    routes::router(state, Arc::new(prometheus), BODY_LIMIT)
}

pub fn provider_state(provider: Arc<FakeProvider>) -> AppState {
    AppState::new(EnhanceService::provider(provider))
}

/// Local-mode state with an in-memory store: 1.5s polls, 120s budget, 5s expiry.
pub fn local_state(provider: Arc<FakeProvider>) -> (AppState, Arc<MemoryJobStore>) {
    let store = Arc::new(MemoryJobStore::new(Duration::from_secs(3600)));
    let poller = StatusPoller::new(PollConfig::default());
    let job_store: Arc<dyn JobStore> = store.clone();
    let runner = JobRunner::new(provider, job_store, poller);
    let state = AppState::new(EnhanceService::local(runner, Duration::from_secs(5)));
    (state, store)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
