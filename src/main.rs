use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use uhd_camera::app_state::AppState;
use uhd_camera::config::{AppConfig, EnhanceMode};
use uhd_camera::routes;
use uhd_camera::services::{
    auth::SessionVerifier,
    billing::StripeClient,
    enhance::EnhanceService,
    poller::{PollConfig, StatusPoller},
    replicate::{InferenceProvider, ReplicateClient},
    runner::JobRunner,
    store::{self, JobStore, MemoryJobStore, RedisJobStore},
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!(mode = %config.enhance_mode, "Initializing uhd-camera server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!(
        "enhance_jobs_submitted_total",
        "Total enhancement jobs submitted"
    );
    metrics::describe_counter!(
        "enhance_jobs_completed_total",
        "Total enhancement jobs that produced an image"
    );
    metrics::describe_counter!(
        "enhance_jobs_failed_total",
        "Total enhancement jobs that failed"
    );
    metrics::describe_counter!(
        "enhance_jobs_timed_out_total",
        "Total enhancement jobs abandoned after the poll timeout"
    );
    metrics::describe_histogram!(
        "enhance_job_duration_seconds",
        "Time from submission to a terminal job state"
    );
    metrics::describe_gauge!(
        "enhance_jobs_in_flight",
        "Current number of jobs being driven by the runner"
    );

    tracing::info!("Initializing Replicate client");
    let provider: Arc<dyn InferenceProvider> = Arc::new(
        ReplicateClient::new(
            &config.replicate_api_token,
            &config.replicate_base_url,
            &config.replicate_model_version,
        )
        .expect("Failed to initialize Replicate client"),
    );

    let background = CancellationToken::new();

    let enhance = match config.enhance_mode {
        EnhanceMode::Provider => EnhanceService::provider(provider),
        EnhanceMode::Local => {
            let store: Arc<dyn JobStore> = match &config.redis_url {
                Some(url) => {
                    tracing::info!("Connecting to Redis job store");
                    Arc::new(
                        RedisJobStore::new(url, config.job_max_age())
                            .expect("Failed to initialize Redis job store"),
                    )
                }
                None => {
                    tracing::info!("Using in-memory job store");
                    let memory = Arc::new(MemoryJobStore::new(config.job_max_age()));
                    tokio::spawn(store::run_sweeper(
                        Arc::clone(&memory),
                        Duration::from_secs(30),
                        background.clone(),
                    ));
                    memory
                }
            };

            let poller = StatusPoller::new(PollConfig {
                interval: config.poll_interval(),
                timeout: config.poll_timeout(),
                ..PollConfig::default()
            });
            EnhanceService::local(JobRunner::new(provider, store, poller), config.job_expiry())
        }
    };

    // Create shared application state
    let mut state = AppState::new(enhance);

    if let Some(key) = &config.stripe_secret_key {
        tracing::info!("Initializing Stripe client");
        let stripe = StripeClient::new(key, &config.stripe_base_url)
            .expect("Failed to initialize Stripe client");
        state = state.with_billing(stripe);
    }

    if let Some(pem) = &config.clerk_jwt_key {
        tracing::info!("Session verification enabled for enhance routes");
        let verifier =
            SessionVerifier::from_rsa_pem(pem).expect("Failed to load session verification key");
        state = state.with_auth(verifier);
    }

    let enhance = Arc::clone(&state.enhance);
    let app = routes::router(state, prometheus_handle, config.body_limit_bytes);

    tracing::info!("Starting uhd-camera on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // Running jobs record their cancellation before we exit
    enhance.shutdown().await;
    background.cancel();

    tracing::info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
