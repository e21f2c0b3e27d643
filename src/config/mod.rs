use garde::Validate;
use serde::Deserialize;
use std::time::Duration;

/// How enhancement jobs are tracked between submission and the final result.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EnhanceMode {
    /// Hand the prediction id to the client and query Replicate on every status check.
    Provider,
    /// Track jobs in the local job store and drive predictions from background tasks.
    Local,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    #[garde(skip)]
    pub bind_addr: String,

    /// Replicate API token
    #[garde(skip)]
    pub replicate_api_token: String,

    /// Replicate API base URL (overridable for tests and proxies)
    #[serde(default = "default_replicate_base_url")]
    #[garde(skip)]
    pub replicate_base_url: String,

    /// Version hash of the clarity upscaler model
    #[serde(default = "default_model_version")]
    #[garde(skip)]
    pub replicate_model_version: String,

    #[serde(default = "default_enhance_mode")]
    #[garde(skip)]
    pub enhance_mode: EnhanceMode,

    /// Redis connection string for the job store. In-memory store when unset.
    #[garde(skip)]
    pub redis_url: Option<String>,

    /// Seconds a finished job stays readable after its first terminal read
    #[serde(default = "default_job_expiry_secs")]
    #[garde(range(min = 1))]
    pub job_expiry_secs: u64,

    /// Upper bound on how long any job record is kept
    #[serde(default = "default_job_max_age_secs")]
    #[garde(range(min = 1))]
    pub job_max_age_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    #[garde(range(min = 1))]
    pub poll_interval_ms: u64,

    #[serde(default = "default_poll_timeout_secs")]
    #[garde(range(min = 1))]
    pub poll_timeout_secs: u64,

    /// Stripe secret key. Billing routes answer 503 when unset.
    #[garde(skip)]
    pub stripe_secret_key: Option<String>,

    #[serde(default = "default_stripe_base_url")]
    #[garde(skip)]
    pub stripe_base_url: String,

    /// PEM public key for session token verification. Auth is off when unset.
    #[garde(skip)]
    pub clerk_jwt_key: Option<String>,

    #[serde(default = "default_body_limit_bytes")]
    #[garde(range(min = 1))]
    pub body_limit_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_replicate_base_url() -> String {
    "https://api.replicate.com/v1".to_string()
}

fn default_model_version() -> String {
    "dfad41707589d68ecdccd1dfa600d55a208f9310748e44bfe35b4a6291453d5e".to_string()
}

fn default_enhance_mode() -> EnhanceMode {
    EnhanceMode::Provider
}

fn default_job_expiry_secs() -> u64 {
    5
}

fn default_job_max_age_secs() -> u64 {
    3600
}

fn default_poll_interval_ms() -> u64 {
    1500
}

fn default_poll_timeout_secs() -> u64 {
    120
}

fn default_stripe_base_url() -> String {
    "https://api.stripe.com/v1".to_string()
}

fn default_body_limit_bytes() -> usize {
    10 * 1024 * 1024
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Parse and validate configuration from `(NAME, value)` pairs.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: AppConfig = envy::from_iter(vars)?;
        config.validate()?;
        Ok(config)
    }

    pub fn job_expiry(&self) -> Duration {
        Duration::from_secs(self.job_expiry_secs)
    }

    pub fn job_max_age(&self) -> Duration {
        Duration::from_secs(self.job_max_age_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] garde::Report),
}
