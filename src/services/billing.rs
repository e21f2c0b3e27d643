use std::time::Duration;

use reqwest::Client;

use crate::models::billing::{Price, PriceList};

/// Minimal Stripe client for the pricing page.
pub struct StripeClient {
    http: Client,
    base_url: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(secret_key: &str, base_url: &str) -> Result<Self, BillingError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(BillingError::Http)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    /// Active prices with their products expanded, at most ten.
    pub async fn list_prices(&self) -> Result<Vec<Price>, BillingError> {
        let response = self
            .http
            .get(format!("{}/prices", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .query(&[("active", "true"), ("limit", "10"), ("expand[]", "data.product")])
            .send()
            .await
            .map_err(BillingError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BillingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let list: PriceList = response.json().await.map_err(BillingError::Http)?;
        Ok(list.data)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Stripe API error (status {status}): {message}")]
    Api { status: u16, message: String },
}
