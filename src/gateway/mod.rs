use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::{
    config::GatewayConfig,
    domain::Payment,
    error::{AppError, Result},
};

/// Settlement state reported by the wallet provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStatus {
    Pending,
    Success,
    Failure,
}

/// Boundary to the external mobile-wallet provider. Implementations must
/// bound their own latency; callers fail closed once the retry budget is
/// spent.
#[async_trait]
pub trait WalletGateway: Send + Sync {
    /// Submit the authorized payment for settlement. Returns the
    /// provider's reference for subsequent status queries.
    async fn submit(&self, payment: &Payment) -> Result<String>;
    async fn query_status(&self, provider_ref: &str) -> Result<GatewayStatus>;
}

#[derive(Deserialize)]
struct SubmitResponse {
    provider_ref: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
}

/// HTTP adapter for the wallet provider. Transient errors are retried
/// with bounded exponential backoff before surfacing as `Gateway`.
pub struct HttpWalletGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpWalletGateway {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    async fn post_with_retry(&self, url: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let mut delay = Duration::from_millis(self.config.backoff_base_ms);
        let mut last_err = String::new();

        for attempt in 1..=self.config.max_attempts {
            match self.client.post(url).json(&body).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if response.status().is_server_error() => {
                    last_err = format!("provider returned {}", response.status());
                }
                Ok(response) => {
                    // 4xx from the provider is not transient.
                    return Err(AppError::Gateway(format!(
                        "provider rejected request: {}",
                        response.status()
                    )));
                }
                Err(e) => last_err = e.to_string(),
            }

            if attempt < self.config.max_attempts {
                tracing::warn!(
                    "Gateway call failed (attempt {}/{}): {}",
                    attempt,
                    self.config.max_attempts,
                    last_err
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }

        Err(AppError::Gateway(format!(
            "provider unreachable after {} attempts: {}",
            self.config.max_attempts, last_err
        )))
    }
}

#[async_trait]
impl WalletGateway for HttpWalletGateway {
    async fn submit(&self, payment: &Payment) -> Result<String> {
        let body = json!({
            "api_key": self.config.api_key,
            "reference": payment.reference_number,
            "amount_centavos": payment.amount_centavos,
            "currency": payment.currency,
            "payer_number": payment.contact_number,
        });

        let response = self
            .post_with_retry(&format!("{}/charges", self.config.base_url), body)
            .await?;

        let parsed: SubmitResponse = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("malformed submit response: {}", e)))?;

        tracing::info!(
            "Payment {} submitted to provider as {}",
            payment.reference_number,
            parsed.provider_ref
        );
        Ok(parsed.provider_ref)
    }

    async fn query_status(&self, provider_ref: &str) -> Result<GatewayStatus> {
        let body = json!({
            "api_key": self.config.api_key,
            "provider_ref": provider_ref,
        });

        let response = self
            .post_with_retry(&format!("{}/charges/status", self.config.base_url), body)
            .await?;

        let parsed: StatusResponse = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("malformed status response: {}", e)))?;

        match parsed.status.as_str() {
            "pending" => Ok(GatewayStatus::Pending),
            "success" => Ok(GatewayStatus::Success),
            "failure" => Ok(GatewayStatus::Failure),
            other => Err(AppError::Gateway(format!(
                "unknown provider status: {}",
                other
            ))),
        }
    }
}
