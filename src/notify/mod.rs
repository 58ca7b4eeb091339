use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::{
    config::SmsConfig,
    error::{AppError, Result},
};

/// Outbound delivery of a passcode to the payer's contact channel.
/// Delivery confirmation is out of scope; a send that cannot be
/// dispatched surfaces as `Delivery`.
#[async_trait]
pub trait OtpNotifier: Send + Sync {
    async fn send_code(&self, contact_number: &str, code: &str, reference: &str) -> Result<()>;
}

/// SMS gateway client. The provider exposes a simple JSON POST endpoint;
/// one request per code, no batching. The request timeout bounds the
/// whole dispatch: a hung provider surfaces as `Delivery` instead of
/// pinning the payment request open.
pub struct HttpSmsNotifier {
    client: reqwest::Client,
    config: SmsConfig,
}

impl HttpSmsNotifier {
    pub fn new(config: SmsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl OtpNotifier for HttpSmsNotifier {
    async fn send_code(&self, contact_number: &str, code: &str, reference: &str) -> Result<()> {
        let body = json!({
            "apikey": self.config.api_key,
            "number": contact_number,
            "sendername": self.config.sender_name,
            "message": format!(
                "Your payment code is {}. It expires in 10 minutes. Ref: {}",
                code, reference
            ),
        });

        let response = self
            .client
            .post(format!("{}/messages", self.config.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Delivery(format!("SMS dispatch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Delivery(format!(
                "SMS gateway returned {}",
                response.status()
            )));
        }

        tracing::info!("OTP dispatched for payment {}", reference);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifier_client_carries_a_bounded_timeout() {
        let config = SmsConfig::default();
        assert!(config.request_timeout_secs > 0);
        assert!(HttpSmsNotifier::new(config).is_ok());
    }
}
