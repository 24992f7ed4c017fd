use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use serde_json::json;
use sha2::Sha256;
use tracing::{debug, warn};

use crate::{config::BotSpaceConfig, error::DeliveryError};

const BASE_BACKOFF: Duration = Duration::from_millis(500);

pub fn normalize_whatsapp_phone(raw: &str) -> Option<String> {
    let digits = raw
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect::<String>();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

pub fn whatsapp_session_id(raw: &str) -> Option<String> {
    let phone = normalize_whatsapp_phone(raw)?;
    Some(format!("whatsapp:{phone}"))
}

/// Checks a `sha256=<hex>` HMAC of the raw webhook body. An empty secret
/// disables the check.
pub fn verify_webhook_signature(secret: &str, signature_header: Option<&str>, body: &[u8]) -> bool {
    if secret.is_empty() {
        return true;
    }
    let signature = signature_header.unwrap_or("").trim();
    let signature = signature
        .strip_prefix("sha256=")
        .unwrap_or(signature)
        .trim();
    if signature.is_empty() {
        return false;
    }
    let Ok(signature_bytes) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature_bytes).is_ok()
}

/// Outbound text messages through the BotSpace API.
pub struct WhatsAppSender {
    http: reqwest::Client,
    api_url: Option<String>,
    api_key: String,
    max_retries: u32,
    timeout: Duration,
    base_backoff: Duration,
}

impl WhatsAppSender {
    pub fn new(config: &BotSpaceConfig, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
            timeout,
            base_backoff: BASE_BACKOFF,
        }
    }

    pub fn with_base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_url.is_some() && !self.api_key.is_empty()
    }

    /// Sends `text` to `to`, retrying network errors, 429 and 5xx with
    /// exponential backoff.
    pub async fn send_text(&self, to: &str, text: &str) -> Result<(), DeliveryError> {
        let Some(api_url) = self.api_url.as_deref().filter(|_| !self.api_key.is_empty()) else {
            return Err(DeliveryError::NotConfigured);
        };
        let payload = json!({
            "phone": to,
            "type": "text",
            "message": text,
        });

        let mut attempt = 0u32;
        loop {
            let result = self
                .http
                .post(api_url)
                .bearer_auth(&self.api_key)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let err = match result {
                Ok(response) if response.status().is_success() => {
                    debug!(attempt, "whatsapp message delivered");
                    return Ok(());
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    let err = DeliveryError::Rejected {
                        status: status.as_u16(),
                        body,
                    };
                    if !is_retryable(status) {
                        return Err(err);
                    }
                    err
                }
                Err(err) => DeliveryError::Request(err.to_string()),
            };

            if attempt >= self.max_retries {
                return Err(err);
            }
            let delay = self.base_backoff * 2u32.saturating_pow(attempt);
            warn!(attempt, error = %err, delay_ms = delay.as_millis() as u64, "whatsapp delivery failed, retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
