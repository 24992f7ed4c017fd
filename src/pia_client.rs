use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::{config::PiaConfig, error::OrderError, orders::mask_phone, types::Order};

/// Result of a successful lookup. An empty `orders` list is a normal answer,
/// not a failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderLookup {
    pub orders: Vec<Order>,
    pub count: usize,
    pub message: Option<String>,
}

impl OrderLookup {
    pub fn empty(message: Option<String>) -> Self {
        Self {
            orders: vec![],
            count: 0,
            message,
        }
    }
}

#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn orders_by_mobile(&self, phone: &str) -> Result<OrderLookup, OrderError>;
}

/// Client for the order-management ("PIA") API.
pub struct PiaClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    timeout: Duration,
}

impl PiaClient {
    pub fn new(config: &PiaConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            token: config.token.clone(),
            timeout: config.timeout,
        }
    }
}

#[async_trait]
impl OrderSource for PiaClient {
    async fn orders_by_mobile(&self, phone: &str) -> Result<OrderLookup, OrderError> {
        let masked = mask_phone(phone);
        debug!(phone = %masked, "querying order api");

        let response = self
            .http
            .get(&self.api_url)
            .query(&[("mobile", phone)])
            .bearer_auth(&self.token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    warn!(phone = %masked, "order api timed out");
                    OrderError::Timeout
                } else {
                    warn!(phone = %masked, error = %err, "order api request failed");
                    OrderError::Unknown(err.to_string())
                }
            })?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED => {
                error!(target: "ops_alert", "order api rejected the bearer token; refresh PIA_API_TOKEN");
                return Err(OrderError::TokenExpired);
            }
            StatusCode::NOT_FOUND => return Ok(OrderLookup::empty(None)),
            s if s.is_server_error() => {
                warn!(status = s.as_u16(), "order api server error");
                return Err(OrderError::ServerError { status: s.as_u16() });
            }
            s if !s.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(OrderError::Unknown(format!("order api returned {s}: {body}")));
            }
            _ => {}
        }

        let body = response.text().await.map_err(|err| {
            if err.is_timeout() {
                OrderError::Timeout
            } else {
                OrderError::Unknown(err.to_string())
            }
        })?;
        parse_lookup(&body)
    }
}

/// Interprets an order API body `{ data: Order[] | null, count?, message? }`.
pub fn parse_lookup(body: &str) -> Result<OrderLookup, OrderError> {
    let payload = serde_json::from_str::<Value>(body)
        .map_err(|err| OrderError::InvalidResponseFormat(format!("body is not json: {err}")))?;
    if !payload.is_object() {
        return Err(OrderError::InvalidResponseFormat(
            "body is not a json object".to_string(),
        ));
    }

    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string);

    match payload.get("data") {
        None | Some(Value::Null) => Ok(OrderLookup::empty(message)),
        Some(Value::Array(items)) => {
            let orders = items
                .iter()
                .cloned()
                .map(serde_json::from_value::<Order>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| OrderError::InvalidResponseFormat(format!("bad order record: {err}")))?;
            let count = payload
                .get("count")
                .and_then(Value::as_u64)
                .map(|c| c as usize)
                .unwrap_or(orders.len());
            Ok(OrderLookup {
                orders,
                count,
                message,
            })
        }
        Some(other) => Err(OrderError::InvalidResponseFormat(format!(
            "data is {} instead of an array",
            json_kind(other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
