use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhoneError {
    #[error("message is empty; no valid Indian mobile number found")]
    Empty,
    #[error("no valid Indian mobile number found (expected 10 digits starting with 6-9)")]
    NotFound,
}

/// Failure modes of an order lookup. Expected upstream conditions (empty
/// result, 404) are not errors and never show up here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("order API rejected the bearer token")]
    TokenExpired,
    #[error("order API did not answer in time")]
    Timeout,
    #[error("order API returned server error {status}")]
    ServerError { status: u16 },
    #[error("order API response had an unexpected shape: {0}")]
    InvalidResponseFormat(String),
    #[error("order API request failed: {0}")]
    Unknown(String),
}

impl OrderError {
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::TokenExpired => "TOKEN_EXPIRED",
            OrderError::Timeout => "TIMEOUT",
            OrderError::ServerError { .. } => "SERVER_ERROR",
            OrderError::InvalidResponseFormat(_) => "INVALID_RESPONSE_FORMAT",
            OrderError::Unknown(_) => "UNKNOWN_ERROR",
        }
    }

    /// Text shown to the customer. Never exposes the internal cause.
    pub fn customer_message(&self, support_phone: &str) -> String {
        match self {
            OrderError::TokenExpired => format!(
                "Our order system is being refreshed right now. Please try again in a few minutes, \
                 or call us at {support_phone}."
            ),
            OrderError::Timeout => format!(
                "Our order system is taking longer than usual to respond. Please try again in a \
                 moment, or call us at {support_phone}."
            ),
            OrderError::ServerError { .. } => format!(
                "We couldn't reach our order system just now. Please try again shortly, or call \
                 our support team at {support_phone}."
            ),
            OrderError::InvalidResponseFormat(_) | OrderError::Unknown(_) => format!(
                "Something went wrong while checking your orders. Please try again, or call our \
                 support team at {support_phone}."
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    InvalidPhone { message: String },
    #[error("{message}")]
    Upstream { source: OrderError, message: String },
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidPhone { .. } => "INVALID_PHONE",
            ApiError::Upstream { source, .. } => match source {
                OrderError::InvalidResponseFormat(_) => "INTERNAL_ERROR",
                OrderError::TokenExpired
                | OrderError::Timeout
                | OrderError::ServerError { .. }
                | OrderError::Unknown(_) => "PIA_ERROR",
            },
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidPhone { .. } | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (
            status,
            Json(json!({
                "success": false,
                "error": self.code(),
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("whatsapp delivery is not configured")]
    NotConfigured,
    #[error("whatsapp request failed: {0}")]
    Request(String),
    #[error("whatsapp provider returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("OPENAI_API_KEY not configured")]
    NotConfigured,
    #[error("llm request failed: {0}")]
    Request(String),
    #[error("llm returned {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("llm response had empty content")]
    EmptyContent,
}
