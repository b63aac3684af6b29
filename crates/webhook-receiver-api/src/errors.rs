//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::{error, warn};
use webhook_receiver_core::{QueueError, RejectReason};

/// Retry hint sent with 503 responses that carry no better estimate
const DEFAULT_RETRY_AFTER_SECONDS: u64 = 60;

/// Webhook handler errors with HTTP status code mapping
///
/// Stripe redelivers on any non-2xx response, so the status code decides
/// whether an event gets another chance:
///
/// - `400 Bad Request`: the request can never verify (bad or missing
///   signature, stale timestamp, malformed payload)
/// - `413 Payload Too Large`: body exceeds the configured limit
/// - `500 Internal Server Error`: the queue refused the event permanently
/// - `503 Service Unavailable`: a dependency failed; redelivery may succeed
///
/// Response bodies never echo secret material or the signature header.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// Verification rejected the request
    ///
    /// Maps to `400`, except `SecretUnavailable` which maps to `503`.
    #[error("Webhook rejected: {0}")]
    Rejected(RejectReason),

    /// The event verified but the queue did not accept it
    ///
    /// Maps to `503` when transient (with `Retry-After`), `500` otherwise.
    #[error("Failed to publish verified event: {0}")]
    PublishFailed(#[from] QueueError),

    /// The request body could not be read
    ///
    /// Maps to: `400 Bad Request`
    #[error("Invalid request body: {message}")]
    InvalidBody { message: String },

    /// Payload too large
    ///
    /// Maps to: `413 Payload Too Large`
    #[error("Payload too large (max: {max_size} bytes)")]
    PayloadTooLarge { max_size: usize },

    /// Invocation exceeded the request timeout
    ///
    /// Maps to: `503 Service Unavailable`
    #[error("Request timeout after {seconds}s")]
    Timeout { seconds: u64 },
}

impl WebhookHandlerError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Rejected(reason) if reason.is_dependency_failure() => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Rejected(_) => StatusCode::BAD_REQUEST,
            Self::PublishFailed(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            Self::PublishFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidBody { .. } => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Timeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Value of the `Retry-After` header, if any
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Self::Rejected(reason) if reason.is_dependency_failure() => {
                Some(DEFAULT_RETRY_AFTER_SECONDS)
            }
            Self::PublishFailed(e) => e.retry_after_seconds(),
            Self::Timeout { .. } => Some(DEFAULT_RETRY_AFTER_SECONDS),
            _ => None,
        }
    }

    /// Machine-readable reason for the response body
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Rejected(reason) => reason.as_str(),
            Self::PublishFailed(_) => "publish-failed",
            Self::InvalidBody { .. } => "invalid-body",
            Self::PayloadTooLarge { .. } => "payload-too-large",
            Self::Timeout { .. } => "timeout",
        }
    }

    /// Message safe to return to the caller
    fn public_message(&self) -> String {
        match self {
            Self::Rejected(RejectReason::MissingSignatureHeader) => {
                "Missing or malformed Stripe-Signature header".to_string()
            }
            Self::Rejected(RejectReason::SignatureMismatch) => {
                "No signatures found matching the expected signature for payload".to_string()
            }
            Self::Rejected(RejectReason::TimestampOutsideTolerance) => {
                "Timestamp outside the tolerance zone".to_string()
            }
            Self::Rejected(RejectReason::SecretUnavailable) => {
                "Signing secret temporarily unavailable".to_string()
            }
            Self::Rejected(RejectReason::MalformedPayload) => {
                "Payload is not a valid Stripe event".to_string()
            }
            Self::PublishFailed(e) if e.is_transient() => {
                "Event could not be queued, please retry".to_string()
            }
            Self::PublishFailed(_) => "Event could not be queued".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!(error = %self, reason = self.reason(), status = %status, "Webhook failed");
        } else {
            warn!(error = %self, reason = self.reason(), status = %status, "Webhook refused");
        }

        let body = serde_json::json!({
            "error": self.public_message(),
            "reason": self.reason(),
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let mut response = (status, Json(body)).into_response();

        if let Some(retry_seconds) = self.retry_after_seconds() {
            if let Ok(header_value) = retry_seconds.to_string().parse() {
                response.headers_mut().insert("Retry-After", header_value);
            }
        }

        response
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration loading failed: {0}")]
    Load(#[from] config::ConfigError),
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
