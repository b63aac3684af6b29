//! # Webhook Verification Module
//!
//! The trust boundary of the receiver: every inbound delivery is checked
//! against the Stripe signing secret before anything is published.
//!
//! Verification runs in a fixed order:
//! 1. Parse the `Stripe-Signature` header
//! 2. Fetch the signing secret (bounded by the dependency timeout)
//! 3. Compare the HMAC against every `v1` candidate
//! 4. Check the signed timestamp against the replay tolerance
//! 5. Parse the body as a Stripe event
//!
//! Only a verified event is published. The verifier performs no internal
//! retries and no deduplication; Stripe redelivers on any non-2xx response.

use crate::queue::{EventPublisher, QueueError, QueueMessage};
use crate::secrets::{SecretError, SecretName, SecretStore, SecretValue, StandardSecrets};
use crate::signature::{
    SignatureError, SignatureHeader, SignatureVerifier, DEFAULT_TOLERANCE, SIGNATURE_HEADER,
};
use crate::{ErrorCategory, Timestamp, ValidationError};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, sync::Arc, time::Duration};
use tracing::{error, info, instrument, warn};

/// Default budget for each dependency call (matches the function timeout)
pub const DEFAULT_DEPENDENCY_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Core Types
// ============================================================================

/// Raw HTTP request data as received from Stripe
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    /// Header map with lower-cased names
    pub headers: HashMap<String, String>,

    /// Raw body bytes exactly as received (the signature covers these bytes)
    pub body: Bytes,

    /// Reference time for the tolerance check
    pub received_at: Timestamp,
}

impl WebhookRequest {
    /// Create a request received now
    ///
    /// Header names are lower-cased; when two names collide after
    /// lower-casing the later one wins.
    pub fn new(headers: HashMap<String, String>, body: Bytes) -> Self {
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();

        Self {
            headers,
            body,
            received_at: Timestamp::now(),
        }
    }

    /// Override the receive time
    pub fn with_received_at(mut self, received_at: Timestamp) -> Self {
        self.received_at = received_at;
        self
    }

    /// Look up a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Raw `Stripe-Signature` header value, if present
    pub fn signature_header(&self) -> Option<&str> {
        self.header(SIGNATURE_HEADER)
    }
}

/// Why a request was not verified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    /// Header absent or unparsable (no `t`, bad `t`, or no `v1`)
    MissingSignatureHeader,
    /// No `v1` candidate matched
    SignatureMismatch,
    /// Signed timestamp too far from the receive time
    TimestampOutsideTolerance,
    /// Signing secret could not be read
    SecretUnavailable,
    /// Body is not a JSON object with string `id` and `type`
    MalformedPayload,
}

impl RejectReason {
    /// Every reason, for metric pre-registration
    pub const ALL: [RejectReason; 5] = [
        Self::MissingSignatureHeader,
        Self::SignatureMismatch,
        Self::TimestampOutsideTolerance,
        Self::SecretUnavailable,
        Self::MalformedPayload,
    ];

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingSignatureHeader => "missing-signature-header",
            Self::SignatureMismatch => "signature-mismatch",
            Self::TimestampOutsideTolerance => "timestamp-outside-tolerance",
            Self::SecretUnavailable => "secret-unavailable",
            Self::MalformedPayload => "malformed-payload",
        }
    }

    /// Whether the rejection is caused by a dependency rather than the request
    ///
    /// Dependency failures must not be answered with a 4xx, otherwise Stripe
    /// would stop redelivering an authentic event.
    pub fn is_dependency_failure(&self) -> bool {
        matches!(self, Self::SecretUnavailable)
    }

    /// Get error category for monitoring and alerting
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::MissingSignatureHeader => ErrorCategory::Security,
            Self::SignatureMismatch => ErrorCategory::Security,
            Self::TimestampOutsideTolerance => ErrorCategory::Security,
            Self::SecretUnavailable => ErrorCategory::Transient,
            Self::MalformedPayload => ErrorCategory::Permanent,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&SignatureError> for RejectReason {
    fn from(error: &SignatureError) -> Self {
        match error {
            SignatureError::MissingHeader
            | SignatureError::MissingTimestamp
            | SignatureError::InvalidTimestamp { .. }
            | SignatureError::NoSignatures { .. } => Self::MissingSignatureHeader,
            SignatureError::Mismatch | SignatureError::InvalidKey { .. } => {
                Self::SignatureMismatch
            }
            SignatureError::TimestampOutsideTolerance { .. } => Self::TimestampOutsideTolerance,
        }
    }
}

/// A Stripe event whose signature and timestamp have been verified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedEvent {
    /// Stripe event ID (`evt_...`)
    pub id: String,

    /// Stripe event type, e.g. `payment_intent.succeeded`
    #[serde(rename = "type")]
    pub event_type: String,

    /// Event creation time (seconds since epoch) as reported by Stripe
    pub created: Option<i64>,

    /// Whether the event came from live mode
    pub livemode: Option<bool>,

    /// API version the event was rendered with
    pub api_version: Option<String>,

    /// Timestamp from the signature header
    pub signed_at: Timestamp,

    /// Full event body
    pub payload: serde_json::Value,
}

impl VerifiedEvent {
    /// Parse a verified body into an event
    ///
    /// # Errors
    ///
    /// - `ValidationError::InvalidFormat` if the body is not a JSON object
    /// - `ValidationError::Required` if `id` or `type` is missing, empty, or
    ///   not a string
    pub fn from_body(body: &[u8], signed_at: Timestamp) -> Result<Self, ValidationError> {
        let payload: serde_json::Value =
            serde_json::from_slice(body).map_err(|e| ValidationError::InvalidFormat {
                field: "body".to_string(),
                message: e.to_string(),
            })?;

        if !payload.is_object() {
            return Err(ValidationError::InvalidFormat {
                field: "body".to_string(),
                message: "expected a JSON object".to_string(),
            });
        }

        let id = required_string(&payload, "id")?;
        let event_type = required_string(&payload, "type")?;

        Ok(Self {
            id,
            event_type,
            created: payload.get("created").and_then(|v| v.as_i64()),
            livemode: payload.get("livemode").and_then(|v| v.as_bool()),
            api_version: payload
                .get("api_version")
                .and_then(|v| v.as_str())
                .map(String::from),
            signed_at,
            payload,
        })
    }
}

fn required_string(payload: &serde_json::Value, field: &str) -> Result<String, ValidationError> {
    payload
        .get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| ValidationError::Required {
            field: field.to_string(),
        })
}

/// Outcome of verification
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationResult {
    Verified(VerifiedEvent),
    Rejected(RejectReason),
}

impl VerificationResult {
    /// Check if verification succeeded
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified(_))
    }
}

/// Outcome of a full invocation (verify, then publish)
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationOutcome {
    /// Verified and accepted by the queue
    Accepted(QueueMessage),
    /// Not verified; nothing was published
    Rejected(RejectReason),
    /// Verified, but the queue did not accept the event
    PublishFailed(QueueError),
}

impl InvocationOutcome {
    /// Check if the event reached the queue
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted(_) => "accepted",
            Self::Rejected(_) => "rejected",
            Self::PublishFailed(_) => "publish_failed",
        }
    }
}

/// Verifier settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    /// Name of the signing secret in the secret store
    pub signing_secret_name: SecretName,

    /// Replay tolerance; zero disables the timestamp check
    pub tolerance: Duration,

    /// Budget for each secret lookup and each publish
    pub dependency_timeout: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            signing_secret_name: StandardSecrets::webhook_signing_secret(),
            tolerance: DEFAULT_TOLERANCE,
            dependency_timeout: DEFAULT_DEPENDENCY_TIMEOUT,
        }
    }
}

// ============================================================================
// Interface Traits
// ============================================================================

/// Entry point used by the HTTP front door
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    /// Verify the request and publish it when authentic
    async fn handle_webhook(&self, request: WebhookRequest) -> InvocationOutcome;
}

// ============================================================================
// Implementation
// ============================================================================

/// Verifies Stripe deliveries and publishes the authentic ones
pub struct WebhookVerifier {
    secrets: Arc<dyn SecretStore>,
    publisher: Arc<dyn EventPublisher>,
    config: VerifierConfig,
    signature: SignatureVerifier,
}

impl WebhookVerifier {
    /// Create a verifier over the injected capabilities
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use webhook_receiver_core::{
    ///     InMemoryEventPublisher, InMemorySecretStore, StandardSecrets, SecretValue,
    ///     VerifierConfig, WebhookVerifier,
    /// };
    ///
    /// let secrets = InMemorySecretStore::new().with_secret(
    ///     StandardSecrets::webhook_signing_secret(),
    ///     SecretValue::from_string("whsec_test".to_string()),
    /// );
    /// let publisher = InMemoryEventPublisher::default();
    ///
    /// let verifier = WebhookVerifier::new(
    ///     Arc::new(secrets),
    ///     Arc::new(publisher),
    ///     VerifierConfig::default(),
    /// );
    /// assert_eq!(verifier.config().tolerance.as_secs(), 300);
    /// ```
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        publisher: Arc<dyn EventPublisher>,
        config: VerifierConfig,
    ) -> Self {
        let signature = SignatureVerifier::new(config.tolerance);
        Self {
            secrets,
            publisher,
            config,
            signature,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Run the verification pipeline without publishing
    #[instrument(skip(self, request), fields(body_size = request.body.len()))]
    pub async fn verify(&self, request: &WebhookRequest) -> VerificationResult {
        let header = match request.signature_header() {
            Some(value) => match SignatureHeader::parse(value) {
                Ok(header) => header,
                Err(e) => {
                    warn!(error = %e, "Rejecting webhook with malformed signature header");
                    return VerificationResult::Rejected(RejectReason::from(&e));
                }
            },
            None => {
                warn!("Rejecting webhook without signature header");
                return VerificationResult::Rejected(RejectReason::MissingSignatureHeader);
            }
        };

        let secret = match self.fetch_signing_secret().await {
            Ok(secret) => secret,
            Err(e) => {
                error!(
                    error = %e,
                    secret_name = %self.config.signing_secret_name,
                    backend = self.secrets.backend_name(),
                    "Signing secret unavailable"
                );
                return VerificationResult::Rejected(RejectReason::SecretUnavailable);
            }
        };

        if let Err(e) = self
            .signature
            .verify_signature(&header, &request.body, &secret)
        {
            warn!(
                error = %e,
                candidates = header.signatures().len(),
                "Rejecting webhook with invalid signature"
            );
            return VerificationResult::Rejected(RejectReason::from(&e));
        }

        if let Err(e) = self.signature.check_timestamp(&header, request.received_at) {
            warn!(error = %e, "Rejecting webhook outside replay tolerance");
            return VerificationResult::Rejected(RejectReason::from(&e));
        }

        // Only reachable with an unrepresentable timestamp when the tolerance
        // check is disabled.
        let signed_at =
            Timestamp::from_unix_seconds(header.timestamp()).unwrap_or(request.received_at);

        match VerifiedEvent::from_body(&request.body, signed_at) {
            Ok(event) => {
                info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    livemode = ?event.livemode,
                    "Webhook signature verified"
                );
                VerificationResult::Verified(event)
            }
            Err(e) => {
                info!(error = %e, "Rejecting signed webhook with malformed payload");
                VerificationResult::Rejected(RejectReason::MalformedPayload)
            }
        }
    }

    /// Verify the request, then publish the event if it is authentic
    #[instrument(skip(self, request))]
    pub async fn handle(&self, request: WebhookRequest) -> InvocationOutcome {
        let event = match self.verify(&request).await {
            VerificationResult::Verified(event) => event,
            VerificationResult::Rejected(reason) => {
                info!(
                    reason = %reason,
                    category = reason.error_category().as_str(),
                    "Webhook rejected"
                );
                return InvocationOutcome::Rejected(reason);
            }
        };

        match self.publish(&event).await {
            Ok(message) => {
                info!(
                    event_id = %event.id,
                    message_id = %message.message_id,
                    queue = self.publisher.queue_identifier(),
                    "Verified event published"
                );
                InvocationOutcome::Accepted(message)
            }
            Err(e) => {
                error!(
                    error = %e,
                    event_id = %event.id,
                    transient = e.is_transient(),
                    queue = self.publisher.queue_identifier(),
                    "Failed to publish verified event"
                );
                InvocationOutcome::PublishFailed(e)
            }
        }
    }

    async fn fetch_signing_secret(&self) -> Result<SecretValue, SecretError> {
        let name = &self.config.signing_secret_name;
        let timeout = self.config.dependency_timeout;

        let secret = tokio::time::timeout(timeout, self.secrets.get_secret(name))
            .await
            .map_err(|_| SecretError::Timeout {
                name: name.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })??;

        if secret.is_empty() {
            return Err(SecretError::InvalidValue {
                name: name.to_string(),
            });
        }

        Ok(secret)
    }

    async fn publish(&self, event: &VerifiedEvent) -> Result<QueueMessage, QueueError> {
        let timeout = self.config.dependency_timeout;

        tokio::time::timeout(timeout, self.publisher.publish(event))
            .await
            .map_err(|_| QueueError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            })?
    }
}

#[async_trait]
impl WebhookHandler for WebhookVerifier {
    async fn handle_webhook(&self, request: WebhookRequest) -> InvocationOutcome {
        self.handle(request).await
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
